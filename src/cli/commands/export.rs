//! `axis export` command - inspection table as CSV

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::filters::VerdictFilter;
use crate::cli::helpers::open_database;
use crate::cli::GlobalOpts;
use crate::core::export::{export_workorder, ExportFilter};

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Work order name
    pub workorder: String,

    /// Destination CSV file
    pub file: PathBuf,

    /// Only rows with this verdict
    #[arg(long, short = 's', default_value = "all")]
    pub status: VerdictFilter,

    /// Only rows whose method contains this text
    #[arg(long, short = 'm')]
    pub method: Option<String>,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let filter = ExportFilter {
        status: args.status.verdict(),
        method: args.method,
    };
    let count = export_workorder(&mut db, &args.workorder, &filter, &args.file).into_diagnostic()?;

    println!(
        "{} Exported {} row(s) to {}",
        style("✓").green(),
        count,
        style(args.file.display()).cyan()
    );
    Ok(())
}
