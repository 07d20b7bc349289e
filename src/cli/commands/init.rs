//! `axis init` command - create or upgrade a drawing's store

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::open_database;
use crate::cli::output::{effective_format, print_structured};
use crate::cli::GlobalOpts;
use crate::core::MigrationOutcome;

#[derive(clap::Args, Debug)]
pub struct InitArgs {}

#[derive(Serialize)]
struct InitReport<'a> {
    database: String,
    schema_version: i32,
    features: usize,
    migration: &'a MigrationOutcome,
}

pub fn run(_args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let features = db.features().list().into_diagnostic()?.len();
    let report = InitReport {
        database: db.paths().database().display().to_string(),
        schema_version: db.schema_version().into_diagnostic()?,
        features,
        migration: db.migration(),
    };

    if print_structured(&report, effective_format(global.output))? {
        return Ok(());
    }

    println!(
        "{} Store ready at {} (schema v{})",
        style("✓").green(),
        style(&report.database).cyan(),
        report.schema_version
    );
    match report.migration {
        MigrationOutcome::NotNeeded => {}
        MigrationOutcome::Imported {
            features,
            results,
            workorders,
        } => println!(
            "{} Imported {} features and {} results from {} work orders",
            style("✓").green(),
            features,
            results,
            workorders
        ),
        MigrationOutcome::Failed { reason } => eprintln!(
            "{} Legacy import failed, store left unchanged: {}",
            style("!").yellow(),
            reason
        ),
    }
    println!("   {} features", style(report.features).cyan());
    Ok(())
}
