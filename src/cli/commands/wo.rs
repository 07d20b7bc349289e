//! `axis wo` command - work orders and inspection results

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::filters::VerdictFilter;
use crate::cli::helpers::{close_session, confirm, open_database, open_session};
use crate::cli::output::{effective_format, print_structured, print_table, styled_verdict};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::export::{inspection_rows, write_csv, ExportFilter};

#[derive(Subcommand, Debug)]
pub enum WoCommands {
    /// List work orders that have results
    List,

    /// Show the inspection table of a work order
    Show(ShowArgs),

    /// Record results (id=value ...)
    Set(SetArgs),

    /// Remove every result of a work order
    Clear(ClearArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Work order name
    pub workorder: String,

    /// Filter by verdict
    #[arg(long, short = 's', default_value = "all")]
    pub status: VerdictFilter,

    /// Filter by method (substring match, ignoring case)
    #[arg(long, short = 'm')]
    pub method: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Work order name
    pub workorder: String,

    /// Results such as `001=12.48` or `002=p`
    #[arg(required = true)]
    pub results: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    /// Work order name
    pub workorder: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Serialize)]
struct WorkorderSummary {
    workorder: String,
    results: usize,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Run a work order subcommand
pub fn run(cmd: WoCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        WoCommands::List => run_list(global),
        WoCommands::Show(args) => run_show(args, global),
        WoCommands::Set(args) => run_set(args, global),
        WoCommands::Clear(args) => run_clear(args, global),
    }
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let mut summaries = Vec::new();
    for workorder in db.results().list_workorders().into_diagnostic()? {
        let results = db.results().read(&workorder).into_diagnostic()?.len();
        let updated_at = db.results().latest_timestamp(&workorder).into_diagnostic()?;
        summaries.push(WorkorderSummary {
            workorder,
            results,
            updated_at,
        });
    }

    if print_structured(&summaries, effective_format(global.output))? {
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No work orders found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                style(&s.workorder).cyan().to_string(),
                s.results.to_string(),
                s.updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["WORK ORDER", "RESULTS", "UPDATED (UTC)"], &rows);
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let features = db.features().list().into_diagnostic()?;
    let results = db.results().read(&args.workorder).into_diagnostic()?;
    let filter = ExportFilter {
        status: args.status.verdict(),
        method: args.method,
    };
    let rows = inspection_rows(&features, &results, &filter);

    let format = effective_format(global.output);
    if print_structured(&rows, format)? {
        return Ok(());
    }
    if format == OutputFormat::Csv {
        return write_csv(std::io::stdout(), &rows).into_diagnostic();
    }
    if rows.is_empty() {
        println!("No features match.");
        return Ok(());
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                style(&r.id).cyan().to_string(),
                r.page.to_string(),
                r.method.clone(),
                r.result.clone(),
                r.nominal.clone(),
                r.lsl.clone(),
                r.usl.clone(),
                styled_verdict(r.status),
            ]
        })
        .collect();
    println!(
        "{} {}",
        style("Work order").bold(),
        style(&args.workorder).cyan()
    );
    print_table(
        &["ID", "PAGE", "METHOD", "RESULT", "NOMINAL", "LSL", "USL", "STATUS"],
        &table,
    );
    Ok(())
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let mut pairs = Vec::with_capacity(args.results.len());
    for entry in &args.results {
        let (id, value) = entry
            .split_once('=')
            .ok_or_else(|| miette::miette!("Expected id=value, got '{}'", entry))?;
        pairs.push((id.trim(), value));
    }

    let mut session = open_session(global)?;
    session.enter_inspection(&args.workorder).into_diagnostic()?;
    let recorded = session.record_results(&pairs).into_diagnostic()?;
    close_session(session)?;

    if print_structured(&recorded, effective_format(global.output))? {
        return Ok(());
    }
    for (id, result, verdict) in &recorded {
        println!(
            "{} {} = {} {}",
            style("✓").green(),
            style(id).cyan(),
            result,
            styled_verdict(*verdict)
        );
    }
    Ok(())
}

fn run_clear(args: ClearArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let count = db.results().read(&args.workorder).into_diagnostic()?.len();
    if count == 0 {
        println!("Work order '{}' has no results.", args.workorder);
        return Ok(());
    }

    let prompt = format!(
        "Remove {} result(s) from work order {}?",
        count, args.workorder
    );
    if !confirm(&prompt, args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    db.results().clear(&args.workorder).into_diagnostic()?;
    println!(
        "{} Cleared {} result(s) from {}",
        style("✓").green(),
        count,
        style(&args.workorder).cyan()
    );
    Ok(())
}
