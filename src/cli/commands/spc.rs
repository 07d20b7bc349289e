//! `axis spc` command - process capability report

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::open_database;
use crate::cli::output::{effective_format, print_csv, print_structured, print_table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::codec::{self, format_stat};
use crate::core::spc::{self, FeatureSpc};

/// Decimals shown for statistics
const STAT_DECIMALS: usize = 4;

/// Cpk below this is flagged as not capable
const CAPABLE_CPK: f64 = 1.33;

#[derive(clap::Args, Debug)]
pub struct SpcArgs {
    /// Only this feature, with every measurement listed
    #[arg(long, short = 'f')]
    pub feature: Option<String>,
}

const HEADERS: [&str; 9] = ["ID", "METHOD", "N", "MEAN", "STDEV", "MIN", "MAX", "CP", "CPK"];

pub fn run(args: SpcArgs, global: &GlobalOpts) -> Result<()> {
    let (mut db, _config) = open_database(global)?;
    let mut dataset = spc::load_dataset(&mut db).into_diagnostic()?;
    if let Some(id) = &args.feature {
        dataset.retain(|f| &f.feature_id == id);
        if dataset.is_empty() {
            return Err(miette::miette!("No numeric results recorded for feature '{}'", id));
        }
    }

    let format = effective_format(global.output);
    if print_structured(&dataset, format)? {
        return Ok(());
    }
    if format == OutputFormat::Csv {
        let rows: Vec<Vec<String>> = dataset.iter().map(|f| stat_cells(f, false)).collect();
        return print_csv(&HEADERS, &rows);
    }
    if dataset.is_empty() {
        println!("No numeric results recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = dataset.iter().map(|f| stat_cells(f, true)).collect();
    print_table(&HEADERS, &rows);

    if args.feature.is_some() {
        for feature in &dataset {
            print_measurements(feature);
        }
    }
    Ok(())
}

fn stat_cells(f: &FeatureSpc, styled: bool) -> Vec<String> {
    let s = &f.stats;
    let cpk = format_stat(s.cpk, STAT_DECIMALS);
    let cpk = match s.cpk {
        Some(v) if styled && v < CAPABLE_CPK => style(cpk).red().to_string(),
        Some(_) if styled => style(cpk).green().to_string(),
        _ => cpk,
    };
    vec![
        if styled {
            style(&f.feature_id).cyan().to_string()
        } else {
            f.feature_id.clone()
        },
        f.method.clone(),
        s.count.to_string(),
        format_stat(Some(s.mean), STAT_DECIMALS),
        format_stat(Some(s.stdev), STAT_DECIMALS),
        format_stat(Some(s.min), STAT_DECIMALS),
        format_stat(Some(s.max), STAT_DECIMALS),
        format_stat(s.cp, STAT_DECIMALS),
        cpk,
    ]
}

fn print_measurements(f: &FeatureSpc) {
    println!();
    println!(
        "{} {} (LSL {} / USL {})",
        style("Measurements for").bold(),
        style(&f.feature_id).cyan(),
        format_stat(f.lsl, STAT_DECIMALS),
        format_stat(f.usl, STAT_DECIMALS)
    );
    for m in &f.measurements {
        println!(
            "  {:<16} {:>12}  {}  {}",
            m.workorder,
            codec::to_text(m.value),
            m.timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            style(&m.source).dim()
        );
    }
}
