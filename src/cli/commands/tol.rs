//! `axis tol` command - tolerance expressions

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{close_session, open_session};
use crate::cli::output::{effective_format, print_csv, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::tolerance::{self, Tolerance};

#[derive(Subcommand, Debug)]
pub enum TolCommands {
    /// Parse an expression such as `12.5 ±0.2` or `10 +0.1 -0.2`
    Parse(ParseArgs),

    /// Parse an expression and write the band to a feature
    Apply(ApplyArgs),
}

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// Tolerance expression (may span several arguments)
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
    pub expr: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    /// Feature ID
    pub id: String,

    /// Tolerance expression (may span several arguments)
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
    pub expr: Vec<String>,
}

/// Run a tolerance subcommand
pub fn run(cmd: TolCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TolCommands::Parse(args) => run_parse(args, global),
        TolCommands::Apply(args) => run_apply(args, global),
    }
}

fn run_parse(args: ParseArgs, global: &GlobalOpts) -> Result<()> {
    let tol = tolerance::parse(&args.expr.join(" ")).into_diagnostic()?;
    print_tolerance(&tol, global)
}

fn run_apply(args: ApplyArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = open_session(global)?;
    let tol = session
        .apply_tolerance(&args.id, &args.expr.join(" "))
        .into_diagnostic()?;
    close_session(session)?;

    if effective_format(global.output) == OutputFormat::Table {
        println!(
            "{} Tolerance written to {}",
            style("✓").green(),
            style(&args.id).cyan()
        );
    }
    print_tolerance(&tol, global)
}

fn print_tolerance(tol: &Tolerance, global: &GlobalOpts) -> Result<()> {
    let format = effective_format(global.output);
    if print_structured(tol, format)? {
        return Ok(());
    }
    let (nominal, lsl, usl) = tol.to_fields();
    if format == OutputFormat::Csv {
        return print_csv(&["nominal", "lsl", "usl"], &[vec![nominal, lsl, usl]]);
    }
    println!("{}: {}", style("Nominal").bold(), nominal);
    println!("{}: {}", style("LSL").bold(), lsl);
    println!("{}: {}", style("USL").bold(), usl);
    Ok(())
}
