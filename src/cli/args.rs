//! Command-line arguments

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::export::ExportArgs;
use crate::cli::commands::feat::FeatCommands;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::spc::SpcArgs;
use crate::cli::commands::tol::TolCommands;
use crate::cli::commands::undo::UndoArgs;
use crate::cli::commands::wo::WoCommands;

#[derive(Parser, Debug)]
#[command(name = "axis")]
#[command(author, version, about = "Drawing balloon inspection toolkit")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Drawing the features belong to (the store lives beside it)
    #[arg(long, short = 'd', global = true, env = "AXIS_DRAWING")]
    pub drawing: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "auto")]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Table for terminals
    #[default]
    Auto,
    /// Aligned columns
    Table,
    Json,
    Yaml,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the store for a drawing and import legacy files
    Init(InitArgs),

    /// Ballooned features
    #[command(subcommand)]
    Feat(FeatCommands),

    /// Work orders and inspection results
    #[command(subcommand)]
    Wo(WoCommands),

    /// Tolerance expressions
    #[command(subcommand)]
    Tol(TolCommands),

    /// Process capability across work orders
    Spc(SpcArgs),

    /// Revert the last feature add or delete
    Undo(UndoArgs),

    /// Export a work order's inspection table as CSV
    Export(ExportArgs),
}
