//! `axis undo` command - revert the last feature add or delete

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{close_session, open_session};
use crate::cli::GlobalOpts;
use crate::core::UndoOutcome;

#[derive(clap::Args, Debug)]
pub struct UndoArgs {
    /// List the undo history instead of reverting
    #[arg(long)]
    pub list: bool,
}

pub fn run(args: UndoArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = open_session(global)?;

    if args.list {
        if session.undo_log().is_empty() {
            println!("Nothing to undo.");
        }
        for entry in session.undo_log().entries().collect::<Vec<_>>().iter().rev() {
            println!(
                "{}  {}",
                style(entry.recorded_at.format("%Y-%m-%d %H:%M:%S")).dim(),
                entry.label
            );
        }
        return Ok(());
    }

    // A failed revert still drops the entry, so the log is saved either way
    let outcome = session.undo();
    close_session(session)?;

    match outcome.into_diagnostic()? {
        UndoOutcome::Undone(label) => println!("{} Undid: {}", style("✓").green(), label),
        UndoOutcome::Nothing => println!("Nothing to undo."),
        UndoOutcome::Unavailable => println!("Undo is only available while ballooning."),
    }
    Ok(())
}
