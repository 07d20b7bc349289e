//! Shared helper functions for CLI commands

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use std::io::{self, IsTerminal};

use crate::cli::GlobalOpts;
use crate::core::{Config, Database, DocumentPaths, Session};

/// Files of the drawing named by `--drawing` / `AXIS_DRAWING`
pub fn document_paths(global: &GlobalOpts) -> Result<DocumentPaths> {
    let drawing = global.drawing.as_ref().ok_or_else(|| {
        miette::miette!(
            help = "pass --drawing <file> or set AXIS_DRAWING",
            "No drawing selected"
        )
    })?;
    Ok(DocumentPaths::new(drawing))
}

/// Open the drawing's store with the user's configuration
pub fn open_database(global: &GlobalOpts) -> Result<(Database, Config)> {
    let config = Config::load();
    let paths = document_paths(global)?;
    let db = Database::open(paths, config.store_options()).into_diagnostic()?;
    Ok((db, config))
}

/// Open an editing session, restoring the undo log saved beside the drawing
pub fn open_session(global: &GlobalOpts) -> Result<Session> {
    let (db, config) = open_database(global)?;
    let undo_path = db.paths().undo_log();
    let mut session = Session::open(db, &config).into_diagnostic()?;
    if let Err(e) = session.load_undo_log(&undo_path) {
        eprintln!(
            "{} {} (starting with an empty undo history)",
            style("!").yellow(),
            e
        );
    }
    Ok(session)
}

/// Write pending positions and persist the undo log
pub fn close_session(mut session: Session) -> Result<()> {
    session.flush_all();
    let path = session.workspace().db().paths().undo_log();
    session.save_undo_log(&path).into_diagnostic()
}

/// Ask before a destructive action unless `--yes` was given
///
/// Without a terminal there is nobody to ask, so the action is refused.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(miette::miette!(
            help = "re-run with --yes to skip the prompt",
            "Confirmation required: {}",
            prompt
        ));
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
