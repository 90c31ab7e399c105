//! Local console: drives a [`Host`] from a rustyline editor instead of a
//! socket. Responses go to stdout.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::host::Host;

/// `~/.ember/history`, if a home directory exists.
fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ember").join("history"))
}

/// Read and dispatch lines until `exit`, Ctrl+D or an editor error.
/// Ctrl+C discards the current line.
pub fn run(host: &mut Host, prompt: &str) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        if editor.load_history(path).is_err() {
            debug!("No console history at {}", path.display());
        }
    }

    let mut stdout = io::stdout();
    host.greet(&mut stdout);
    stdout.flush()?;

    loop {
        match editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = editor.add_history_entry(line.as_str()) {
                        debug!("Failed to record console history: {}", e);
                    }
                }
                host.handle_line(&line, &mut stdout);
                stdout.flush()?;
                if host.is_done() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = history.as_deref().filter(|path| prepare_history_dir(path)) {
        if let Err(e) = editor.save_history(path) {
            warn!("Failed to save console history: {}", e);
        }
    }
    Ok(())
}

/// Create the directory holding `path`. Returns `false` (and logs) if it
/// cannot be created, in which case history is not saved.
fn prepare_history_dir(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    match std::fs::create_dir_all(parent) {
        Ok(()) => true,
        Err(e) => {
            warn!("Cannot create history directory {}: {}", parent.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_history_dir_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".ember").join("history");
        assert!(prepare_history_dir(&path));
        assert!(dir.path().join(".ember").is_dir());
    }

    #[test]
    fn test_history_dir_blocked_by_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join(".ember");
        std::fs::write(&blocker, b"not a directory").unwrap();
        assert!(!prepare_history_dir(&blocker.join("history")));
    }
}
