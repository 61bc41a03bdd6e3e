use crate::error::{DeckError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DECKPIPE_DIR: &str = ".deckpipe";
pub const PROFILES_DIR: &str = ".deckpipe/profiles";
pub const CONTEXTS_DIR: &str = ".deckpipe/contexts";

pub const CONFIG_FILE: &str = ".deckpipe/config.yaml";
pub const COLLECTIONS_FILE: &str = ".deckpipe/collections.yaml";
pub const TEARDOWN_DB: &str = ".deckpipe/teardown.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn deckpipe_dir(root: &Path) -> PathBuf {
    root.join(DECKPIPE_DIR)
}

pub fn profiles_dir(root: &Path) -> PathBuf {
    root.join(PROFILES_DIR)
}

pub fn profile_path(root: &Path, id: &str) -> PathBuf {
    profiles_dir(root).join(format!("{id}.yaml"))
}

pub fn contexts_dir(root: &Path) -> PathBuf {
    root.join(CONTEXTS_DIR)
}

pub fn context_path(root: &Path, id: &str) -> PathBuf {
    contexts_dir(root).join(format!("{id}.yaml"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn collections_path(root: &Path) -> PathBuf {
    root.join(COLLECTIONS_FILE)
}

pub fn teardown_db_path(root: &Path) -> PathBuf {
    root.join(TEARDOWN_DB)
}

// ---------------------------------------------------------------------------
// Record id validation
// ---------------------------------------------------------------------------

static RECORD_ID_RE: OnceLock<Regex> = OnceLock::new();

fn record_id_re() -> &'static Regex {
    RECORD_ID_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex")
    })
}

/// Profile and context ids name files on disk, so they are restricted to a
/// filesystem-safe alphabet.
pub fn validate_record_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !record_id_re().is_match(id) {
        return Err(DeckError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_record_ids() {
        for id in ["dual-screen", "a", "1234567", "cemu_wiiu"] {
            validate_record_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_record_ids() {
        for id in ["", "-dash", "trailing-", "has space", "UPPER", "a/b", "core:x"] {
            assert!(validate_record_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            profile_path(root, "emu"),
            PathBuf::from("/tmp/proj/.deckpipe/profiles/emu.yaml")
        );
        assert_eq!(
            context_path(root, "1234"),
            PathBuf::from("/tmp/proj/.deckpipe/contexts/1234.yaml")
        );
        assert_eq!(
            teardown_db_path(root),
            PathBuf::from("/tmp/proj/.deckpipe/teardown.db")
        );
    }
}
