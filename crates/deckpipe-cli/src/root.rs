use std::path::{Path, PathBuf};

/// Resolve the deckpipe data root.
///
/// `--root` / `DECKPIPE_ROOT` wins. Otherwise walk upward from the current
/// directory looking for `.deckpipe/`, falling back to the current
/// directory so `deckpipe init` has somewhere to write.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or(cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(deckpipe_core::paths::DECKPIPE_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_deckpipe_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".deckpipe")).unwrap();
        let deep = dir.path().join("a/b");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_upward(&deep).as_deref(), Some(dir.path()));
    }

    #[test]
    fn nothing_found_without_marker() {
        let dir = TempDir::new().unwrap();
        assert!(find_upward(dir.path()).map_or(true, |p| p != dir.path()));
    }
}
