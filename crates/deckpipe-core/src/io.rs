use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `data` in one rename. The tempfile lives next to the
/// target so the rename never crosses a filesystem; another process reading
/// a profile or context mid-save sees the old document or the new one.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            ensure_dir(parent)?;
            parent
        }
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Install a file shipped elsewhere (e.g. a window-manager script).
pub fn atomic_copy(from: &Path, to: &Path) -> Result<()> {
    let data = std::fs::read(from)?;
    atomic_write(to, &data)
}
