use anyhow::Context;
use std::io::Write;
use std::path::Path;

/// Writes `bytes` next to `dst` and moves the file into place, so readers never see a torn file.
pub fn write_atomic(dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create directory: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write temp: {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp: {}", tmp.path().display()))?;
    tmp.persist(dst)
        .map_err(|e| e.error)
        .with_context(|| format!("replace file: {}", dst.display()))?;
    Ok(())
}

pub fn remove_if_exists(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).with_context(|| format!("remove {}", path.display())),
    }
}
