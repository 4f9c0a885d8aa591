use anyhow::Context;
use camino::Utf8Path;
use std::io::Write;
use tracing::debug;

/// Replace `path` with `contents` atomically.
///
/// The bytes go to a temporary file in the same directory, are synced, and the
/// temporary file is renamed over `path`. On failure the original file is left
/// as it was.
pub fn atomic_write(path: &Utf8Path, contents: &str) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };

    let permissions = fs_err::metadata(path).ok().map(|m| m.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent))?;
    temp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp file for {}", path))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {}", path))?;
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .with_context(|| format!("copy permissions of {}", path))?;
    }
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {}", path))?;

    debug!(path = %path, bytes = contents.len(), "persisted document");
    Ok(())
}
