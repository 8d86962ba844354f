use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replaces `path` with `contents` through a temp file in the same
/// directory, so readers never observe a partially written file. A symlink
/// at `path` is written through: its target is replaced, the link stays.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };
    let path = target.as_path();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".yarn-minify-")
        .tempfile_in(dir)?;
    tmp.as_file_mut().write_all(contents.as_bytes())?;

    // Temp files are created 0600; keep the mode of the file being replaced.
    match fs::metadata(path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(_) => set_default_permissions(tmp.as_file())?,
    }
    tmp.as_file().sync_all().ok();

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
