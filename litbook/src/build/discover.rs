use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Find documents under `root` whose extension is in `extensions`.
///
/// Returns paths relative to `root`, sorted, so logs and reports are
/// reproducible. `exclude` (typically the output root) is never entered.
pub fn discover_documents(
    root: &Path,
    extensions: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::InputRoot(root.to_path_buf()));
    }
    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let mut found = Vec::new();
    collect(root, root, extensions, exclude.as_deref(), &mut found)?;
    found.sort();
    Ok(found)
}

fn collect(
    dir: &Path,
    root: &Path,
    extensions: &[String],
    exclude: Option<&Path>,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            let canonical = path.canonicalize().ok();
            if exclude.is_some() && canonical.as_deref() == exclude {
                continue;
            }
            collect(&path, root, extensions, exclude, out)?;
        } else if has_extension(&path, extensions) {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}

/// Report key for a relative path: forward slashes on every platform.
pub fn document_key(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}
