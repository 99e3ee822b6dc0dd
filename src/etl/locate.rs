/// Locate Module
///
/// Finds the input files of a phase under a root directory.
use crate::error::EtlError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DATA_EXTENSION: &str = "json";

/// Every `.json` file at any depth under `root`, as absolute paths in file-name order.
///
/// A missing root yields an empty list, like a root with no matching files.
pub fn find_data_files(root: &Path) -> Result<Vec<PathBuf>, EtlError> {
    if !root.exists() {
        tracing::warn!("Data directory {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let root = root.canonicalize().map_err(|err| EtlError::io(root, err))?;
    let mut files = Vec::new();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root.as_path()).to_path_buf();
            EtlError::io(&path, err.into())
        })?;

        // symlinked files count; `file_type()` would report the link itself
        if entry.path().is_file() && has_data_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }

    tracing::debug!("Found {} data files under {}", files.len(), root.display());
    Ok(files)
}

fn has_data_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).map(|ext| ext == DATA_EXTENSION).unwrap_or(false)
}
