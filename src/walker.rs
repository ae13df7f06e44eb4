//! Directory Walker (spec.md §4.4 "Directory variants"): recursive fan-out
//! for directory-level operations.
//!
//! Grounded in the teacher's `collect_local_files` (`s3/helpers.rs`), which
//! walks a directory tree synchronously and returns a flat file list;
//! generalized here into an async walk (matching the rest of this crate's
//! tokio-based I/O) that the client facade fans out over its internal pool.

use crate::error::Result;

/// One discovered local file: absolute path plus the key suffix relative to
/// the walk root, used to build the destination object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: std::path::PathBuf,
    pub relative_key: String,
}

/// Recursively list every regular file under `root`, depth-first, skipping
/// symlinks (mirroring the teacher's walk, which only follows real
/// directories).
pub async fn walk(root: &std::path::Path) -> Result<Vec<WalkedFile>> {
    let mut results = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                results.push(WalkedFile {
                    path,
                    relative_key: relative,
                });
            }
        }
    }

    results.sort_by(|a, b| a.relative_key.cmp(&b.relative_key));
    Ok(results)
}
