use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::packaging::{PackagingError, ensure_source_dir};

/// One node of a directory walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// The entry itself is a symlink (possibly dangling); never set with `is_dir`.
    pub is_symlink: bool,
}

/// Recursively lists everything under `dir`, top-down.
///
/// The files of a directory come first, then each subdirectory followed by its
/// own contents. Entries are sorted by name within a directory. Symlinks are
/// listed as they are and never followed, whatever they point to.
pub fn walk_tree(dir: &Path) -> Result<Vec<WalkEntry>, PackagingError> {
    fn walk_dir(dir: &Path, result: &mut Vec<WalkEntry>) -> Result<(), PackagingError> {
        let io_err = |source| PackagingError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type().map_err(io_err)?;

            if file_type.is_dir() {
                subdirs.push(path);
            } else {
                result.push(WalkEntry {
                    path,
                    is_dir: false,
                    is_symlink: file_type.is_symlink(),
                });
            }
        }

        for sub in subdirs {
            result.push(WalkEntry {
                path: sub.clone(),
                is_dir: true,
                is_symlink: false,
            });
            walk_dir(&sub, result)?;
        }
        Ok(())
    }

    ensure_source_dir(dir)?;

    let mut result = Vec::new();
    walk_dir(dir, &mut result)?;
    Ok(result)
}

/// Files under `dir`, in [`walk_tree`] order.
///
/// Symlinks to directories are left out. Other symlinks, dangling ones included,
/// are kept and resolved by whoever opens them.
pub fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, PackagingError> {
    Ok(walk_tree(dir)?
        .into_iter()
        .filter(|e| !e.is_dir && !(e.is_symlink && e.path.is_dir()))
        .map(|e| e.path)
        .collect())
}

/// Sum of the sizes of `files`, skipping anything that is no longer a file.
pub fn total_size(files: &[PathBuf]) -> std::io::Result<u64> {
    let mut total: u64 = 0;
    for path in files {
        if path.is_file() {
            total += fs::metadata(path)?.len();
        }
    }
    Ok(total)
}

/// Size in binary mebibytes with two decimals, e.g. `2.00 MB`.
pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Convert bytes into a human-friendly string using binary (KiB, MiB, GiB...) units.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // 1.0 MiB prints as 1 MiB
    if (size * 10.0) % 10.0 == 0.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
