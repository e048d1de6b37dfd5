use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod tar;
pub mod zip;

pub use self::tar::create_tar_archive;
pub use self::zip::create_zip_archive;

/// Archive container produced by a packager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Suffix every archive name of this format must end with.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => ".tar.gz",
            ArchiveFormat::Zip => ".zip",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::TarGz => f.write_str("tar.gz"),
            ArchiveFormat::Zip => f.write_str("zip"),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(format!("unknown archive format: {other}")),
        }
    }
}

/// Why a packager gave up. Never escapes as a panic; packagers return it.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("source directory '{}' does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error on path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not strip prefix '{}' from path '{}'", prefix.display(), path.display())]
    StripPrefix { prefix: PathBuf, path: PathBuf },

    #[error("zip encoder error: {0}")]
    Zip(#[from] async_zip::error::ZipError),

    #[error("failed to start the zip writer runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl PackagingError {
    /// Adapter for `map_err` that tags an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> PackagingError {
        let path = path.into();
        move |source| PackagingError::Io { path, source }
    }
}

/// What a successful packager run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub format: ArchiveFormat,
    /// Resolved output name, as given to the filesystem.
    pub file_name: String,
    pub source_abs: PathBuf,
    pub output_abs: PathBuf,
}

pub type PackageResult = Result<ArchiveReport, PackagingError>;

/// Checks that `source_dir` is an existing directory.
pub(crate) fn ensure_source_dir(source_dir: &Path) -> Result<(), PackagingError> {
    if !source_dir.exists() {
        return Err(PackagingError::SourceNotFound(source_dir.to_path_buf()));
    }
    if !source_dir.is_dir() {
        return Err(PackagingError::NotADirectory(source_dir.to_path_buf()));
    }
    Ok(())
}

/// Name of the top-level folder inside both archive formats.
///
/// Resolved on the canonical path so that `.` and `..` name the real directory.
fn archive_root_name(source_dir: &Path) -> Result<PathBuf, PackagingError> {
    let canonical = source_dir
        .canonicalize()
        .map_err(PackagingError::io(source_dir))?;
    canonical
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| PackagingError::NotADirectory(canonical.clone()))
}

fn absolute(path: &Path) -> Result<PathBuf, PackagingError> {
    std::path::absolute(path).map_err(PackagingError::io(path))
}

/// Relative path of `path` below `base`.
fn relative_to<'a>(path: &'a Path, base: &Path) -> Result<&'a Path, PackagingError> {
    path.strip_prefix(base)
        .map_err(|_| PackagingError::StripPrefix {
            prefix: base.to_path_buf(),
            path: path.to_path_buf(),
        })
}

/// Prints the outcome of one packager and turns it into the public result.
fn report(
    format: ArchiveFormat,
    file_name: String,
    source_dir: &Path,
    outcome: Result<(), PackagingError>,
) -> PackageResult {
    let result = outcome.and_then(|()| {
        Ok(ArchiveReport {
            format,
            source_abs: absolute(source_dir)?,
            output_abs: absolute(Path::new(&file_name))?,
            file_name,
        })
    });

    match &result {
        Ok(report) => {
            tracing::info!(%format, output = %report.output_abs.display(), "archive created");
            println!("Created {format} archive: {}", report.file_name);
            println!("Source directory: {}", report.source_abs.display());
            println!("Output file: {}", report.output_abs.display());
        }
        Err(e) => {
            tracing::error!(%format, error = %e, "archive creation failed");
            println!("Failed to create {format} archive: {e}");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_from_common_spellings() {
        assert_eq!("tar.gz".parse::<ArchiveFormat>(), Ok(ArchiveFormat::TarGz));
        assert_eq!(".tgz".parse::<ArchiveFormat>(), Ok(ArchiveFormat::TarGz));
        assert_eq!("ZIP".parse::<ArchiveFormat>(), Ok(ArchiveFormat::Zip));
        assert!("7z".parse::<ArchiveFormat>().is_err());
        // A bare tar is not gzip-compressed; it is not an alias.
        assert!("tar".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn root_name_is_the_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let site = tmp.path().join("site");
        std::fs::create_dir_all(site.join("nested")).unwrap();

        assert_eq!(archive_root_name(&site).unwrap(), PathBuf::from("site"));
        assert_eq!(
            archive_root_name(&site.join("nested/..")).unwrap(),
            PathBuf::from("site")
        );
    }

    #[test]
    fn missing_source_is_reported() {
        let err = ensure_source_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
