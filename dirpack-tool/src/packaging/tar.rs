use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::{
    ArchiveFormat, PackageResult, PackagingError, archive_root_name, ensure_source_dir,
    relative_to, report,
};
use crate::fs_utils::walk_tree;
use crate::naming::resolve_archive_name;

/// Packages `source_dir` into a gzip-compressed tarball.
///
/// Every entry lives under a top-level folder named after the source directory.
/// Symlinks are archived as symlinks. Failures are printed and returned, never
/// propagated as panics. A partially written archive is left on disk if writing
/// fails midway.
pub fn create_tar_archive(
    source_dir: &Path,
    output_name: Option<&str>,
    prefix: &str,
) -> PackageResult {
    let file_name = resolve_archive_name(output_name, ArchiveFormat::TarGz, prefix);
    tracing::debug!(source = %source_dir.display(), output = %file_name, "creating tar.gz archive");

    let outcome = write_tar_gz(source_dir, Path::new(&file_name));
    report(ArchiveFormat::TarGz, file_name, source_dir, outcome)
}

fn write_tar_gz(source_dir: &Path, output: &Path) -> Result<(), PackagingError> {
    ensure_source_dir(source_dir)?;
    let root = archive_root_name(source_dir)?;

    let file = File::create(output).map_err(PackagingError::io(output))?;
    let output_canon = output.canonicalize().map_err(PackagingError::io(output))?;
    let source_canon = source_dir
        .canonicalize()
        .map_err(PackagingError::io(source_dir))?;

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    // Symlinks are stored as links, dangling ones included.
    builder.follow_symlinks(false);
    append_tree(&mut builder, &source_canon, &root, &output_canon)?;

    let encoder = builder.into_inner().map_err(PackagingError::io(output))?;
    encoder.finish().map_err(PackagingError::io(output))?;
    Ok(())
}

/// Appends `source` under `root`, one entry at a time so that a failure names
/// the entry it happened on. `skip` (the archive being written) is left out.
fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    source: &Path,
    root: &Path,
    skip: &Path,
) -> Result<(), PackagingError> {
    builder
        .append_dir(root, source)
        .map_err(PackagingError::io(source))?;

    for entry in walk_tree(source)? {
        if entry.path == skip {
            tracing::debug!(path = %entry.path.display(), "skipping the archive being written");
            continue;
        }

        let name = root.join(relative_to(&entry.path, source)?);
        let appended = if entry.is_dir {
            builder.append_dir(&name, &entry.path)
        } else {
            builder.append_path_with_name(&entry.path, &name)
        };
        appended.map_err(PackagingError::io(&entry.path))?;
    }
    Ok(())
}
