use std::path::{Component, Path, PathBuf};

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipDateTime, ZipEntryBuilder};
use chrono::{DateTime, Local};
use tokio::fs::File;
use tokio::runtime::Builder;
use tokio_util::compat::TokioAsyncReadCompatExt;

use super::{
    ArchiveFormat, PackageResult, PackagingError, archive_root_name, ensure_source_dir,
    relative_to, report,
};
use crate::fs_utils::walk_files;
use crate::naming::resolve_archive_name;

/// A regular file and the name it gets inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub name_in_archive: String,
}

/// Packages every regular file under `source_dir` into a deflate zip.
///
/// Entry names are relative to the parent of `source_dir`, so they all start with
/// its basename. Each entry keeps the file's modification time and, on Unix, its
/// mode. Empty directories are not recorded.
///
/// The async writer runs on a current-thread runtime owned by this call; the
/// function blocks until the archive is closed.
pub fn create_zip_archive(
    source_dir: &Path,
    output_name: Option<&str>,
    prefix: &str,
) -> PackageResult {
    let file_name = resolve_archive_name(output_name, ArchiveFormat::Zip, prefix);
    tracing::debug!(source = %source_dir.display(), output = %file_name, "creating zip archive");

    let outcome = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(PackagingError::Runtime)
        .and_then(|rt| rt.block_on(write_zip(source_dir, Path::new(&file_name))));

    report(ArchiveFormat::Zip, file_name, source_dir, outcome)
}

/// Lists the files to store, with names rooted at the basename of `source`.
///
/// `source` is expected to be canonical. `skip` is left out when found.
pub fn collect_entries(
    source: &Path,
    skip: Option<&Path>,
) -> Result<Vec<FileEntry>, PackagingError> {
    let root = archive_root_name(source)?;

    walk_files(source)?
        .into_iter()
        .filter(|path| Some(path.as_path()) != skip)
        .map(|path| -> Result<FileEntry, PackagingError> {
            let name_in_archive = entry_name(&root.join(relative_to(&path, source)?));
            Ok(FileEntry {
                path,
                name_in_archive,
            })
        })
        .collect()
}

/// Zip entry names always use `/`, whatever the host separator.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_builder(name: String, metadata: &std::fs::Metadata) -> ZipEntryBuilder {
    let mut builder = ZipEntryBuilder::new(name.into(), Compression::Deflate);

    if let Ok(modified) = metadata.modified() {
        // DOS timestamps carry no zone: store the local wall clock.
        let local: DateTime<Local> = modified.into();
        let date = ZipDateTime::from_chrono(&local.naive_local().and_utc());
        builder = builder.last_modification_date(date);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder = builder.unix_permissions(metadata.permissions().mode() as u16);
    }

    builder
}

async fn write_zip(source_dir: &Path, output: &Path) -> Result<(), PackagingError> {
    ensure_source_dir(source_dir)?;
    let source = source_dir
        .canonicalize()
        .map_err(PackagingError::io(source_dir))?;

    let file = File::create(output)
        .await
        .map_err(PackagingError::io(output))?;
    let output_canon = output.canonicalize().map_err(PackagingError::io(output))?;

    let entries = collect_entries(&source, Some(&output_canon))?;
    tracing::debug!(count = entries.len(), "writing zip entries");

    let mut writer = ZipFileWriter::with_tokio(file);
    for fe in entries {
        let src = File::open(&fe.path)
            .await
            .map_err(PackagingError::io(&fe.path))?;

        let metadata = src
            .metadata()
            .await
            .map_err(PackagingError::io(&fe.path))?;

        let builder = entry_builder(fe.name_in_archive, &metadata);
        let mut entry_writer = writer.write_entry_stream(builder).await?;
        futures::io::copy(src.compat(), &mut entry_writer)
            .await
            .map_err(PackagingError::io(&fe.path))?;
        entry_writer.close().await?;
    }

    writer.close().await?;
    Ok(())
}
