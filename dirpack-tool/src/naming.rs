use chrono::{DateTime, Local, TimeZone};

use crate::packaging::ArchiveFormat;

/// Prefix of generated archive names when none is configured.
pub const DEFAULT_PREFIX: &str = "backup";

/// Resolves the file name of an archive.
///
/// Without a name, one is generated as `<prefix>_<YYYYMMDD_HHMMSS><ext>` from the
/// local clock. A supplied name that lacks the format's extension gets it appended
/// verbatim, so `x.tar` becomes `x.tar.tar.gz`.
pub fn resolve_archive_name(name: Option<&str>, format: ArchiveFormat, prefix: &str) -> String {
    resolve_archive_name_at(name, format, prefix, &Local::now())
}

pub fn resolve_archive_name_at<Tz: TimeZone>(
    name: Option<&str>,
    format: ArchiveFormat,
    prefix: &str,
    now: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let ext = format.extension();
    match name {
        Some(name) if name.ends_with(ext) => name.to_string(),
        Some(name) => format!("{name}{ext}"),
        None => format!("{prefix}_{}{ext}", now.format("%Y%m%d_%H%M%S")),
    }
}
