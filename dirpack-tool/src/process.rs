use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirpack_lib::Config;

use crate::fs_utils::{encode_size, format_size_mb, total_size};
use crate::naming::{DEFAULT_PREFIX, resolve_archive_name};
use crate::packaging::{
    ArchiveFormat, PackageResult, create_tar_archive, create_zip_archive, zip::collect_entries,
};

const RULE: &str = "==================================================";

/// Fully resolved packaging job, built from the merged [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub source: PathBuf,
    pub formats: Vec<ArchiveFormat>,
    pub prefix: String,
    pub tar_name: Option<String>,
    pub zip_name: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub dry: bool,
}

impl Plan {
    pub fn from_config(config: &Config) -> Result<Plan> {
        let source = match &config.source {
            Some(source) => PathBuf::from(source),
            None => default_source_dir()?,
        };

        let requested = match &config.formats {
            Some(formats) if !formats.is_empty() => formats
                .iter()
                .map(|f| f.parse::<ArchiveFormat>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?,
            _ => vec![ArchiveFormat::TarGz, ArchiveFormat::Zip],
        };
        // Tar always runs before zip, whatever order was asked for.
        let formats = [ArchiveFormat::TarGz, ArchiveFormat::Zip]
            .into_iter()
            .filter(|f| requested.contains(f))
            .collect();

        Ok(Plan {
            source,
            formats,
            prefix: config
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            tar_name: config.tar_name.clone(),
            zip_name: config.zip_name.clone(),
            output_dir: config.output_dir.as_ref().map(PathBuf::from),
            dry: config.dry.unwrap_or(false),
        })
    }

    /// Name handed to the packager for `format`.
    ///
    /// Without an output directory the configured name (or none) is passed through
    /// and the packager resolves it. With one, the name is resolved here so it can
    /// be placed inside that directory.
    pub fn output_name(&self, format: ArchiveFormat) -> Option<String> {
        let configured = match format {
            ArchiveFormat::TarGz => self.tar_name.as_deref(),
            ArchiveFormat::Zip => self.zip_name.as_deref(),
        };

        match &self.output_dir {
            None => configured.map(str::to_string),
            Some(dir) => {
                let name = resolve_archive_name(configured, format, &self.prefix);
                Some(dir.join(name).to_string_lossy().into_owned())
            }
        }
    }
}

/// The directory holding the running executable.
pub fn default_source_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable has no parent directory")
}

/// Per-format outcome of one run.
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<PackageResult>,
}

impl RunSummary {
    /// True only when every requested packager succeeded.
    pub fn succeeded(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }

    /// Name and byte size of every produced archive still on disk.
    pub fn archive_sizes(&self) -> Vec<(String, u64)> {
        self.results
            .iter()
            .flatten()
            .filter_map(|report| {
                let meta = fs::metadata(&report.file_name).ok()?;
                meta.is_file().then(|| (report.file_name.clone(), meta.len()))
            })
            .collect()
    }
}

/// Runs the packagers of `plan` in sequence and prints the summary.
///
/// Packager failures are reported, never returned as errors.
pub fn run(plan: &Plan) -> RunSummary {
    println!("Packaging {}...", plan.source.display());
    println!("{RULE}");
    tracing::info!(source = %plan.source.display(), formats = ?plan.formats, "packaging started");

    let mut results = Vec::with_capacity(plan.formats.len());
    for (i, format) in plan.formats.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let name = plan.output_name(*format);
        let result = match format {
            ArchiveFormat::TarGz => create_tar_archive(&plan.source, name.as_deref(), &plan.prefix),
            ArchiveFormat::Zip => create_zip_archive(&plan.source, name.as_deref(), &plan.prefix),
        };
        results.push(result);
    }

    println!("{RULE}");
    let summary = RunSummary { results };

    if summary.succeeded() {
        println!("Packaging complete!");
        println!("Archive sizes:");
        for (name, bytes) in summary.archive_sizes() {
            println!("  - {name}: {}", format_size_mb(bytes));
        }
    } else {
        tracing::warn!("at least one archive could not be created");
        println!("Packaging failed, see the errors above");
    }

    summary
}

/// Lists what `run` would package without writing anything.
pub fn dry_run(plan: &Plan) -> Result<()> {
    let source = plan
        .source
        .canonicalize()
        .with_context(|| format!("resolving source directory {:?}", plan.source))?;
    let entries = collect_entries(&source, None)?;
    let files: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();
    let total = total_size(&files)?;

    println!("--- DRY RUN ---");
    println!("Source: {}", source.display());
    for entry in &entries {
        println!("  {} -> {}", entry.path.display(), entry.name_in_archive);
    }
    println!("Total files: {}", entries.len());
    println!("Total size: {}", encode_size(total));
    for format in &plan.formats {
        let name = resolve_archive_name(
            plan.output_name(*format).as_deref(),
            *format,
            &plan.prefix,
        );
        println!("Would write {format} archive: {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn plan_for(source: &Path, output_dir: &Path) -> Plan {
        Plan::from_config(&Config {
            source: Some(source.to_string_lossy().into_owned()),
            output_dir: Some(output_dir.to_string_lossy().into_owned()),
            prefix: Some("nightly".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn defaults_produce_both_formats_in_order() {
        let plan = Plan::from_config(&Config {
            source: Some("/tmp".into()),
            formats: Some(vec!["zip".into(), "tar.gz".into()]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(plan.formats, vec![ArchiveFormat::TarGz, ArchiveFormat::Zip]);
        assert_eq!(plan.prefix, DEFAULT_PREFIX);
        assert!(!plan.dry);
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let err = Plan::from_config(&Config {
            source: Some("/tmp".into()),
            formats: Some(vec!["rar".into()]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("rar"));
    }

    #[test]
    fn source_defaults_to_the_executable_directory() {
        let plan = Plan::from_config(&Config::default()).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(plan.source.as_path()), exe.parent());
    }

    #[test]
    fn output_names_are_placed_in_the_output_dir() {
        let mut plan = plan_for(Path::new("/srv/site"), Path::new("/backups"));
        plan.zip_name = Some("weekly".into());

        assert_eq!(plan.output_name(ArchiveFormat::Zip).as_deref(), Some("/backups/weekly.zip"));
        let tar = plan.output_name(ArchiveFormat::TarGz).unwrap();
        assert!(tar.starts_with("/backups/nightly_"), "{tar}");
        assert!(tar.ends_with(".tar.gz"), "{tar}");

        plan.output_dir = None;
        assert_eq!(plan.output_name(ArchiveFormat::Zip).as_deref(), Some("weekly"));
        assert_eq!(plan.output_name(ArchiveFormat::TarGz), None);
    }

    #[test]
    fn successful_run_reports_both_archives() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let src = tmp.path().join("site");
        fs::create_dir(&src)?;
        fs::write(src.join("index.html"), b"<html></html>")?;
        let out = tmp.path().join("out");
        fs::create_dir(&out)?;

        let summary = run(&plan_for(&src, &out));
        assert!(summary.succeeded());

        let sizes = summary.archive_sizes();
        assert_eq!(sizes.len(), 2);
        assert!(sizes[0].0.ends_with(".tar.gz"));
        assert!(sizes[1].0.ends_with(".zip"));
        assert!(sizes.iter().all(|(_, bytes)| *bytes > 0));
        Ok(())
    }

    #[test]
    fn missing_source_fails_both_packagers_without_panicking() {
        let tmp = tempdir().unwrap();
        let summary = run(&plan_for(&tmp.path().join("gone"), tmp.path()));

        assert!(!summary.succeeded());
        assert_eq!(summary.results.len(), 2);
        assert!(summary.results.iter().all(Result::is_err));
        assert!(summary.archive_sizes().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn one_failing_packager_fails_the_run_and_keeps_the_other_archive() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let src = tmp.path().join("site");
        fs::create_dir(&src)?;
        fs::write(src.join("index.html"), b"<html></html>")?;
        std::os::unix::fs::symlink("gone.css", src.join("style.css"))?;
        let out = tmp.path().join("out");
        fs::create_dir(&out)?;

        let summary = run(&plan_for(&src, &out));

        assert!(!summary.succeeded());
        assert!(summary.results[0].is_ok(), "tar stores the dangling link");
        assert!(summary.results[1].is_err(), "zip cannot read through it");
        let tar = summary.results[0].as_ref().unwrap();
        assert!(Path::new(&tar.file_name).is_file());
        Ok(())
    }

    #[test]
    fn dry_run_writes_nothing() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let src = tmp.path().join("site");
        fs::create_dir(&src)?;
        fs::write(src.join("a.txt"), b"a")?;
        let out = tmp.path().join("out");
        fs::create_dir(&out)?;

        dry_run(&plan_for(&src, &out))?;
        assert_eq!(fs::read_dir(&out)?.count(), 0);
        Ok(())
    }
}
