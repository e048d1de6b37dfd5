use clap::Parser;
use dirpack_lib::Config;
use std::{collections::HashMap, env, fs};

mod fs_utils;
mod naming;
mod packaging;
mod process;
mod telemetry;

use process::{Plan, dry_run, run};

#[derive(Parser, Debug)]
#[command(author, version, about = "Packages a directory into .tar.gz and .zip archives", long_about = None)]
pub struct Cli {
    /// Directory to package (defaults to the directory of this executable)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Archive format to produce [tar.gz|zip], repeatable (default: both)
    #[arg(short, long = "format")]
    pub formats: Vec<String>,

    /// Prefix of generated archive names
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Name of the tar.gz archive; `.tar.gz` is appended when missing
    #[arg(long)]
    pub tar_name: Option<String>,

    /// Name of the zip archive; `.zip` is appended when missing
    #[arg(long)]
    pub zip_name: Option<String>,

    /// Directory to write the archives into
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Dry run (just list files and archive names)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing()?;

    // env < file < CLI
    let env_config = read_env();

    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    let merged = Config::merge(env_config, file_config, cli_to_config(&cli));

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(());
    }

    let plan = Plan::from_config(&merged)?;
    if plan.dry {
        return dry_run(&plan);
    }

    // Packaging failures are printed by `run`; the exit status stays successful.
    run(&plan);
    Ok(())
}

/// Reads environment variables prefixed with DIRPACK_
fn read_env() -> Config {
    let vars: HashMap<String, String> = env::vars().collect();
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> Config {
    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("DIRPACK_{}", $key)).cloned()
        };
    }

    Config {
        source: get_env!("SOURCE"),
        config: get_env!("CONFIG"),
        formats: get_env!("FORMATS").map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }),
        prefix: get_env!("PREFIX"),
        tar_name: get_env!("TAR_NAME"),
        zip_name: get_env!("ZIP_NAME"),
        output_dir: get_env!("OUTPUT_DIR"),
        dry: get_env!("DRY").map(|v| v == "true" || v == "1" || v.eq_ignore_ascii_case("yes")),
    }
}

/// Reads YAML or JSON config from file
fn read_config_file(path: &str) -> anyhow::Result<Config> {
    use anyhow::Context;

    let content = fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let cfg = if path.to_lowercase().ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON config {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML config {path}"))?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config
fn cli_to_config(cli: &Cli) -> Config {
    Config {
        source: cli.source.clone(),
        config: cli.config.clone(),
        formats: if cli.formats.is_empty() {
            None
        } else {
            Some(cli.formats.clone())
        },
        prefix: cli.prefix.clone(),
        tar_name: cli.tar_name.clone(),
        zip_name: cli.zip_name.clone(),
        output_dir: cli.output_dir.clone(),
        // An unset flag must not shadow DIRPACK_DRY or the config file.
        dry: cli.dry.then_some(true),
    }
}
