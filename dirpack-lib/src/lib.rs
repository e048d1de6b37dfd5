use serde::{Deserialize, Serialize};

/// Packaging settings shared by every configuration source
/// (environment, config file, command line).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory to package. Defaults to the directory holding the executable.
    pub source: Option<String>,
    pub config: Option<String>,
    /// Archive formats to produce, e.g. `["tar.gz", "zip"]`.
    pub formats: Option<Vec<String>>,
    /// Prefix of generated archive names.
    pub prefix: Option<String>,
    pub tar_name: Option<String>,
    pub zip_name: Option<String>,
    /// Directory the archive names are resolved against.
    pub output_dir: Option<String>,
    pub dry: Option<bool>,
}

impl Config {
    /// Merge configs by priority: env < file < cli
    pub fn merge(env: Config, file: Config, cli: Config) -> Config {
        fn pick<T>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
            cli.or(file).or(env)
        }

        Config {
            source: pick(env.source, file.source, cli.source),
            config: pick(env.config, file.config, cli.config),
            formats: pick(env.formats, file.formats, cli.formats),
            prefix: pick(env.prefix, file.prefix, cli.prefix),
            tar_name: pick(env.tar_name, file.tar_name, cli.tar_name),
            zip_name: pick(env.zip_name, file.zip_name, cli.zip_name),
            output_dir: pick(env.output_dir, file.output_dir, cli.output_dir),
            dry: pick(env.dry, file.dry, cli.dry),
        }
    }
}
