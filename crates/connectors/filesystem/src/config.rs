use hermaion_common::Result;
use serde::Deserialize;

const CONFIG_PATH_VAR: &str = "HERMAION_CONFIG_PATH";
const ENV_PREFIX: &str = "HERMAION";

/// Which plan `rename_columns` and `cast` build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    /// Every mutator composes onto the current plan.
    #[default]
    Compose,
    /// `rename_columns` and `cast` start again from the freshly opened scan,
    /// dropping earlier mutations. `select_columns` still composes.
    Rebase,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CsvSettings {
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_schema_infer_max_records")]
    pub schema_infer_max_records: usize,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            has_header: default_has_header(),
            delimiter: default_delimiter(),
            schema_infer_max_records: default_schema_infer_max_records(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectorSettings {
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(default)]
    pub mutation_mode: MutationMode,
    #[serde(default)]
    pub csv: CsvSettings,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            sample_rows: default_sample_rows(),
            mutation_mode: MutationMode::default(),
            csv: CsvSettings::default(),
        }
    }
}

fn default_sample_rows() -> usize {
    100
}

fn default_has_header() -> bool {
    true
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_schema_infer_max_records() -> usize {
    1000
}

impl ConnectorSettings {
    /// Loads settings from the file named by `HERMAION_CONFIG_PATH` (if set),
    /// overlaid with `HERMAION_*` environment variables.
    pub fn new() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR).ok();
        Self::load(path.as_deref(), environment())
    }

    /// Loads settings from an explicit file, overlaid with the environment.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path), environment())
    }

    fn load(path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }
}

// HERMAION_SAMPLE_ROWS, HERMAION_CSV__HAS_HEADER, ...
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_without_sources() {
        let settings = ConnectorSettings::load(None, env_from(&[])).unwrap();
        assert_eq!(settings, ConnectorSettings::default());
        assert_eq!(settings.sample_rows, 100);
        assert_eq!(settings.mutation_mode, MutationMode::Compose);
        assert!(settings.csv.has_header);
        assert_eq!(settings.csv.delimiter, ",");
    }

    #[test]
    fn environment_overrides_defaults() {
        let env = env_from(&[
            ("HERMAION_SAMPLE_ROWS", "7"),
            ("HERMAION_MUTATION_MODE", "rebase"),
            ("HERMAION_CSV__HAS_HEADER", "false"),
        ]);
        let settings = ConnectorSettings::load(None, env).unwrap();
        assert_eq!(settings.sample_rows, 7);
        assert_eq!(settings.mutation_mode, MutationMode::Rebase);
        assert!(!settings.csv.has_header);
    }

    #[test]
    fn file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hermaion.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "sample_rows = 25\n\n[csv]\ndelimiter = \";\"").unwrap();

        let env = env_from(&[("HERMAION_SAMPLE_ROWS", "30")]);
        let settings = ConnectorSettings::load(path.to_str(), env).unwrap();
        assert_eq!(settings.sample_rows, 30);
        assert_eq!(settings.csv.delimiter, ";");
        assert_eq!(settings.csv.schema_infer_max_records, 1000);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = ConnectorSettings::load(Some("/definitely/not/here.toml"), env_from(&[]));
        assert!(matches!(result, Err(hermaion_common::Error::Config(_))));
    }
}
