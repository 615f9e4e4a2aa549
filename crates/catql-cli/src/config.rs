use anyhow::{Context, Result};
use catql_streaming::DEFAULT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of every row stream in the pipeline
    pub channel_capacity: usize,
    /// Datasource name used when `--ds` is not given
    pub default_datasource: String,
    /// Print execution statistics to stderr when done
    pub show_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_datasource: "stdin".to_string(),
            show_stats: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_keys_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"show_stats": true}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.show_stats);
        assert_eq!(config.channel_capacity, 10);
        assert_eq!(config.default_datasource, "stdin");
    }

    #[test]
    fn test_full_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catql.json");
        let config = Config {
            channel_capacity: 64,
            default_datasource: "logs".to_string(),
            show_stats: true,
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::from_file(Path::new("/nonexistent/catql.json")).is_err());
    }
}
