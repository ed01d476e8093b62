use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::pipeline::processing::identifiers::MatchIdStrategy;

pub const DEFAULT_CONFIG_PATH: &str = "rugby_ingest.toml";
pub const CONFIG_PATH_ENV: &str = "RUGBY_INGEST_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
}

/// When match and team competition references are checked against the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossReferencePolicy {
    /// Only when the batch carried competition records
    #[default]
    WhenIndexed,
    /// Always; a batch without competitions excludes every match and team
    Strict,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub match_id_strategy: MatchIdStrategy,
    pub cross_reference: CrossReferencePolicy,
    pub check_data_summary: bool,
    pub fill_match_timezone: bool,
    pub parallel: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            match_id_strategy: MatchIdStrategy::Ordinal,
            cross_reference: CrossReferencePolicy::WhenIndexed,
            check_data_summary: false,
            fill_match_timezone: true,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub filter: String,
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rugby_ingest=info".to_string(),
            directory: PathBuf::from("logs"),
            file_prefix: "rugby_ingest.log".to_string(),
        }
    }
}

impl Config {
    /// Load from `RUGBY_INGEST_CONFIG`, else `rugby_ingest.toml`.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.loader.parallel);
        assert!(!config.loader.check_data_summary);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[loader]
match_id_strategy = "content-hash"
cross_reference = "strict"

[logging]
filter = "rugby_ingest=debug"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.loader.match_id_strategy, MatchIdStrategy::ContentHash);
        assert_eq!(config.loader.cross_reference, CrossReferencePolicy::Strict);
        assert!(config.loader.fill_match_timezone);
        assert_eq!(config.logging.filter, "rugby_ingest=debug");
        assert_eq!(config.logging.directory, PathBuf::from("logs"));
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let err = Config::from_toml_str("[loader]\nmatch_id_strategy = \"uuid\"\n").unwrap_err();
        assert!(matches!(err, IngestError::Toml(_)));
    }
}
