// Deputy Configuration
// Loads the release key, matching level and run-loop settings from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::input::MatchLevel;
use crate::usage::{is_key_usage, KeyUsage};

/// Default poll timeout of the run loop
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 250;

const POLL_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 10..=5000;
const MAX_SESSIONS_RANGE: std::ops::RangeInclusive<usize> = 1..=64;

/// Runtime configuration of the daemon
///
/// Loaded from a TOML file (default: ~/.config/deputy/config.toml):
///
/// ```toml
/// [general]
/// release_key = "f12"
/// match_level = "interface"
/// max_sessions = 4
///
/// [runloop]
/// poll_timeout_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub release_key: KeyUsage,
    pub match_level: MatchLevel,
    pub max_sessions: Option<usize>,
    pub poll_timeout: Duration,

    /// File the settings came from, shown by `--check-config`
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid release key: {0}")]
    InvalidKey(String),

    #[error("Invalid match level '{0}' (expected 'device' or 'interface')")]
    InvalidMatchLevel(String),

    #[error("{name} = {value} is out of range {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    #[serde(default)]
    general: Option<GeneralSection>,

    #[serde(default)]
    runloop: Option<RunloopSection>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GeneralSection {
    #[serde(default)]
    release_key: Option<String>,

    #[serde(default)]
    match_level: Option<String>,

    #[serde(default)]
    max_sessions: Option<u64>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunloopSection {
    #[serde(default)]
    poll_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release_key: KeyUsage(0x04),
            match_level: MatchLevel::Device,
            max_sessions: None,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            source_path: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_toml(&content)?;
        config.source_path = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let parsed: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

        let mut config = Self::new();

        if let Some(general) = parsed.general {
            if let Some(name) = general.release_key {
                config.release_key = parse_release_key(&name)?;
            }
            if let Some(level) = general.match_level {
                config.match_level = parse_match_level(&level)?;
            }
            if let Some(max) = general.max_sessions {
                config.max_sessions = Some(check_max_sessions(max)?);
            }
        }

        if let Some(runloop) = parsed.runloop {
            if let Some(ms) = runloop.poll_timeout_ms {
                check_range("poll_timeout_ms", ms, POLL_TIMEOUT_RANGE)?;
                config.poll_timeout = Duration::from_millis(ms);
            }
        }

        Ok(config)
    }

    /// Get the default config path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("deputy").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// File this configuration was read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Override the release key by name
    pub fn set_release_key(&mut self, name: &str) -> Result<(), ConfigError> {
        self.release_key = parse_release_key(name)?;
        Ok(())
    }

    /// Override the matching level by name
    pub fn set_match_level(&mut self, name: &str) -> Result<(), ConfigError> {
        self.match_level = parse_match_level(name)?;
        Ok(())
    }

    /// Hold at most one device at a time
    pub fn set_single(&mut self) {
        self.max_sessions = Some(1);
    }

    /// Engine policy derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            match_level: self.match_level,
            release_key: self.release_key,
            max_sessions: self.max_sessions,
        }
    }
}

/// Parse a release key name; only real keys on the keyboard page qualify
pub fn parse_release_key(name: &str) -> Result<KeyUsage, ConfigError> {
    let usage: KeyUsage = name
        .parse()
        .map_err(|_| ConfigError::InvalidKey(name.to_string()))?;
    if !is_key_usage(usage.code()) {
        return Err(ConfigError::InvalidKey(format!(
            "{} (usage {:#04x} is not a key)",
            name,
            usage.code()
        )));
    }
    Ok(usage)
}

fn parse_match_level(name: &str) -> Result<MatchLevel, ConfigError> {
    name.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidMatchLevel(name.to_string()))
}

fn check_max_sessions(value: u64) -> Result<usize, ConfigError> {
    let (min, max) = (*MAX_SESSIONS_RANGE.start(), *MAX_SESSIONS_RANGE.end());
    check_range("max_sessions", value, min as u64..=max as u64)?;
    Ok(value as usize)
}

fn check_range(
    name: &'static str,
    value: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.release_key, KeyUsage(0x04));
        assert_eq!(config.match_level, MatchLevel::Device);
        assert_eq!(config.max_sessions, None);
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[general]
release_key = "F12"
match_level = "interface"
max_sessions = 4

[runloop]
poll_timeout_ms = 100
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.release_key, KeyUsage(0x45));
        assert_eq!(config.match_level, MatchLevel::Interface);
        assert_eq!(config.max_sessions, Some(4));
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = r#"
[general]
relase_key = "a"
"#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_invalid_release_key() {
        assert!(matches!(
            Config::from_toml("[general]\nrelease_key = \"hyper\""),
            Err(ConfigError::InvalidKey(_))
        ));
        // ERROR_ROLLOVER is a usage but not a key
        assert!(matches!(
            parse_release_key("error_rollover"),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_invalid_match_level() {
        assert!(matches!(
            Config::from_toml("[general]\nmatch_level = \"any\""),
            Err(ConfigError::InvalidMatchLevel(_))
        ));
    }

    #[test]
    fn test_out_of_range_values() {
        assert!(matches!(
            Config::from_toml("[general]\nmax_sessions = 0"),
            Err(ConfigError::OutOfRange { name: "max_sessions", .. })
        ));
        assert!(matches!(
            Config::from_toml("[runloop]\npoll_timeout_ms = 5"),
            Err(ConfigError::OutOfRange { name: "poll_timeout_ms", .. })
        ));
        assert!(Config::from_toml("[runloop]\npoll_timeout_ms = 5000").is_ok());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::new();
        config.set_release_key("escape").unwrap();
        config.set_match_level("Interface").unwrap();
        config.set_single();

        let engine = config.engine_config();
        assert_eq!(engine.release_key, KeyUsage(0x29));
        assert_eq!(engine.match_level, MatchLevel::Interface);
        assert_eq!(engine.max_sessions, Some(1));

        assert!(config.set_release_key("nope").is_err());
        assert_eq!(config.release_key, KeyUsage(0x29));
    }

    #[test]
    fn test_from_file_records_path() {
        let path = std::env::temp_dir().join(format!("deputy-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[general]\nrelease_key = \"b\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.release_key, KeyUsage(0x05));
        assert_eq!(config.source_path(), Some(path.as_path()));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_default_path_ends_with_deputy() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("deputy/config.toml"));
        }
    }
}
