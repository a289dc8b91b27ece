//! Configuration handling for the emulator binary.
//!
//! Settings come from an optional YAML file, then environment variables, then
//! command-line flags, each layer overriding the previous one. Loading runs
//! before the log subscriber exists, so it returns `LoadNote`s for the caller
//! to log afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the profile path
pub const ENV_PROFILE: &str = "CEC_EMU_PROFILE";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "CEC_EMU_LOG_LEVEL";
/// Environment variable overriding the message interval
pub const ENV_INTERVAL_MS: &str = "CEC_EMU_INTERVAL_MS";

/// Something loading the configuration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNote {
    /// Settings were read from this file
    Loaded(PathBuf),
    /// No file at this path, defaults apply
    Missing(PathBuf),
    /// An environment variable replaced a setting
    Override(&'static str, String),
    /// An environment variable was ignored
    InvalidOverride(&'static str, String),
}

impl LoadNote {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => info!("Loaded configuration from {:?}", path),
            Self::Missing(path) => warn!("Config file {:?} not found, using defaults", path),
            Self::Override(key, value) => info!("{} overridden by environment: {}", key, value),
            Self::InvalidOverride(key, value) => warn!("Ignoring invalid {}={}", key, value),
        }
    }
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Device profile to load
    pub profile_path: PathBuf,
    /// Log level for the emulator crates
    pub log_level: String,
    /// Pause between injected control-plane messages
    pub message_interval_ms: u64,
    /// Claim logical address 0 after opening when emulating a TV
    pub claim_logical_address: bool,
    /// Control-plane message files to inject, in order
    pub messages: Vec<PathBuf>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("profiles/tv.yaml"),
            log_level: "info".to_string(),
            message_interval_ms: 100,
            claim_logical_address: true,
            messages: Vec::new(),
        }
    }
}

/// Root of the config file
#[derive(Debug, Default, Deserialize)]
struct RootConfig {
    emulator: Option<EmulatorSection>,
}

/// Every field is optional so partial files only override what they name
#[derive(Debug, Default, Deserialize)]
struct EmulatorSection {
    profile: Option<PathBuf>,
    log_level: Option<String>,
    message_interval_ms: Option<u64>,
    claim_logical_address: Option<bool>,
    messages: Option<Vec<PathBuf>>,
}

impl EmulatorConfig {
    /// Load configuration from file and environment variables.
    ///
    /// A missing file means defaults; a file that cannot be read or does not
    /// parse is an error.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<(Self, Vec<LoadNote>)> {
        let config_path = config_path.as_ref();
        let mut config = Self::default();
        let mut notes = Vec::new();

        match std::fs::read_to_string(config_path) {
            Ok(content) => {
                let root: RootConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("failed to parse config file {:?}", config_path))?;
                config.apply_root_config(root, config_path.parent());
                notes.push(LoadNote::Loaded(config_path.to_path_buf()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                notes.push(LoadNote::Missing(config_path.to_path_buf()));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config file {:?}", config_path));
            }
        }

        notes.extend(config.apply_overrides(|key| std::env::var(key).ok()));
        Ok((config, notes))
    }

    /// Relative paths in the file are resolved against the file's directory
    fn apply_root_config(&mut self, root: RootConfig, base: Option<&Path>) {
        let Some(section) = root.emulator else {
            return;
        };
        let resolve = |path: PathBuf| match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        };

        if let Some(profile) = section.profile {
            self.profile_path = resolve(profile);
        }
        if let Some(level) = section.log_level {
            self.log_level = level;
        }
        if let Some(interval) = section.message_interval_ms {
            self.message_interval_ms = interval;
        }
        if let Some(claim) = section.claim_logical_address {
            self.claim_logical_address = claim;
        }
        if let Some(messages) = section.messages {
            self.messages = messages.into_iter().map(resolve).collect();
        }
    }

    /// Apply variable overrides, `lookup` reads one variable
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<LoadNote> {
        let mut notes = Vec::new();

        if let Some(profile) = lookup(ENV_PROFILE) {
            self.profile_path = PathBuf::from(&profile);
            notes.push(LoadNote::Override(ENV_PROFILE, profile));
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.clone();
            notes.push(LoadNote::Override(ENV_LOG_LEVEL, level));
        }

        if let Some(interval) = lookup(ENV_INTERVAL_MS) {
            match interval.parse::<u64>() {
                Ok(ms) => {
                    self.message_interval_ms = ms;
                    notes.push(LoadNote::Override(ENV_INTERVAL_MS, interval));
                }
                Err(_) => notes.push(LoadNote::InvalidOverride(ENV_INTERVAL_MS, interval)),
            }
        }

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.profile_path, PathBuf::from("profiles/tv.yaml"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.message_interval_ms, 100);
        assert!(config.claim_logical_address);
        assert!(config.messages.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
emulator:
  profile: /etc/cec/soundbar.yaml
  log_level: debug
  message_interval_ms: 250
  claim_logical_address: false
  messages:
    - messages/active_source.yaml
    - /tmp/standby.yaml
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let mut config = EmulatorConfig::default();
        let root: RootConfig = serde_yaml::from_str(yaml_content).unwrap();
        config.apply_root_config(root, temp_file.path().parent());

        assert_eq!(config.profile_path, PathBuf::from("/etc/cec/soundbar.yaml"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.message_interval_ms, 250);
        assert!(!config.claim_logical_address);
        assert_eq!(
            config.messages[0],
            temp_file.path().parent().unwrap().join("messages/active_source.yaml")
        );
        assert_eq!(config.messages[1], PathBuf::from("/tmp/standby.yaml"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"emulator:\n  log_level: warn\n").unwrap();

        let mut config = EmulatorConfig::default();
        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        config.apply_root_config(serde_yaml::from_str(&content).unwrap(), None);

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.message_interval_ms, 100);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"emulator: [unclosed").unwrap();
        assert!(EmulatorConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_PROFILE, "/srv/profile.yaml"),
            (ENV_LOG_LEVEL, "trace"),
            (ENV_INTERVAL_MS, "not-a-number"),
        ]);

        let mut config = EmulatorConfig::default();
        let notes = config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.profile_path, PathBuf::from("/srv/profile.yaml"));
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.message_interval_ms, 100);
        assert_eq!(
            notes,
            vec![
                LoadNote::Override(ENV_PROFILE, "/srv/profile.yaml".to_string()),
                LoadNote::Override(ENV_LOG_LEVEL, "trace".to_string()),
                LoadNote::InvalidOverride(ENV_INTERVAL_MS, "not-a-number".to_string()),
            ]
        );

        let notes = config.apply_overrides(|key| (key == ENV_INTERVAL_MS).then(|| "5".to_string()));
        assert_eq!(config.message_interval_ms, 5);
        assert_eq!(notes, vec![LoadNote::Override(ENV_INTERVAL_MS, "5".to_string())]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let (_config, notes) = EmulatorConfig::load_from_file(&path).unwrap();
        assert_eq!(notes.first(), Some(&LoadNote::Missing(path)));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();
        let err = EmulatorConfig::load_from_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
