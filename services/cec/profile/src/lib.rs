//! Hierarchical key-value profile reader.
//!
//! Device profiles describe the ports and the device tree of the emulated
//! HDMI network. They are YAML (or JSON) documents addressed with
//! slash-separated key paths such as `hdmicec/device_map/0/children/1/name`.
//!
//! A path segment selects a mapping key. When the current node is a sequence,
//! a numeric segment indexes it; mappings keyed by integers are also reachable
//! through the numeric segment. Empty segments are ignored, so a prefix of
//! `""` joined with `/name` resolves to the top-level `name` key.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Profile errors
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Profile file could not be read
    #[error("failed to read profile {path:?}: {source}")]
    Io {
        /// Path of the profile
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Profile text is not valid YAML/JSON
    #[error("failed to parse profile: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Key path does not exist
    #[error("missing profile key: {0}")]
    Missing(String),

    /// Key exists but holds a value of the wrong kind
    #[error("profile key {key} is not a {expected}")]
    Type {
        /// Key path
        key: String,
        /// Expected kind of value
        expected: &'static str,
    },
}

/// Maps a missing key to `None`, keeping every other error
pub trait OptionalField<T> {
    /// Convert `Err(Missing)` into `Ok(None)`
    fn optional(self) -> Result<Option<T>, ProfileError>;
}

impl<T> OptionalField<T> for Result<T, ProfileError> {
    fn optional(self) -> Result<Option<T>, ProfileError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ProfileError::Missing(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Join a key prefix and a relative key
pub fn join(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// A loaded profile document
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    root: Value,
    source: Option<PathBuf>,
}

impl Profile {
    /// Load a profile from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profile = Self::from_slice(&bytes)?;
        profile.source = Some(path.to_path_buf());
        debug!("Loaded profile from {:?}", path);
        Ok(profile)
    }

    /// Parse a profile from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProfileError> {
        Ok(Self::from_value(serde_yaml::from_slice(bytes)?))
    }

    /// Wrap an already parsed document
    pub fn from_value(root: Value) -> Self {
        Self { root, source: None }
    }

    /// File the profile was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve a key path to its raw value
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| step(node, segment))
    }

    /// Whether the key path exists
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of entries of the sequence or mapping at `key`, 0 when absent
    pub fn len(&self, key: &str) -> usize {
        match self.lookup(key) {
            Some(Value::Sequence(seq)) => seq.len(),
            Some(Value::Mapping(map)) => map.len(),
            _ => 0,
        }
    }

    /// Whether the document is empty
    pub fn is_empty(&self) -> bool {
        matches!(self.root, Value::Null)
    }

    /// String value at `key`; numbers and booleans are rendered as text
    pub fn get_str(&self, key: &str) -> Result<String, ProfileError> {
        match self.require(key)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(type_error(key, "string")),
        }
    }

    /// Unsigned integer value at `key`, decimal or `0x` hex strings accepted
    pub fn get_u32(&self, key: &str) -> Result<u32, ProfileError> {
        let value = match self.require(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_u64(s.trim()),
            _ => None,
        };
        value
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| type_error(key, "unsigned integer"))
    }

    /// Boolean value at `key`, the strings `true`/`false` accepted
    pub fn get_bool(&self, key: &str) -> Result<bool, ProfileError> {
        match self.require(key)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(type_error(key, "boolean")),
        }
    }

    fn require(&self, key: &str) -> Result<&Value, ProfileError> {
        self.lookup(key)
            .ok_or_else(|| ProfileError::Missing(key.to_string()))
    }
}

impl FromStr for Profile {
    type Err = ProfileError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_value(serde_yaml::from_str(text)?))
    }
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map.get(segment).or_else(|| {
            let index = segment.parse::<u64>().ok()?;
            map.get(Value::Number(index.into()))
        }),
        Value::Sequence(seq) => seq.get(segment.parse::<usize>().ok()?),
        Value::Tagged(tagged) => step(&tagged.value, segment),
        _ => None,
    }
}

fn parse_u64(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn type_error(key: &str, expected: &'static str) -> ProfileError {
    ProfileError::Type {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PROFILE: &str = r#"
hdmicec:
  emulated_device: TV
  number_devices: 2
  ports:
    - id: 1
      type: in
      cec_supported: true
      arc_supported: "false"
  device_map:
    0:
      name: TV
      version: "0x05"
      number_children: 1
      children:
        0:
          name: Playback1
          port_id: 1
"#;

    #[test]
    fn test_lookup_paths() {
        let profile: Profile = PROFILE.parse().unwrap();

        assert_eq!(profile.get_str("hdmicec/emulated_device").unwrap(), "TV");
        assert_eq!(profile.get_u32("hdmicec/ports/0/id").unwrap(), 1);
        assert_eq!(
            profile
                .get_str("hdmicec/device_map/0/children/0/name")
                .unwrap(),
            "Playback1"
        );
        assert!(profile.contains("hdmicec/device_map/0"));
        assert!(!profile.contains("hdmicec/device_map/1"));
        assert_eq!(profile.len("hdmicec/ports"), 1);
        assert_eq!(profile.len("hdmicec/nothing"), 0);
    }

    #[test]
    fn test_typed_getters() {
        let profile: Profile = PROFILE.parse().unwrap();

        assert_eq!(profile.get_u32("hdmicec/device_map/0/version").unwrap(), 5);
        assert!(profile.get_bool("hdmicec/ports/0/cec_supported").unwrap());
        assert!(!profile.get_bool("hdmicec/ports/0/arc_supported").unwrap());
        assert_eq!(profile.get_str("hdmicec/number_devices").unwrap(), "2");

        assert!(matches!(
            profile.get_u32("hdmicec/emulated_device"),
            Err(ProfileError::Type { .. })
        ));
        assert!(matches!(
            profile.get_bool("hdmicec/missing"),
            Err(ProfileError::Missing(_))
        ));
    }

    #[test]
    fn test_optional_field() {
        let profile: Profile = PROFILE.parse().unwrap();

        assert_eq!(profile.get_u32("hdmicec/nope").optional().unwrap(), None);
        assert_eq!(
            profile.get_u32("hdmicec/number_devices").optional().unwrap(),
            Some(2)
        );
        assert!(profile.get_u32("hdmicec/emulated_device").optional().is_err());
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join("hdmicec/device_map/0", "name"), "hdmicec/device_map/0/name");
        assert_eq!(join("", "name"), "/name");

        let profile: Profile = "name: Soundbar\nport_id: 2".parse().unwrap();
        assert_eq!(profile.get_str(&join("", "name")).unwrap(), "Soundbar");
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PROFILE.as_bytes()).unwrap();

        let profile = Profile::from_path(file.path()).unwrap();
        assert_eq!(profile.source(), Some(file.path()));
        assert_eq!(profile.len("hdmicec/device_map"), 1);

        assert!(matches!(
            Profile::from_path("/nonexistent/profile.yaml"),
            Err(ProfileError::Io { .. })
        ));
    }

    #[test]
    fn test_json_documents() {
        let profile =
            Profile::from_slice(br#"{"state": "PrintStatus", "parameters": {"status": "Ports"}}"#)
                .unwrap();
        assert_eq!(profile.get_str("parameters/status").unwrap(), "Ports");
    }
}
