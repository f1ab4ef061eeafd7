//! Unvalidated key/value configuration as read from disk.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{ConfigError, Result};

/// An unvalidated configuration mapping, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawConfig {
    values: IndexMap<String, Json>,
    dir: Option<PathBuf>,
}

impl RawConfig {
    /// Creates an empty raw configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON or TOML configuration file, picking the format by extension.
    ///
    /// The file's parent directory becomes the design directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut raw = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            Some("tcl") => return Err(ConfigError::TclUnsupported(path.to_path_buf())),
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
        .map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            e => e,
        })?;
        raw.dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(path = %path.display(), keys = raw.len(), "loaded configuration");
        Ok(raw)
    }

    /// Parses a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_json(json)
    }

    /// Parses a TOML table.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let values: IndexMap<String, Json> =
            toml::from_str(text).map_err(|e| ConfigError::Parse {
                path: PathBuf::new(),
                message: e.to_string(),
            })?;
        Ok(Self { values, dir: None })
    }

    /// Wraps a JSON object.
    pub fn from_json(json: Json) -> Result<Self> {
        let Json::Object(map) = json else {
            return Err(ConfigError::NotAnObject);
        };
        Ok(Self {
            values: map.into_iter().collect(),
            dir: None,
        })
    }

    /// The `meta.version` of the configuration, if it declares one.
    ///
    /// Version 2 and later configurations are resolved strictly: keys that
    /// match no variable are errors rather than warnings.
    pub fn meta_version(&self) -> Option<u64> {
        self.values.get("meta")?.get("version")?.as_u64()
    }

    /// Applies a `KEY=VALUE` override. The value is kept as a string.
    pub fn apply_override(&mut self, directive: &str) -> Result<()> {
        let Some((key, value)) = directive.split_once('=') else {
            return Err(ConfigError::InvalidOverride(directive.to_string()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidOverride(directive.to_string()));
        }
        self.values
            .insert(key.to_string(), Json::String(value.to_string()));
        Ok(())
    }

    /// Sets a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes and returns the value under `key`, keeping the order of the rest.
    pub(crate) fn take(&mut self, key: &str) -> Option<Json> {
        self.values.shift_remove(key)
    }

    /// Iterates over keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The directory of the file this configuration was loaded from.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Sets the design directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}
