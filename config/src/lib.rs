//! Typed flow configuration.
//!
//! Steps declare the [`Variable`]s they read. A [`Resolver`] combines a
//! design's [`RawConfig`] with the PDK defaults, migrates values supplied
//! under deprecated names and coerces everything into an immutable
//! [`Config`]. Problems are collected as [`ConfigIssue`]s rather than
//! failing at the first one.

#![warn(missing_docs)]

pub mod error;
pub mod raw;
pub mod resolve;
pub mod types;
pub mod value;
pub mod variable;


use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub use diagnostics::Severity;
pub use error::{ConfigError, ConfigIssue, Result};
pub use raw::RawConfig;
pub use resolve::{Resolver, UnknownKeyPolicy, resolve};
pub use types::{CoerceError, VarType};
pub use value::Value;
pub use variable::{Alias, Migration, Variable, merge_variables};

/// An immutable mapping from canonical variable names to resolved values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    values: IndexMap<ArcStr, Value>,
    design_dir: PathBuf,
}

impl Config {
    pub(crate) fn from_values(values: IndexMap<ArcStr, Value>, design_dir: PathBuf) -> Self {
        Self { values, design_dir }
    }

    /// The directory relative paths were resolved against.
    pub fn design_dir(&self) -> &Path {
        &self.design_dir
    }

    /// Returns the value of `name`, if it was resolved.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` if `name` was resolved to a value other than [`Value::Absent`].
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_absent())
    }

    /// Iterates over all values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArcStr, &Value)> {
        self.values.iter()
    }

    /// The number of resolved variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no variables were resolved.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy with `name` set to `value`.
    ///
    /// Used by steps to compute derived values without touching the
    /// shared configuration.
    pub fn with(&self, name: impl Into<ArcStr>, value: Value) -> Self {
        let mut copy = self.clone();
        copy.values.insert(name.into(), value);
        copy
    }

    /// Returns a copy restricted to the given variables, in their order.
    pub fn filtered(&self, variables: &[Variable]) -> Self {
        let values = variables
            .iter()
            .filter_map(|var| {
                self.values
                    .get(&var.name)
                    .map(|value| (var.name.clone(), value.clone()))
            })
            .collect();
        Self {
            values,
            design_dir: self.design_dir.clone(),
        }
    }

    /// The configuration as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Every set value as an environment variable for external tools.
    pub fn env(&self) -> impl Iterator<Item = (&str, String)> {
        self.values
            .iter()
            .filter(|(_, value)| !value.is_absent())
            .map(|(name, value)| (name.as_str(), value.to_env_string()))
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| ConfigError::Undeclared(name.into()))
    }

    fn optional(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|value| !value.is_absent())
    }

    fn wrong_type(name: &str, expected: &'static str, found: &Value) -> ConfigError {
        ConfigError::WrongType {
            name: name.into(),
            expected,
            found: found.kind(),
        }
    }
}

macro_rules! typed_getters {
    ($(($get:ident, $opt:ident, $ty:ty, $expected:expr, $pat:pat => $out:expr)),* $(,)?) => {
        impl Config {
            $(
                #[doc = concat!("Returns the value of `name` as ", $expected, ".")]
                pub fn $get(&self, name: &str) -> Result<$ty> {
                    match self.require(name)? {
                        $pat => Ok($out),
                        other => Err(Self::wrong_type(name, $expected, other)),
                    }
                }

                #[doc = concat!("Returns the value of `name` as ", $expected, ", or `None` if it is unset.")]
                pub fn $opt(&self, name: &str) -> Result<Option<$ty>> {
                    match self.optional(name) {
                        None => Ok(None),
                        Some($pat) => Ok(Some($out)),
                        Some(other) => Err(Self::wrong_type(name, $expected, other)),
                    }
                }
            )*
        }
    };
}

typed_getters!(
    (bool, opt_bool, bool, "a boolean", Value::Bool(b) => *b),
    (int, opt_int, i64, "an integer", Value::Int(i) => *i),
    (str, opt_str, &str, "a string", Value::Str(s) => s.as_str()),
    (path, opt_path, &Path, "a path", Value::Path(p) => p.as_path()),
    (list, opt_list, &[Value], "a list", Value::List(items) => items.as_slice()),
    (dict, opt_dict, &IndexMap<ArcStr, Value>, "a dictionary", Value::Dict(d) => d),
);

impl Config {
    /// Returns the value of `name` as a decimal. Integers are widened.
    pub fn decimal(&self, name: &str) -> Result<Decimal> {
        match self.require(name)? {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            other => Err(Self::wrong_type(name, "a decimal", other)),
        }
    }

    /// Returns the value of `name` as a decimal, or `None` if it is unset.
    pub fn opt_decimal(&self, name: &str) -> Result<Option<Decimal>> {
        match self.optional(name) {
            None => Ok(None),
            Some(_) => self.decimal(name).map(Some),
        }
    }

    /// Returns a list of strings or paths as strings.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>> {
        self.list(name)?
            .iter()
            .map(|item| match item {
                Value::Str(s) => Ok(s.to_string()),
                Value::Path(p) => Ok(p.display().to_string()),
                other => Err(Self::wrong_type(name, "a list of strings", other)),
            })
            .collect()
    }

    /// Like [`Config::str_list`], treating an unset variable as an empty list.
    pub fn opt_str_list(&self, name: &str) -> Result<Vec<String>> {
        match self.optional(name) {
            None => Ok(Vec::new()),
            Some(_) => self.str_list(name),
        }
    }
}

impl Serialize for Config {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.values.iter() {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}
