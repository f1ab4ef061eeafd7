//! Resolved configuration values.

use std::fmt::Display;
use std::path::PathBuf;

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A type-checked configuration value.
///
/// Tuples are stored as [`Value::List`]s of fixed length and enum literals as
/// [`Value::Str`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// An optional variable that was not set.
    Absent,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// An exact decimal number.
    Decimal(Decimal),
    /// A string or enum literal.
    Str(ArcStr),
    /// A path that existed when the configuration was resolved.
    Path(PathBuf),
    /// A list or tuple.
    List(Vec<Value>),
    /// A string-keyed dictionary.
    Dict(IndexMap<ArcStr, Value>),
}

impl Value {
    /// Returns `true` if this is [`Value::Absent`].
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Bool(_) => "a boolean",
            Self::Int(_) => "an integer",
            Self::Decimal(_) => "a decimal",
            Self::Str(_) => "a string",
            Self::Path(_) => "a path",
            Self::List(_) => "a list",
            Self::Dict(_) => "a dictionary",
        }
    }

    /// The string exported to external tools through their environment.
    ///
    /// Booleans become `1`/`0`, lists are joined with single spaces and
    /// dictionaries are written as JSON.
    pub fn to_env_string(&self) -> String {
        match self {
            Self::Absent => String::new(),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Str(s) => s.to_string(),
            Self::Path(p) => p.display().to_string(),
            Self::List(items) => items
                .iter()
                .map(Value::to_env_string)
                .collect::<Vec<_>>()
                .join(" "),
            Self::Dict(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_env_string())
    }
}

/// Converts an exact decimal into a JSON number, keeping its textual form.
pub(crate) fn decimal_to_json(d: Decimal) -> serde_json::Value {
    let text = d.normalize().to_string();
    match text.parse::<serde_json::Number>() {
        Ok(n) => serde_json::Value::Number(n),
        Err(_) => serde_json::Value::String(text),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Decimal(d) => decimal_to_json(*d).serialize(serializer),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Path(p) => serializer.serialize_str(&p.display().to_string()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Dict(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k.as_str(), v)?;
                }
                map.end()
            }
        }
    }
}
