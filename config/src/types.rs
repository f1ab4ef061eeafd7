//! Declared variable types and coercion of raw values into them.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as Json;
use thiserror::Error;

use crate::value::Value;

/// Prefix marking a path as relative to the design directory.
pub const DESIGN_DIR_PREFIX: &str = "dir::";

/// The declared type of a configuration variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarType {
    /// `true`/`false`.
    Bool,
    /// A signed integer.
    Int,
    /// An exact decimal number.
    Decimal,
    /// Free-form text.
    Str,
    /// An existing file or directory.
    Path,
    /// One of a fixed set of string literals.
    Enum(Vec<ArcStr>),
    /// A value that may be absent.
    Optional(Box<VarType>),
    /// A homogeneous list.
    List(Box<VarType>),
    /// A fixed-length heterogeneous list.
    Tuple(Vec<VarType>),
    /// A dictionary from strings to values of one type.
    Dict(Box<VarType>),
}

impl VarType {
    /// An optional value of type `inner`.
    pub fn optional(inner: VarType) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// A list of `inner`.
    pub fn list(inner: VarType) -> Self {
        Self::List(Box::new(inner))
    }

    /// A dictionary with values of type `inner`.
    pub fn dict(inner: VarType) -> Self {
        Self::Dict(Box::new(inner))
    }

    /// An enumeration of the given literals.
    pub fn literals<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArcStr>,
    {
        Self::Enum(literals.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if unset values of this type resolve to [`Value::Absent`].
    #[inline]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Coerces a raw value into this type.
    ///
    /// Relative paths are resolved against `design_dir`.
    pub fn coerce(&self, raw: &Json, design_dir: &Path) -> Result<Value, CoerceError> {
        match self {
            Self::Optional(inner) => match raw {
                Json::Null => Ok(Value::Absent),
                Json::String(s) if s.is_empty() => Ok(Value::Absent),
                _ => inner.coerce(raw, design_dir),
            },
            Self::Bool => coerce_bool(raw).map(Value::Bool),
            Self::Int => coerce_int(raw).map(Value::Int),
            Self::Decimal => coerce_decimal(raw).map(Value::Decimal),
            Self::Str => match raw {
                Json::String(s) => Ok(Value::Str(s.as_str().into())),
                Json::Number(n) => Ok(Value::Str(n.to_string().into())),
                Json::Bool(b) => Ok(Value::Str(b.to_string().into())),
                _ => Err(CoerceError::expected(self, raw)),
            },
            Self::Path => match raw {
                Json::String(s) => coerce_path(s, design_dir).map(Value::Path),
                _ => Err(CoerceError::expected(self, raw)),
            },
            Self::Enum(literals) => match raw {
                Json::String(s) if literals.iter().any(|l| l == s) => {
                    Ok(Value::Str(s.as_str().into()))
                }
                Json::String(s) => Err(CoerceError::Literal {
                    value: s.clone(),
                    allowed: literals.clone(),
                }),
                _ => Err(CoerceError::expected(self, raw)),
            },
            Self::List(inner) => {
                let items = sequence(raw).ok_or_else(|| CoerceError::expected(self, raw))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        inner
                            .coerce(item, design_dir)
                            .map_err(|e| e.at_index(index))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Self::Tuple(types) => {
                let items = sequence(raw).ok_or_else(|| CoerceError::expected(self, raw))?;
                if items.len() != types.len() {
                    return Err(CoerceError::Arity {
                        expected: types.len(),
                        found: items.len(),
                    });
                }
                types
                    .iter()
                    .zip(items.iter())
                    .enumerate()
                    .map(|(index, (ty, item))| {
                        ty.coerce(item, design_dir).map_err(|e| e.at_index(index))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Self::Dict(inner) => {
                let Json::Object(entries) = raw else {
                    return Err(CoerceError::expected(self, raw));
                };
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    let value = inner
                        .coerce(item, design_dir)
                        .map_err(|e| e.at_key(key))?;
                    out.insert(ArcStr::from(key.as_str()), value);
                }
                Ok(Value::Dict(out))
            }
        }
    }
}

impl Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Decimal => write!(f, "decimal"),
            Self::Str => write!(f, "str"),
            Self::Path => write!(f, "path"),
            Self::Enum(literals) => {
                let literals = literals.iter().map(|l| l.as_str()).collect::<Vec<_>>();
                write!(f, "one of [{}]", literals.join(", "))
            }
            Self::Optional(inner) => write!(f, "optional {inner}"),
            Self::List(inner) => write!(f, "list of {inner}"),
            Self::Tuple(types) => {
                let types = types.iter().map(|t| t.to_string()).collect::<Vec<_>>();
                write!(f, "tuple ({})", types.join(", "))
            }
            Self::Dict(inner) => write!(f, "dict of {inner}"),
        }
    }
}

/// A raw value that could not be converted to its declared type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoerceError {
    /// The raw value has the wrong shape.
    #[error("expected {expected}, found `{found}`")]
    Expected {
        /// The declared type.
        expected: String,
        /// The raw value, as JSON.
        found: String,
    },
    /// An enum value is not one of the declared literals.
    #[error("`{value}` is not one of [{}]", .allowed.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", "))]
    Literal {
        /// The raw value.
        value: String,
        /// The declared literals.
        allowed: Vec<ArcStr>,
    },
    /// A tuple has the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    Arity {
        /// The declared arity.
        expected: usize,
        /// The number of elements found.
        found: usize,
    },
    /// A path does not exist.
    #[error("path `{}` does not exist", .0.display())]
    PathNotFound(PathBuf),
    /// An element of a list, tuple or dictionary failed to coerce.
    #[error("at {location}: {source}")]
    Element {
        /// The index or key of the element.
        location: String,
        /// The underlying error.
        source: Box<CoerceError>,
    },
}

impl CoerceError {
    fn expected(ty: &VarType, raw: &Json) -> Self {
        Self::Expected {
            expected: ty.to_string(),
            found: raw.to_string(),
        }
    }

    fn at_index(self, index: usize) -> Self {
        Self::Element {
            location: format!("index {index}"),
            source: Box::new(self),
        }
    }

    fn at_key(self, key: &str) -> Self {
        Self::Element {
            location: format!("key `{key}`"),
            source: Box::new(self),
        }
    }
}

/// Splits a legacy string-encoded list.
///
/// Strings containing a comma are split on commas, anything else on
/// whitespace. Elements are trimmed and empty elements are dropped.
pub fn split_legacy_list(s: &str) -> Vec<&str> {
    if s.contains(',') {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        s.split_whitespace().collect()
    }
}

fn sequence(raw: &Json) -> Option<Vec<Json>> {
    match raw {
        Json::Array(items) => Some(items.clone()),
        Json::String(s) => Some(
            split_legacy_list(s)
                .into_iter()
                .map(|item| Json::String(item.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn coerce_bool(raw: &Json) -> Result<bool, CoerceError> {
    match raw {
        Json::Bool(b) => Ok(*b),
        Json::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Json::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Json::String(s) if s == "1" || s.eq_ignore_ascii_case("true") => Ok(true),
        Json::String(s) if s == "0" || s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(CoerceError::expected(&VarType::Bool, raw)),
    }
}

/// Parses a decimal from its textual form, accepting scientific notation.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn coerce_decimal(raw: &Json) -> Result<Decimal, CoerceError> {
    let parsed = match raw {
        Json::Number(n) => parse_decimal(&n.to_string()),
        Json::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed.ok_or_else(|| CoerceError::expected(&VarType::Decimal, raw))
}

fn coerce_int(raw: &Json) -> Result<i64, CoerceError> {
    if let Json::Number(n) = raw {
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
    }
    coerce_decimal(raw)
        .ok()
        .filter(|d| d.fract().is_zero())
        .and_then(|d| d.to_i64())
        .ok_or_else(|| CoerceError::expected(&VarType::Int, raw))
}

fn coerce_path(s: &str, design_dir: &Path) -> Result<PathBuf, CoerceError> {
    let s = s.strip_prefix(DESIGN_DIR_PREFIX).unwrap_or(s);
    let path = design_dir.join(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(CoerceError::PathNotFound(path))
    }
}
