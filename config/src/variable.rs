//! Configuration variable declarations.

use arcstr::ArcStr;
use indexmap::IndexMap;
use indexmap::map::Entry;
use rust_decimal::Decimal;
use serde_json::Value as Json;

use crate::error::{ConfigError, Result};
use crate::types::{VarType, parse_decimal};
use crate::value::decimal_to_json;

/// A conversion from a deprecated variable's value to its replacement's.
///
/// Every migration is total: values outside the documented domain pass
/// through unchanged and are left to type coercion.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum Migration {
    /// The value is carried over unchanged.
    #[default]
    Identity,
    /// A comma-separated string becomes a list of trimmed strings.
    CommaList,
    /// A fraction (number or numeric string) is multiplied by 100.
    FractionToPercent,
}

impl Migration {
    /// Applies the migration to a raw value.
    pub fn apply(&self, value: Json) -> Json {
        match self {
            Self::Identity => value,
            Self::CommaList => match value {
                Json::String(s) => Json::Array(
                    s.split(',')
                        .map(|item| Json::String(item.trim().to_string()))
                        .collect(),
                ),
                other => other,
            },
            Self::FractionToPercent => {
                let fraction = match &value {
                    Json::Number(n) => parse_decimal(&n.to_string()),
                    Json::String(s) => parse_decimal(s),
                    _ => None,
                };
                match fraction.and_then(|f| f.checked_mul(Decimal::ONE_HUNDRED)) {
                    Some(pct) => decimal_to_json(pct),
                    None => value,
                }
            }
        }
    }
}

/// A deprecated name accepted in place of a variable's canonical name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Alias {
    /// The deprecated name.
    pub name: ArcStr,
    /// The conversion applied to values supplied under this name.
    pub migration: Migration,
}

/// A declared configuration variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    /// The canonical, upper-snake-case name.
    pub name: ArcStr,
    /// The declared type.
    pub ty: VarType,
    /// A human readable description.
    pub description: ArcStr,
    /// The default, coerced like any other raw value.
    pub default: Option<Json>,
    /// The units of the value, if any.
    pub units: Option<ArcStr>,
    /// Deprecated names, in lookup order.
    pub aliases: Vec<Alias>,
    /// Whether the value is normally supplied by the PDK.
    pub pdk: bool,
}

impl Variable {
    /// Declares a variable with no default, units or aliases.
    pub fn new(name: impl Into<ArcStr>, ty: VarType, description: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            default: None,
            units: None,
            aliases: Vec::new(),
            pdk: false,
        }
    }

    /// Sets the default value.
    pub fn default(mut self, default: impl Into<Json>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the units.
    pub fn units(mut self, units: impl Into<ArcStr>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Adds a deprecated name whose value is carried over unchanged.
    pub fn alias(self, name: impl Into<ArcStr>) -> Self {
        self.alias_with(name, Migration::Identity)
    }

    /// Adds a deprecated name whose value is converted with `migration`.
    pub fn alias_with(mut self, name: impl Into<ArcStr>, migration: Migration) -> Self {
        self.aliases.push(Alias {
            name: name.into(),
            migration,
        });
        self
    }

    /// Marks the variable as PDK-scoped.
    pub fn pdk(mut self) -> Self {
        self.pdk = true;
        self
    }

    /// Returns `true` if the variable may resolve to [`Value::Absent`](crate::Value::Absent).
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.ty.is_optional()
    }
}

/// Merges the variable lists of several step families into one list.
///
/// The first declaration of a name wins and keeps its position. Identical
/// redeclarations are dropped; differing ones are an error.
pub fn merge_variables<'a, I>(families: I) -> Result<Vec<Variable>>
where
    I: IntoIterator<Item = &'a [Variable]>,
{
    let mut merged: IndexMap<ArcStr, Variable> = IndexMap::new();
    for family in families {
        for var in family {
            match merged.entry(var.name.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(var.clone());
                }
                Entry::Occupied(entry) => {
                    if entry.get() != var {
                        return Err(ConfigError::ConflictingDeclaration {
                            name: var.name.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(merged.into_values().collect())
}
