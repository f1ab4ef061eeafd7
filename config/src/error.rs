//! Configuration errors and issues.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, IssueSet, Severity};
use thiserror::Error;

use crate::types::CoerceError;

/// The result type returned by this crate.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// A configuration error.
#[derive(Clone, Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        source: Arc<std::io::Error>,
    },
    /// A configuration file could not be parsed.
    #[error("failed to parse `{}`: {message}", .path.display())]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },
    /// A configuration file is neither JSON nor TOML.
    #[error("unsupported configuration format `{}`, expected `.json` or `.toml`", .0.display())]
    UnsupportedFormat(PathBuf),
    /// A legacy Tcl configuration file was given.
    #[error(
        "Tcl configuration files are not supported (`{}`), convert it to `.json` or `.toml`",
        .0.display()
    )]
    TclUnsupported(PathBuf),
    /// A raw configuration was not a key/value mapping.
    #[error("configuration must be an object mapping variable names to values")]
    NotAnObject,
    /// An override was not of the form `KEY=VALUE`.
    #[error("invalid override `{0}`, expected `KEY=VALUE`")]
    InvalidOverride(String),
    /// Two step families declare the same variable differently.
    #[error("variable `{name}` is declared more than once with different definitions")]
    ConflictingDeclaration {
        /// The variable name.
        name: ArcStr,
    },
    /// The configuration failed validation.
    #[error("invalid configuration ({} error(s)):\n{issues}", .issues.num_errors())]
    Invalid {
        /// Every error and warning found.
        issues: IssueSet<ConfigIssue>,
    },
    /// A variable that was never resolved was requested.
    #[error("variable `{0}` is not part of this configuration")]
    Undeclared(ArcStr),
    /// A variable was requested as the wrong type.
    #[error("variable `{name}` is {found}, not {expected}")]
    WrongType {
        /// The variable name.
        name: ArcStr,
        /// The requested type.
        expected: &'static str,
        /// The kind of the stored value.
        found: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// A problem found while resolving a configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigIssue {
    /// A value was supplied under a deprecated name.
    AliasUsed {
        /// The deprecated name.
        alias: ArcStr,
        /// The canonical name.
        canonical: ArcStr,
    },
    /// A deprecated name was ignored because a higher priority name was set.
    AliasShadowed {
        /// The ignored name.
        alias: ArcStr,
        /// The name whose value was used.
        used: ArcStr,
    },
    /// A required variable has no value.
    Missing {
        /// The variable name.
        name: ArcStr,
    },
    /// A value could not be converted to its declared type.
    Coercion {
        /// The variable name.
        name: ArcStr,
        /// The key the value was supplied under.
        key: ArcStr,
        /// The underlying error.
        error: CoerceError,
    },
    /// A key does not correspond to any declared variable.
    UnknownKey {
        /// The key.
        key: ArcStr,
        /// Whether unknown keys are fatal.
        severity: Severity,
    },
    /// A key names a variable that no longer exists.
    Removed {
        /// The key.
        key: ArcStr,
        /// Why the variable was removed.
        reason: &'static str,
    },
    /// `DIODE_INSERTION_STRATEGY` was rewritten into its replacements.
    DiodeStrategyMigrated {
        /// The legacy strategy.
        strategy: i64,
    },
    /// `DIODE_INSERTION_STRATEGY` has no equivalent.
    DiodeStrategyUnavailable {
        /// The legacy value, as supplied.
        value: String,
    },
}

impl Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AliasUsed { alias, canonical } => write!(
                f,
                "the variable `{alias}` is deprecated, its value was migrated to `{canonical}`"
            ),
            Self::AliasShadowed { alias, used } => {
                write!(f, "`{alias}` is ignored because `{used}` is also set")
            }
            Self::Missing { name } => write!(f, "required variable `{name}` is not set"),
            Self::Coercion { name, key, error } if name == key => {
                write!(f, "invalid value for `{name}`: {error}")
            }
            Self::Coercion { name, key, error } => {
                write!(f, "invalid value for `{name}` (set as `{key}`): {error}")
            }
            Self::UnknownKey { key, .. } => write!(f, "unknown key `{key}`"),
            Self::Removed { key, reason } => write!(f, "`{key}` has been removed: {reason}"),
            Self::DiodeStrategyMigrated { strategy } => write!(
                f,
                "DIODE_INSERTION_STRATEGY {strategy} is deprecated and was rewritten into \
                 GRT_REPAIR_ANTENNAS, RUN_HEURISTIC_DIODE_INSERTION and DIODE_ON_PORTS"
            ),
            Self::DiodeStrategyUnavailable { value } => {
                write!(f, "DIODE_INSERTION_STRATEGY `{value}` is no longer available")
            }
        }
    }
}

impl Diagnostic for ConfigIssue {
    fn severity(&self) -> Severity {
        match self {
            Self::AliasUsed { .. } => Severity::Info,
            Self::AliasShadowed { .. } | Self::Removed { .. } => Severity::Warning,
            Self::DiodeStrategyMigrated { .. } => Severity::Warning,
            Self::Missing { .. } | Self::Coercion { .. } => Severity::Error,
            Self::DiodeStrategyUnavailable { .. } => Severity::Error,
            Self::UnknownKey { severity, .. } => *severity,
        }
    }

    fn help(&self) -> Option<Box<dyn Display>> {
        match self {
            Self::AliasUsed { canonical, .. } => {
                Some(Box::new(format!("rename the key to `{canonical}`")))
            }
            Self::DiodeStrategyUnavailable { .. } => Some(Box::new(
                "set GRT_REPAIR_ANTENNAS, RUN_HEURISTIC_DIODE_INSERTION and DIODE_ON_PORTS instead",
            )),
            _ => None,
        }
    }
}
