//! Resolution of raw configuration into a typed [`Config`].

use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use diagnostics::{IssueSet, Severity};
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{ConfigError, ConfigIssue, Result};
use crate::raw::RawConfig;
use crate::value::Value;
use crate::variable::Variable;
use crate::Config;

/// Keys that are consumed by the flow itself and never reported as unknown.
pub const RESERVED_KEYS: &[&str] = &["meta", "DESIGN_DIR", "PDK", "PDK_ROOT", "STD_CELL_LIBRARY"];

/// Variables that existed in earlier releases, with the reason for their removal.
pub const REMOVED_VARIABLES: &[(&str, &str)] = &[
    (
        "PL_ESTIMATE_PARASITICS",
        "parasitics are always estimated after global placement",
    ),
    (
        "GRT_ESTIMATE_PARASITICS",
        "parasitics are always estimated after global routing",
    ),
    (
        "FP_PDN_AUTO_ADJUST",
        "PDN pitch and offset are no longer adjusted automatically",
    ),
    ("RUN_SPEF_EXTRACTION", "parasitic extraction is a step of its own"),
    ("GLB_RT_MAXLAYER", "use RT_MAX_LAYER instead"),
    (
        "USE_ARC_ANTENNA_CHECK",
        "antenna checks are always run by OpenROAD",
    ),
];

/// What to do with design keys that match no declared variable.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    /// Unknown keys are errors.
    Error,
    /// Unknown keys are warnings.
    #[default]
    Warn,
    /// Unknown keys are not reported.
    Ignore,
}

/// Resolves raw configurations against a list of declared variables.
#[derive(Clone, Debug)]
pub struct Resolver<'a> {
    variables: &'a [Variable],
    design_dir: Option<PathBuf>,
    unknown_keys: UnknownKeyPolicy,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver for the given variables, in resolution order.
    pub fn new(variables: &'a [Variable]) -> Self {
        Self {
            variables,
            design_dir: None,
            unknown_keys: UnknownKeyPolicy::default(),
        }
    }

    /// Sets the directory relative paths are resolved against.
    ///
    /// Defaults to the directory of the design configuration file, or the
    /// current directory when there is none.
    pub fn design_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.design_dir = Some(dir.into());
        self
    }

    /// Sets the policy for unknown design keys.
    ///
    /// A design declaring `meta.version` 2 or later turns [`UnknownKeyPolicy::Warn`]
    /// into [`UnknownKeyPolicy::Error`].
    pub fn unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    /// Resolves `design` on top of `pdk`.
    ///
    /// On success, returns the configuration along with any non-fatal issues.
    /// If any error is found, every issue is returned in [`ConfigError::Invalid`].
    pub fn resolve(
        &self,
        design: &RawConfig,
        pdk: &RawConfig,
    ) -> Result<(Config, IssueSet<ConfigIssue>)> {
        let design_dir = self
            .design_dir
            .clone()
            .or_else(|| design.dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut leftover = design.clone();
        let mut issues = IssueSet::new();
        rewrite_diode_strategy(&mut leftover, &mut issues);

        let mut values = IndexMap::with_capacity(self.variables.len());
        for var in self.variables {
            let span = tracing::trace_span!("resolve", name = %var.name);
            let _guard = span.enter();
            if let Some(value) = lookup(var, &mut leftover, pdk, &design_dir, &mut issues) {
                values.insert(var.name.clone(), value);
            }
        }

        let policy = match (self.unknown_keys, design.meta_version()) {
            (UnknownKeyPolicy::Warn, Some(version)) if version >= 2 => UnknownKeyPolicy::Error,
            (policy, _) => policy,
        };

        let mut keys = leftover.keys().map(ArcStr::from).collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            if is_ignored_key(&key) {
                continue;
            }
            let removed = REMOVED_VARIABLES
                .iter()
                .find(|(name, _)| *name == key.as_str());
            if let Some(&(_, reason)) = removed {
                issues.add(ConfigIssue::Removed { key, reason });
                continue;
            }
            let severity = match policy {
                UnknownKeyPolicy::Error => Severity::Error,
                UnknownKeyPolicy::Warn => Severity::Warning,
                UnknownKeyPolicy::Ignore => continue,
            };
            issues.add(ConfigIssue::UnknownKey { key, severity });
        }

        if issues.has_error() {
            return Err(ConfigError::Invalid { issues });
        }
        Ok((Config::from_values(values, design_dir), issues))
    }
}

/// Resolves `design` on top of `pdk` with default settings.
pub fn resolve(
    variables: &[Variable],
    design: &RawConfig,
    pdk: &RawConfig,
) -> Result<(Config, IssueSet<ConfigIssue>)> {
    Resolver::new(variables).resolve(design, pdk)
}

fn is_ignored_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
        || key.starts_with("//")
        || key.starts_with('#')
        || key.contains("_OPT")
}

fn present(value: Option<Json>) -> Option<Json> {
    value.filter(|v| !v.is_null())
}

/// Finds and coerces the value of one variable, consuming its keys from `design`.
fn lookup(
    var: &Variable,
    design: &mut RawConfig,
    pdk: &RawConfig,
    design_dir: &Path,
    issues: &mut IssueSet<ConfigIssue>,
) -> Option<Value> {
    let canonical = present(design.take(&var.name));
    let aliased = var
        .aliases
        .iter()
        .filter_map(|alias| present(design.take(&alias.name)).map(|v| (alias, v)))
        .collect::<Vec<_>>();

    let mut source: Option<(ArcStr, Json)> = None;
    if let Some(value) = canonical {
        source = Some((var.name.clone(), value));
    }
    for (alias, value) in aliased {
        match source.as_ref().map(|(used, _)| used.clone()) {
            Some(used) => issues.add(ConfigIssue::AliasShadowed {
                alias: alias.name.clone(),
                used,
            }),
            None => {
                issues.add(ConfigIssue::AliasUsed {
                    alias: alias.name.clone(),
                    canonical: var.name.clone(),
                });
                source = Some((alias.name.clone(), alias.migration.apply(value)));
            }
        }
    }

    let source = source
        .or_else(|| present(pdk.get(&var.name).cloned()).map(|v| (var.name.clone(), v)))
        .or_else(|| {
            var.aliases.iter().find_map(|alias| {
                present(pdk.get(&alias.name).cloned()).map(|v| {
                    issues.add(ConfigIssue::AliasUsed {
                        alias: alias.name.clone(),
                        canonical: var.name.clone(),
                    });
                    (alias.name.clone(), alias.migration.apply(v))
                })
            })
        })
        .or_else(|| var.default.clone().map(|v| (var.name.clone(), v)));

    let Some((key, raw)) = source else {
        if var.is_optional() {
            return Some(Value::Absent);
        }
        issues.add(ConfigIssue::Missing {
            name: var.name.clone(),
        });
        return None;
    };

    match var.ty.coerce(&raw, design_dir) {
        Ok(value) => {
            tracing::trace!(key = %key, value = %value, "resolved");
            Some(value)
        }
        Err(error) => {
            issues.add(ConfigIssue::Coercion {
                name: var.name.clone(),
                key,
                error,
            });
            None
        }
    }
}

/// Rewrites the legacy `DIODE_INSERTION_STRATEGY` into its replacement variables.
fn rewrite_diode_strategy(design: &mut RawConfig, issues: &mut IssueSet<ConfigIssue>) {
    let Some(raw) = present(design.take("DIODE_INSERTION_STRATEGY")) else {
        return;
    };
    let strategy = match &raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let strategy = match strategy {
        Some(s) if (0..=6).contains(&s) && ![1, 2, 5].contains(&s) => s,
        _ => {
            let value = match raw {
                Json::String(s) => s,
                other => other.to_string(),
            };
            issues.add(ConfigIssue::DiodeStrategyUnavailable { value });
            return;
        }
    };

    design.set("GRT_REPAIR_ANTENNAS", matches!(strategy, 3 | 6));
    design.set("RUN_HEURISTIC_DIODE_INSERTION", matches!(strategy, 4 | 6));
    design.set(
        "DIODE_ON_PORTS",
        if matches!(strategy, 4 | 6) { "in" } else { "none" },
    );
    issues.add(ConfigIssue::DiodeStrategyMigrated { strategy });
}
