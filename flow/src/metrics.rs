//! Metric values and cross-corner aggregation.

use std::fmt::Display;
use std::path::Path;

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::error::{Error, Result};

/// The separator between a metric's base name and its modifiers.
pub const MODIFIER_SEPARATOR: &str = "__";

/// An extended real number.
///
/// The variant order gives the total order `NegInf < Finite(_) < PosInf`.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum MetricValue {
    /// Negative infinity.
    NegInf,
    /// A finite, exact value.
    Finite(Decimal),
    /// Positive infinity.
    PosInf,
}

impl MetricValue {
    /// Zero.
    pub const ZERO: MetricValue = MetricValue::Finite(Decimal::ZERO);

    /// Adds two values, returning `None` for `+∞ + -∞` or on overflow.
    pub fn checked_add(self, other: MetricValue) -> Option<MetricValue> {
        use MetricValue::*;
        match (self, other) {
            (PosInf, NegInf) | (NegInf, PosInf) => None,
            (PosInf, _) | (_, PosInf) => Some(PosInf),
            (NegInf, _) | (_, NegInf) => Some(NegInf),
            (Finite(a), Finite(b)) => a.checked_add(b).map(Finite),
        }
    }

    /// Returns the finite value, if any.
    pub fn finite(&self) -> Option<Decimal> {
        match self {
            Self::Finite(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns `true` if the value is `+∞` or `-∞`.
    pub fn is_infinite(&self) -> bool {
        !matches!(self, Self::Finite(_))
    }

    /// Converts a JSON metric, accepting numbers, numeric strings and the
    /// `"Infinity"`/`"-Infinity"` literals.
    pub fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::Number(n) => config::types::parse_decimal(&n.to_string()).map(Self::Finite),
            Json::Bool(b) => Some(Self::Finite(Decimal::from(*b as i64))),
            Json::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The JSON form of the value. Infinities become string literals.
    pub fn to_json(&self) -> Json {
        match self {
            Self::NegInf => Json::String("-Infinity".into()),
            Self::PosInf => Json::String("Infinity".into()),
            Self::Finite(d) => d
                .normalize()
                .to_string()
                .parse::<serde_json::Number>()
                .map(Json::Number)
                .unwrap_or_else(|_| Json::String(d.to_string())),
        }
    }
}

impl std::str::FromStr for MetricValue {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Infinity" | "inf" | "+Infinity" => Ok(Self::PosInf),
            "-Infinity" | "-inf" => Ok(Self::NegInf),
            other => config::types::parse_decimal(other)
                .map(Self::Finite)
                .ok_or(()),
        }
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegInf => write!(f, "-Infinity"),
            Self::PosInf => write!(f, "Infinity"),
            Self::Finite(d) => write!(f, "{}", d.normalize()),
        }
    }
}

impl From<Decimal> for MetricValue {
    fn from(value: Decimal) -> Self {
        Self::Finite(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Finite(Decimal::from(value))
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Finite(Decimal::from(value))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        Self::Finite(Decimal::from(value))
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(&json)
            .ok_or_else(|| D::Error::custom(format!("`{json}` is not a metric value")))
    }
}

/// An ordered mapping from metric names to values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(IndexMap<ArcStr, MetricValue>);

impl Metrics {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a metric.
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.0.get(name).copied()
    }

    /// Sets a metric, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<ArcStr>, value: impl Into<MetricValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Iterates over metrics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArcStr, &MetricValue)> {
        self.0.iter()
    }

    /// The number of metrics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no metrics.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrites metrics with those of `other`, keeping the rest.
    pub fn update(&mut self, other: &Metrics) {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), *value);
        }
    }

    /// Loads a metrics JSON object written by an external tool.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let json: Json = serde_json::from_str(&text)
            .map_err(|e| Error::report(path, format!("invalid JSON: {e}")))?;
        let Json::Object(object) = json else {
            return Err(Error::report(path, "expected a JSON object of metrics"));
        };
        let mut metrics = Metrics::new();
        for (name, value) in object {
            let value = MetricValue::from_json(&value).ok_or_else(|| {
                Error::report(path, format!("metric `{name}` has non-numeric value `{value}`"))
            })?;
            metrics.insert(name, value);
        }
        Ok(metrics)
    }
}

impl FromIterator<(ArcStr, MetricValue)> for Metrics {
    fn from_iter<T: IntoIterator<Item = (ArcStr, MetricValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Splits a metric name into its base name and `key:value` modifiers.
///
/// `timing__setup__ws__corner:nom_tt` has base `timing__setup__ws` and the
/// single modifier `("corner", "nom_tt")`.
pub fn parse_metric_name(name: &str) -> (String, Vec<(&str, &str)>) {
    let mut base = Vec::new();
    let mut modifiers = Vec::new();
    for part in name.split(MODIFIER_SEPARATOR) {
        match part.split_once(':') {
            Some(modifier) => modifiers.push(modifier),
            None => base.push(part),
        }
    }
    (base.join(MODIFIER_SEPARATOR), modifiers)
}

/// Formats the name of a metric for one corner.
pub fn corner_metric(base: &str, corner: &str) -> String {
    format!("{base}{MODIFIER_SEPARATOR}corner:{corner}")
}

/// How per-corner values of a metric are combined.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Reduction {
    /// The sum of all values.
    Sum,
    /// The smallest value.
    Min,
    /// The largest value.
    Max,
}

impl Reduction {
    fn apply(&self, acc: MetricValue, value: MetricValue) -> Option<MetricValue> {
        match self {
            Self::Sum => acc.checked_add(value),
            Self::Min => Some(acc.min(value)),
            Self::Max => Some(acc.max(value)),
        }
    }
}

/// How one metric is aggregated across corners.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AggregationRule {
    /// The base metric name.
    pub metric: &'static str,
    /// The value the reduction starts from.
    pub identity: MetricValue,
    /// The reduction.
    pub reduction: Reduction,
}

const fn rule(metric: &'static str, identity: MetricValue, reduction: Reduction) -> AggregationRule {
    AggregationRule {
        metric,
        identity,
        reduction,
    }
}

/// Cross-corner aggregation of the timing metrics reported by STA.
///
/// Unannotated net counts are reduced with `max`, unlike the other counts.
pub static TIMING_AGGREGATION: [AggregationRule; 17] = [
    rule("timing__hold_vio__count", MetricValue::ZERO, Reduction::Sum),
    rule("timing__hold_r2r_vio__count", MetricValue::ZERO, Reduction::Sum),
    rule("timing__setup_vio__count", MetricValue::ZERO, Reduction::Sum),
    rule("timing__setup_r2r_vio__count", MetricValue::ZERO, Reduction::Sum),
    rule("design__max_slew_violation__count", MetricValue::ZERO, Reduction::Sum),
    rule("design__max_fanout_violation__count", MetricValue::ZERO, Reduction::Sum),
    rule("design__max_cap_violation__count", MetricValue::ZERO, Reduction::Sum),
    rule("clock__skew__worst_hold", MetricValue::NegInf, Reduction::Max),
    rule("clock__skew__worst_setup", MetricValue::NegInf, Reduction::Max),
    rule("timing__hold__ws", MetricValue::PosInf, Reduction::Min),
    rule("timing__setup__ws", MetricValue::PosInf, Reduction::Min),
    rule("timing__hold__wns", MetricValue::PosInf, Reduction::Min),
    rule("timing__setup__wns", MetricValue::PosInf, Reduction::Min),
    rule("timing__hold__tns", MetricValue::ZERO, Reduction::Sum),
    rule("timing__setup__tns", MetricValue::ZERO, Reduction::Sum),
    rule("timing__unannotated_nets__count", MetricValue::ZERO, Reduction::Max),
    rule("timing__unannotated_nets_filtered__count", MetricValue::ZERO, Reduction::Max),
];

/// Aggregates per-corner metrics into their bare names.
///
/// Returns a superset of `metrics`. A rule whose metric has no per-corner
/// values leaves the bare name untouched.
pub fn aggregate(metrics: &Metrics, rules: &[AggregationRule]) -> Result<Metrics> {
    let mut per_rule: Vec<Vec<MetricValue>> = vec![Vec::new(); rules.len()];
    for (name, value) in metrics.iter() {
        let (base, modifiers) = parse_metric_name(name);
        if !matches!(modifiers.as_slice(), [("corner", _)]) {
            continue;
        }
        if let Some(i) = rules.iter().position(|rule| rule.metric == base) {
            per_rule[i].push(*value);
        }
    }

    let mut aggregated = metrics.clone();
    for (rule, values) in rules.iter().zip(per_rule) {
        if values.is_empty() {
            continue;
        }
        let mut acc = rule.identity;
        for value in values {
            let Some(next) = rule.reduction.apply(acc, value) else {
                let metric = rule.metric.into();
                return Err(match (acc, value) {
                    (MetricValue::Finite(_), MetricValue::Finite(_)) => {
                        Error::MetricOverflow { metric }
                    }
                    _ => Error::UndefinedMetric { metric },
                });
            };
            acc = next;
        }
        tracing::debug!(metric = rule.metric, value = %acc, "aggregated");
        aggregated.insert(rule.metric, acc);
    }
    Ok(aggregated)
}
