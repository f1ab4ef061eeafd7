//! The immutable state threaded between steps.

use std::path::Path;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::view::{DesignView, ViewValue};

/// The changes a step makes to a [`PipelineState`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    /// View updates.
    pub views: IndexMap<DesignView, ViewValue>,
    /// Metric updates.
    pub metrics: Metrics,
}

impl Delta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.metrics.is_empty()
    }
}

/// Design views plus metrics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    views: IndexMap<DesignView, ViewValue>,
    metrics: Metrics,
}

impl PipelineState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the artifacts of `view`.
    pub fn get(&self, view: DesignView) -> Option<&ViewValue> {
        self.views.get(&view)
    }

    /// Returns `true` if the state holds `view`.
    pub fn contains(&self, view: DesignView) -> bool {
        self.views.contains_key(&view)
    }

    /// Returns the path of a single-file view.
    pub fn path(&self, view: DesignView) -> Option<&Path> {
        self.get(view).and_then(ViewValue::as_path)
    }

    /// Returns the per-corner artifacts of a per-corner view.
    pub fn per_corner(&self, view: DesignView) -> Option<&IndexMap<ArcStr, std::path::PathBuf>> {
        self.get(view).and_then(ViewValue::as_per_corner)
    }

    /// Iterates over views in insertion order.
    pub fn views(&self) -> impl Iterator<Item = (&DesignView, &ViewValue)> {
        self.views.iter()
    }

    /// The metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Returns a new state with `delta` applied.
    ///
    /// Per-corner views are merged key by key; single-file views are
    /// replaced. An update whose shape does not match its view's shape
    /// fails with [`Error::MalformedState`].
    pub fn merge(&self, delta: &Delta) -> Result<Self> {
        let mut next = self.clone();
        for (&view, update) in delta.views.iter() {
            match (view.is_per_corner(), update) {
                (true, ViewValue::PerCorner(update)) => {
                    let mut merged = match next.views.get(&view) {
                        None => IndexMap::new(),
                        Some(ViewValue::PerCorner(existing)) => existing.clone(),
                        Some(ViewValue::Path(_)) => {
                            return Err(Error::MalformedState {
                                view,
                                reason: "is per-corner but the state holds a single file",
                            });
                        }
                    };
                    for (corner, path) in update {
                        merged.insert(corner.clone(), path.clone());
                    }
                    next.views.insert(view, ViewValue::PerCorner(merged));
                }
                (true, ViewValue::Path(_)) => {
                    return Err(Error::MalformedState {
                        view,
                        reason: "is per-corner but the update is a single file",
                    });
                }
                (false, ViewValue::Path(path)) => {
                    next.views.insert(view, ViewValue::Path(path.clone()));
                }
                (false, ViewValue::PerCorner(_)) => {
                    return Err(Error::MalformedState {
                        view,
                        reason: "is single-file but the update is per-corner",
                    });
                }
            }
        }
        next.metrics.update(&delta.metrics);
        Ok(next)
    }

    /// Writes the state as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Reads a state written by [`PipelineState::save`], checking view shapes.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: PipelineState = serde_json::from_str(&text)?;
        let delta = Delta {
            views: raw.views,
            metrics: raw.metrics,
        };
        PipelineState::new().merge(&delta)
    }
}
