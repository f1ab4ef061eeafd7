//! Design views: the typed artifacts that flow between steps.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A kind of design artifact.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum DesignView {
    /// The gate-level netlist.
    #[serde(rename = "nl")]
    Netlist,
    /// The gate-level netlist with power connections.
    #[serde(rename = "pnl")]
    PoweredNetlist,
    /// The powered netlist without cells that confuse SDF annotation.
    #[serde(rename = "pnl-sdf-friendly")]
    PoweredNetlistSdfFriendly,
    /// The powered netlist without physical-only cells.
    #[serde(rename = "pnl-npc")]
    PoweredNetlistNoPhysicalCells,
    /// The OpenROAD database.
    #[serde(rename = "odb")]
    Odb,
    /// Design Exchange Format layout.
    #[serde(rename = "def")]
    Def,
    /// Library Exchange Format abstract.
    #[serde(rename = "lef")]
    Lef,
    /// A LEF abstract written by OpenROAD.
    #[serde(rename = "openroad-lef")]
    OpenroadLef,
    /// Timing constraints.
    #[serde(rename = "sdc")]
    Sdc,
    /// Timing libraries, one per corner.
    #[serde(rename = "lib")]
    Lib,
    /// Extracted parasitics, one per corner.
    #[serde(rename = "spef")]
    Spef,
    /// Standard delay files, one per corner.
    #[serde(rename = "sdf")]
    Sdf,
    /// GDSII stream layout.
    #[serde(rename = "gds")]
    Gds,
}

impl DesignView {
    /// Every view, in a fixed order.
    pub const ALL: [DesignView; 13] = [
        Self::Netlist,
        Self::PoweredNetlist,
        Self::PoweredNetlistSdfFriendly,
        Self::PoweredNetlistNoPhysicalCells,
        Self::Odb,
        Self::Def,
        Self::Lef,
        Self::OpenroadLef,
        Self::Sdc,
        Self::Lib,
        Self::Spef,
        Self::Sdf,
        Self::Gds,
    ];

    /// The short identifier used in state files.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Netlist => "nl",
            Self::PoweredNetlist => "pnl",
            Self::PoweredNetlistSdfFriendly => "pnl-sdf-friendly",
            Self::PoweredNetlistNoPhysicalCells => "pnl-npc",
            Self::Odb => "odb",
            Self::Def => "def",
            Self::Lef => "lef",
            Self::OpenroadLef => "openroad-lef",
            Self::Sdc => "sdc",
            Self::Lib => "lib",
            Self::Spef => "spef",
            Self::Sdf => "sdf",
            Self::Gds => "gds",
        }
    }

    /// The name used in `CURRENT_*` and `SAVE_*` environment variables.
    pub const fn env_name(&self) -> &'static str {
        match self {
            Self::Netlist => "NETLIST",
            Self::PoweredNetlist => "POWERED_NETLIST",
            Self::PoweredNetlistSdfFriendly => "POWERED_NETLIST_SDF_FRIENDLY",
            Self::PoweredNetlistNoPhysicalCells => "POWERED_NETLIST_NO_PHYSICAL_CELLS",
            Self::Odb => "ODB",
            Self::Def => "DEF",
            Self::Lef => "LEF",
            Self::OpenroadLef => "OPENROAD_LEF",
            Self::Sdc => "SDC",
            Self::Lib => "LIB",
            Self::Spef => "SPEF",
            Self::Sdf => "SDF",
            Self::Gds => "GDS",
        }
    }

    /// The file extension of the view's artifacts.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Netlist => "nl.v",
            Self::PoweredNetlist => "pnl.v",
            Self::PoweredNetlistSdfFriendly => "pnl-sdf.v",
            Self::PoweredNetlistNoPhysicalCells => "pnl-npc.v",
            Self::Odb => "odb",
            Self::Def => "def",
            Self::Lef => "lef",
            Self::OpenroadLef => "openroad.lef",
            Self::Sdc => "sdc",
            Self::Lib => "lib",
            Self::Spef => "spef",
            Self::Sdf => "sdf",
            Self::Gds => "gds",
        }
    }

    /// Returns `true` if the view holds one artifact per corner.
    pub const fn is_per_corner(&self) -> bool {
        matches!(self, Self::Lib | Self::Spef | Self::Sdf)
    }
}

impl Display for DesignView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// The error returned when parsing an unknown view id.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("unknown design view `{0}`")]
pub struct UnknownView(pub String);

impl FromStr for DesignView {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|view| view.id() == s)
            .ok_or_else(|| UnknownView(s.to_string()))
    }
}

/// The artifacts of one view: a single file, or one file per corner.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewValue {
    /// A single file.
    Path(PathBuf),
    /// One file per corner, keyed by corner name or pattern.
    PerCorner(IndexMap<ArcStr, PathBuf>),
}

impl ViewValue {
    /// Returns the path of a single-file view.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::PerCorner(_) => None,
        }
    }

    /// Returns the per-corner mapping of a per-corner view.
    pub fn as_per_corner(&self) -> Option<&IndexMap<ArcStr, PathBuf>> {
        match self {
            Self::Path(_) => None,
            Self::PerCorner(map) => Some(map),
        }
    }
}

impl From<PathBuf> for ViewValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<IndexMap<ArcStr, PathBuf>> for ViewValue {
    fn from(value: IndexMap<ArcStr, PathBuf>) -> Self {
        Self::PerCorner(value)
    }
}
