//! Conversion of legacy routing track definitions into `make_tracks` directives.
//!
//! Legacy track files list one record per line:
//!
//! ```text
//! met1 X 0.17 0.34
//! met1 Y 0.17 0.34
//! ```
//!
//! Every layer must define exactly one `X` and one `Y` record. Numeric tokens
//! are carried over verbatim so the generated directives match the input text
//! exactly.

#![warn(missing_docs)]


use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

/// An error converting a legacy track file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// A non-blank line did not contain exactly four fields.
    #[error("line {line}: expected `<layer> <X|Y> <offset> <pitch>`, found `{content}`")]
    MalformedRecord {
        /// The 1-indexed line number.
        line: usize,
        /// The offending line.
        content: String,
    },
    /// The axis field was neither `X` nor `Y`.
    #[error("line {line}: invalid axis `{axis}`, expected `X` or `Y`")]
    InvalidAxis {
        /// The 1-indexed line number.
        line: usize,
        /// The axis token that was found.
        axis: String,
    },
    /// A layer defined the same axis twice.
    #[error("layer `{layer}` defines its {axis} tracks more than once")]
    DuplicateAxis {
        /// The layer name.
        layer: String,
        /// The repeated axis.
        axis: Axis,
    },
    /// A layer is missing one of its axes.
    #[error("layer `{layer}` does not define its {axis} tracks")]
    MissingAxis {
        /// The layer name.
        layer: String,
        /// The missing axis.
        axis: Axis,
    },
}

/// The result type returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A routing track axis.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    /// Tracks distributed along the x axis.
    X,
    /// Tracks distributed along the y axis.
    Y,
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

impl FromStr for Axis {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            _ => Err(()),
        }
    }
}

/// The offset and pitch of one axis, kept as the original text.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Grid<'a> {
    /// The track offset.
    pub offset: &'a str,
    /// The track pitch.
    pub pitch: &'a str,
}

/// The full track definition of a single layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LayerTracks<'a> {
    /// The layer name.
    pub layer: &'a str,
    /// Tracks along the x axis.
    pub x: Grid<'a>,
    /// Tracks along the y axis.
    pub y: Grid<'a>,
}

impl Display for LayerTracks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "make_tracks {} -x_offset {} -x_pitch {} -y_offset {} -y_pitch {}",
            self.layer, self.x.offset, self.x.pitch, self.y.offset, self.y.pitch
        )
    }
}

#[derive(Default)]
struct PartialLayer<'a> {
    x: Option<Grid<'a>>,
    y: Option<Grid<'a>>,
}

/// Parses a legacy track file into per-layer definitions in first-seen layer order.
pub fn parse(legacy: &str) -> Result<Vec<LayerTracks<'_>>> {
    let mut layers: IndexMap<&str, PartialLayer> = IndexMap::new();

    for (i, line) in legacy.lines().enumerate() {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        if fields.is_empty() {
            continue;
        }
        let &[layer, axis, offset, pitch] = fields.as_slice() else {
            return Err(Error::MalformedRecord {
                line: i + 1,
                content: line.to_string(),
            });
        };
        let axis = axis.parse::<Axis>().map_err(|_| Error::InvalidAxis {
            line: i + 1,
            axis: axis.to_string(),
        })?;

        let entry = layers.entry(layer).or_default();
        let slot = match axis {
            Axis::X => &mut entry.x,
            Axis::Y => &mut entry.y,
        };
        if slot.is_some() {
            return Err(Error::DuplicateAxis {
                layer: layer.to_string(),
                axis,
            });
        }
        *slot = Some(Grid { offset, pitch });
    }

    layers
        .into_iter()
        .map(|(layer, partial)| {
            let missing = |axis| Error::MissingAxis {
                layer: layer.to_string(),
                axis,
            };
            Ok(LayerTracks {
                layer,
                x: partial.x.ok_or_else(|| missing(Axis::X))?,
                y: partial.y.ok_or_else(|| missing(Axis::Y))?,
            })
        })
        .collect()
}

/// Converts a legacy track file into newline-terminated `make_tracks` directives.
pub fn transpile(legacy: &str) -> Result<String> {
    let mut out = String::new();
    for layer in parse(legacy)? {
        out.push_str(&layer.to_string());
        out.push('\n');
    }
    Ok(out)
}
