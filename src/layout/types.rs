//! # Shared Types for Layout Recovery
//!
//! This module contains the shared types, structs, and enums used across
//! the layout sub-modules.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Word};

/// Errors that can occur while recovering the table layout.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A band clamped to the image has no pixels left
    EmptyRegion { width: i32, height: i32 },
    /// Boundary positions could not form a usable list
    InvalidBoundaries { message: String },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::EmptyRegion { width, height } => {
                write!(f, "Region is empty after clamping: {}x{}", width, height)
            }
            LayoutError::InvalidBoundaries { message } => {
                write!(f, "Invalid boundary list: {}", message)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Column boundary detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Local minima under a global depth threshold
    Valley,
    /// Extrema measured against a local baseline of the normalized signal
    RobustPeak,
    /// Extrema of a high-pass residual with a self-calibrating threshold
    AdaptiveHighPass,
    /// Centres of near-empty column runs
    GapRun,
}

impl Strategy {
    /// Every strategy, in the order used for tie-breaking
    pub const ALL: [Strategy; 4] = [
        Strategy::Valley,
        Strategy::RobustPeak,
        Strategy::AdaptiveHighPass,
        Strategy::GapRun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Valley => "valley",
            Strategy::RobustPeak => "robust-peak",
            Strategy::AdaptiveHighPass => "adaptive-high-pass",
            Strategy::GapRun => "gap-run",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown boundary strategy: {}", s))
    }
}

/// How the pipeline picks one candidate among the strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyChoice {
    /// Always use the given strategy
    Fixed(Strategy),
    /// Pick the candidate whose cell count is most plausible
    #[default]
    Auto,
}

impl std::str::FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(StrategyChoice::Auto)
        } else {
            s.parse().map(StrategyChoice::Fixed)
        }
    }
}

/// Baseline the valley depth threshold is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValleyBaseline {
    /// `factor × average`
    #[default]
    Average,
    /// `min + factor × (max - min)`
    MinMax,
}

/// Which extremum marks a column boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    /// Low-ink gaps between columns
    Valleys,
    /// Dark ruling lines between columns
    #[default]
    Peaks,
}

/// Which words make up the body band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodySelection {
    /// Every word strictly below the header
    #[default]
    AllBelowHeader,
    /// Only the n-th clustered row below the header (0 = first duty row)
    Row(usize),
}

/// The row chosen as the date header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRow {
    /// Words of the row in ascending x order
    pub words: Vec<Word>,
    /// `2 × date tokens + bare day tokens`
    pub score: usize,
    /// Number of `M/D` tokens in the row
    pub date_tokens: usize,
    /// Number of bare day-number tokens in the row
    pub day_tokens: usize,
    /// Union of the row's word boxes before margins
    pub bounds: Rect,
    /// Median word height over all words on the page
    pub median_height: f64,
}

impl HeaderRow {
    /// Expected number of columns implied by the header tokens, if any were found
    pub fn expected_columns(&self) -> Option<usize> {
        let count = self.date_tokens + self.day_tokens;
        (count > 0).then_some(count)
    }
}

/// Ink-density profile of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Absolute x of index 0
    pub offset: i32,
    /// Column sums of `255 - luma`
    pub raw: Vec<u32>,
    /// Moving average of `raw`
    pub smoothed: Vec<u32>,
    /// Estimated glyph width in pixels
    pub char_width: i32,
    /// Radius used for `smoothed`
    pub radius: usize,
}

impl Projection {
    pub fn width(&self) -> i32 {
        i32::try_from(self.raw.len()).unwrap_or(i32::MAX)
    }
}

/// Strictly increasing column boundaries relative to a band, from `0` to the band width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryList(Vec<i32>);

impl BoundaryList {
    /// Build a list from interior candidate positions.
    ///
    /// Positions outside `(0, band_width)` are discarded, the list is sorted and
    /// deduplicated, and `0` and `band_width` are always present.
    pub fn with_edges(positions: impl IntoIterator<Item = i32>, band_width: i32) -> Self {
        let band_width = band_width.max(0);
        let mut xs: Vec<i32> = positions
            .into_iter()
            .filter(|&x| x > 0 && x < band_width)
            .collect();
        xs.push(0);
        xs.push(band_width);
        xs.sort_unstable();
        xs.dedup();
        Self(xs)
    }

    /// Wrap an already validated list
    pub fn from_validated(xs: Vec<i32>, band_width: i32) -> Result<Self, LayoutError> {
        let list = Self(xs);
        if list.is_valid(band_width) {
            Ok(list)
        } else {
            Err(LayoutError::InvalidBoundaries {
                message: format!("{:?} does not span [0, {}]", list.0, band_width),
            })
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.0
    }

    /// Number of cells described by the list
    pub fn cell_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Adjacent `(start, end)` pairs
    pub fn pairs(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    /// Width of the narrowest cell, `None` for a single boundary
    pub fn min_gap(&self) -> Option<i32> {
        self.pairs().map(|(a, b)| b - a).min()
    }

    /// Convert to absolute image x coordinates
    pub fn to_absolute(&self, offset: i32) -> Vec<i32> {
        self.0.iter().map(|x| x + offset).collect()
    }

    /// Strictly increasing, starting at `0` and ending at `band_width`
    pub fn is_valid(&self, band_width: i32) -> bool {
        self.0.first() == Some(&0)
            && self.0.last() == Some(&band_width)
            && self.0.windows(2).all(|w| w[0] < w[1])
    }
}

/// Boundaries produced by one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryCandidate {
    pub strategy: Strategy,
    pub boundaries: BoundaryList,
}

impl BoundaryCandidate {
    pub fn cell_count(&self) -> usize {
        self.boundaries.cell_count()
    }
}

/// One column of a band, ready for recognition.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Column index within the band
    pub column: usize,
    /// Start x relative to the band
    pub x_start: i32,
    /// End x relative to the band (exclusive)
    pub x_end: i32,
    pub image: DynamicImage,
}

impl Cell {
    pub fn width(&self) -> i32 {
        self.x_end - self.x_start
    }
}
