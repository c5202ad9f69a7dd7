//! # Boundary Detector
//!
//! Turns a column darkness profile into candidate column boundaries. Four strategies
//! compete on the same profile:
//!
//! - **Valley**: local minima under a global depth threshold, optionally filtered by
//!   prominence, with non-maximum suppression in signal order.
//! - **RobustPeak**: extrema of the normalized signal measured against a local moving
//!   average, ranked by prominence.
//! - **AdaptiveHighPass**: extrema of a high-pass residual with a threshold derived from
//!   the candidate population itself, plus optional bisection towards an expected
//!   column count.
//! - **GapRun**: centres of near-empty column runs.
//!
//! Every strategy ends with [`enforce_min_cell_width`], so the returned
//! [`BoundaryList`] never contains a cell narrower than the configured minimum (unless
//! the band itself is narrower).

use serde::{Deserialize, Serialize};

use super::projection::moving_average;
use super::types::{
    BoundaryCandidate, BoundaryList, Polarity, Projection, Strategy, StrategyChoice,
    ValleyBaseline,
};

/// Tunables for the valley strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValleyOptions {
    pub baseline: ValleyBaseline,
    /// Fraction of the baseline a minimum must stay under
    pub depth_factor: f64,
    pub require_prominence: bool,
    /// Minimum prominence as a fraction of the signal range
    pub prominence_ratio: f64,
}

impl Default for ValleyOptions {
    fn default() -> Self {
        Self {
            baseline: ValleyBaseline::Average,
            depth_factor: 0.6,
            require_prominence: true,
            prominence_ratio: 0.10,
        }
    }
}

/// Tunables for the robust normalized strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustOptions {
    pub polarity: Polarity,
    /// Minimum deviation from the local average on the `[0, 1]` scale
    pub min_prominence: f64,
    /// Lower bound of the local window radius
    pub min_radius: i32,
    /// Reject extrema narrower than `factor × char_width`
    pub width_filter: Option<f64>,
}

impl Default for RobustOptions {
    fn default() -> Self {
        Self {
            polarity: Polarity::Peaks,
            min_prominence: 0.10,
            min_radius: 8,
            width_filter: None,
        }
    }
}

impl RobustOptions {
    /// Whitespace-gap detection with single-stroke rejection
    pub fn valleys() -> Self {
        Self {
            polarity: Polarity::Valleys,
            width_filter: Some(0.6),
            ..Self::default()
        }
    }
}

/// Tunables for the adaptive high-pass strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveOptions {
    /// Floor of the self-calibrated threshold
    pub min_threshold: f64,
    /// Weight of the median absolute deviation in the threshold
    pub mad_factor: f64,
    /// Background radius as a multiple of the char width
    pub background_char_factor: i32,
    /// Background radius as a fraction of the band width
    pub background_width_divisor: i32,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            min_threshold: 0.05,
            mad_factor: 0.5,
            background_char_factor: 4,
            background_width_divisor: 32,
        }
    }
}

/// Tunables for the gap-run strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRunOptions {
    /// Columns within `min + tolerance × range` count as empty
    pub tolerance: f64,
}

impl Default for GapRunOptions {
    fn default() -> Self {
        Self { tolerance: 0.02 }
    }
}

/// Options shared by every strategy for one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryOptions {
    pub valley: ValleyOptions,
    pub robust: RobustOptions,
    pub adaptive: AdaptiveOptions,
    pub gap_run: GapRunOptions,
    /// Narrowest cell allowed in the final list
    pub min_cell_width: i32,
    /// Number of columns the header tokens suggest, if known
    pub expected_columns: Option<usize>,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            valley: ValleyOptions::default(),
            robust: RobustOptions::default(),
            adaptive: AdaptiveOptions::default(),
            gap_run: GapRunOptions::default(),
            min_cell_width: 12,
            expected_columns: None,
        }
    }
}

/// Suppression distance: `max(2 × char_width, band_width / 16)`
pub fn min_gap(char_width: i32, band_width: i32) -> f64 {
    (2.0 * f64::from(char_width)).max(f64::from(band_width) / 16.0)
}

/// Rescale to `[0, 1]`, `None` for a flat or too short signal
fn normalize(signal: &[u32]) -> Option<Vec<f64>> {
    if signal.len() < 3 {
        return None;
    }
    let min = f64::from(*signal.iter().min()?);
    let max = f64::from(*signal.iter().max()?);
    let range = max - min;
    if range <= 0.0 {
        return None;
    }
    Some(signal.iter().map(|&v| (f64::from(v) - min) / range).collect())
}

/// Signed distance past the baseline in the direction of the polarity
fn deviation(value: f64, baseline: f64, polarity: Polarity) -> f64 {
    match polarity {
        Polarity::Valleys => baseline - value,
        Polarity::Peaks => value - baseline,
    }
}

/// Interior local extrema; a flat run collapses to its centre
fn plateau_extrema(values: &[f64], polarity: Polarity) -> Vec<usize> {
    let n = values.len();
    let mut out = Vec::new();
    let mut start = 0;

    while start < n {
        let value = values[start];
        let mut end = start;
        while end + 1 < n && values[end + 1] == value {
            end += 1;
        }
        if start > 0 && end + 1 < n {
            let (left, right) = (values[start - 1], values[end + 1]);
            let is_extremum = match polarity {
                Polarity::Valleys => left > value && right > value,
                Polarity::Peaks => left < value && right < value,
            };
            if is_extremum {
                out.push((start + end) / 2);
            }
        }
        start = end + 1;
    }

    out
}

/// How many samples around `index` stay on the extremum's side of the baseline
fn extent_width(values: &[f64], baseline: &[f64], index: usize, polarity: Polarity) -> usize {
    let beyond = |j: usize| deviation(values[j], baseline[j], polarity) > 0.0;
    let mut lo = index;
    while lo > 0 && beyond(lo - 1) {
        lo -= 1;
    }
    let mut hi = index;
    while hi + 1 < values.len() && beyond(hi + 1) {
        hi += 1;
    }
    hi - lo + 1
}

/// Keep the highest ranked candidates at least `gap` apart, returned in x order
fn suppress_by_rank(mut candidates: Vec<(usize, f64)>, gap: f64) -> Vec<i32> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut kept: Vec<usize> = Vec::new();
    for (index, _) in candidates {
        if kept.iter().all(|&k| index.abs_diff(k) as f64 >= gap) {
            kept.push(index);
        }
    }
    kept.sort_unstable();
    kept.into_iter().filter_map(|i| i32::try_from(i).ok()).collect()
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// `max(floor, median + weight × MAD)` of the given values
pub fn adaptive_threshold(values: &[f64], floor: f64, weight: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let med = median(&sorted);
    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - med).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    floor.max(med + weight * median(&deviations))
}

/// Valley-threshold strategy, interior positions only
pub fn valley_boundaries(
    signal: &[u32],
    band_width: i32,
    char_width: i32,
    options: &ValleyOptions,
) -> Vec<i32> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }
    let values: Vec<f64> = signal.iter().map(|&v| f64::from(v)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 {
        return Vec::new();
    }

    let threshold = match options.baseline {
        ValleyBaseline::Average => options.depth_factor * values.iter().sum::<f64>() / n as f64,
        ValleyBaseline::MinMax => min + options.depth_factor * range,
    };
    let gap = min_gap(char_width, band_width);
    let reach = (gap.ceil() as usize).max(1);

    let mut kept: Vec<usize> = Vec::new();
    for index in plateau_extrema(&values, Polarity::Valleys) {
        let value = values[index];
        if value > threshold {
            continue;
        }
        if options.require_prominence {
            let left = values[index.saturating_sub(reach)..index]
                .iter()
                .copied()
                .fold(value, f64::max);
            let right = values[index + 1..=(index + reach).min(n - 1)]
                .iter()
                .copied()
                .fold(value, f64::max);
            if left.min(right) - value < options.prominence_ratio * range {
                continue;
            }
        }
        match kept.last() {
            Some(&last) if ((index - last) as f64) < gap => {}
            _ => kept.push(index),
        }
    }

    kept.into_iter().filter_map(|i| i32::try_from(i).ok()).collect()
}

/// Robust normalized peak/valley strategy, interior positions only
pub fn robust_boundaries(
    signal: &[u32],
    band_width: i32,
    char_width: i32,
    options: &RobustOptions,
) -> Vec<i32> {
    let Some(normalized) = normalize(signal) else {
        return Vec::new();
    };
    let radius = usize::try_from(char_width.max(options.min_radius)).unwrap_or(8);
    let local = moving_average(&normalized, radius);

    let candidates: Vec<(usize, f64)> = plateau_extrema(&normalized, options.polarity)
        .into_iter()
        .filter_map(|index| {
            let prominence = deviation(normalized[index], local[index], options.polarity);
            if prominence < options.min_prominence {
                return None;
            }
            if let Some(factor) = options.width_filter {
                let width = extent_width(&normalized, &local, index, options.polarity);
                if (width as f64) < factor * f64::from(char_width) {
                    return None;
                }
            }
            Some((index, prominence))
        })
        .collect();

    suppress_by_rank(candidates, min_gap(char_width, band_width))
}

/// Adaptive high-pass strategy before bisection, interior positions only
pub fn adaptive_boundaries(
    signal: &[u32],
    band_width: i32,
    char_width: i32,
    options: &AdaptiveOptions,
) -> Vec<i32> {
    let Some(normalized) = normalize(signal) else {
        return Vec::new();
    };

    let background_radius = (options.background_char_factor * char_width)
        .max(band_width / options.background_width_divisor.max(1))
        .max(1);
    let background = moving_average(&normalized, usize::try_from(background_radius).unwrap_or(1));
    let residual: Vec<f64> = normalized
        .iter()
        .zip(&background)
        .map(|(value, bg)| value - bg)
        .collect();
    let local = moving_average(&residual, usize::try_from(char_width.max(8)).unwrap_or(8));

    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for polarity in [Polarity::Valleys, Polarity::Peaks] {
        for index in plateau_extrema(&residual, polarity) {
            let prominence = deviation(residual[index], local[index], polarity);
            if prominence > 0.0 {
                candidates.push((index, prominence));
            }
        }
    }
    if candidates.is_empty() {
        return Vec::new();
    }

    let prominences: Vec<f64> = candidates.iter().map(|(_, p)| *p).collect();
    let threshold = adaptive_threshold(&prominences, options.min_threshold, options.mad_factor);
    candidates.retain(|(_, p)| *p >= threshold);

    tracing::trace!(
        target: "layout",
        threshold,
        kept = candidates.len(),
        total = prominences.len(),
        "Adaptive threshold applied"
    );

    suppress_by_rank(candidates, min_gap(char_width, band_width))
}

/// Gap-run strategy, interior positions only
pub fn gap_run_boundaries(signal: &[u32], options: &GapRunOptions) -> Vec<i32> {
    let n = signal.len();
    let (Some(&min), Some(&max)) = (signal.iter().min(), signal.iter().max()) else {
        return Vec::new();
    };
    if n < 3 || max == min {
        return Vec::new();
    }
    let limit = f64::from(min) + options.tolerance * f64::from(max - min);

    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (index, &value) in signal.iter().enumerate() {
        let empty = f64::from(value) <= limit;
        match (empty, start) {
            (true, None) => start = Some(index),
            (false, Some(run_start)) => {
                if run_start > 0 {
                    out.push((run_start + index - 1) / 2);
                }
                start = None;
            }
            _ => {}
        }
    }
    // A run still open at the end touches the right edge and is not interior

    out.into_iter().filter_map(|i| i32::try_from(i).ok()).collect()
}

/// Merge boundaries closer than `min_width`, walking left to right.
///
/// The first and last boundary are always kept. When the final gap is too small the
/// previous interior boundary is dropped instead. The result is idempotent.
///
/// # Examples
///
/// ```rust
/// use shift_table_ocr::layout::boundaries::enforce_min_cell_width;
///
/// let xs = enforce_min_cell_width(&[0, 50, 100, 150, 200, 250, 260, 310], 36);
/// assert_eq!(xs, vec![0, 50, 100, 150, 200, 250, 310]);
/// ```
pub fn enforce_min_cell_width(xs: &[i32], min_width: i32) -> Vec<i32> {
    let mut sorted = xs.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() <= 2 {
        return sorted;
    }

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    let mut out = vec![first];
    for &x in &sorted[1..sorted.len() - 1] {
        if out.last().is_some_and(|&prev| x - prev >= min_width) {
            out.push(x);
        }
    }
    if out.len() > 1 && out.last().is_some_and(|&prev| last - prev < min_width) {
        out.pop();
    }
    out.push(last);
    out
}

/// Split the widest cell at its midpoint until `expected` cells exist.
///
/// Stops early once the widest cell is narrower than `2 × min_width`, so no produced
/// cell is narrower than the minimum.
pub fn bisect_to_expected(mut xs: Vec<i32>, expected: usize, min_width: i32) -> Vec<i32> {
    let floor = 2 * min_width.max(1);
    while xs.len() >= 2 && xs.len() - 1 < expected {
        let Some((index, width)) = xs
            .windows(2)
            .map(|w| w[1] - w[0])
            .enumerate()
            .fold(None, |best: Option<(usize, i32)>, (i, w)| match best {
                Some((_, best_w)) if best_w >= w => best,
                _ => Some((i, w)),
            })
        else {
            break;
        };
        if width < floor {
            break;
        }
        xs.insert(index + 1, xs[index] + width / 2);
    }
    xs
}

/// Run one strategy and reconcile its output into a valid boundary list
pub fn detect_boundaries(
    signal: &[u32],
    band_width: i32,
    char_width: i32,
    strategy: Strategy,
    options: &BoundaryOptions,
) -> BoundaryList {
    let positions = match strategy {
        Strategy::Valley => valley_boundaries(signal, band_width, char_width, &options.valley),
        Strategy::RobustPeak => robust_boundaries(signal, band_width, char_width, &options.robust),
        Strategy::AdaptiveHighPass => {
            adaptive_boundaries(signal, band_width, char_width, &options.adaptive)
        }
        Strategy::GapRun => gap_run_boundaries(signal, &options.gap_run),
    };
    let candidates = positions.len();

    let edged = BoundaryList::with_edges(positions, band_width).into_vec();
    let mut xs = enforce_min_cell_width(&edged, options.min_cell_width);
    if strategy == Strategy::AdaptiveHighPass {
        if let Some(expected) = options.expected_columns {
            xs = bisect_to_expected(xs, expected, options.min_cell_width);
            xs = enforce_min_cell_width(&xs, options.min_cell_width);
        }
    }
    let list = BoundaryList::with_edges(xs, band_width);

    tracing::debug!(
        target: "layout",
        strategy = %strategy,
        candidates,
        cells = list.cell_count(),
        "Boundary detection finished"
    );
    crate::observability::record_boundary_metrics(strategy, list.cell_count());

    list
}

/// Run every strategy on the same projection; valley uses the smoothed signal
pub fn detect_all(projection: &Projection, options: &BoundaryOptions) -> Vec<BoundaryCandidate> {
    Strategy::ALL
        .into_iter()
        .map(|strategy| {
            let signal = match strategy {
                Strategy::Valley => &projection.smoothed,
                _ => &projection.raw,
            };
            BoundaryCandidate {
                strategy,
                boundaries: detect_boundaries(
                    signal,
                    projection.width(),
                    projection.char_width,
                    strategy,
                    options,
                ),
            }
        })
        .collect()
}

/// Pick one candidate.
///
/// `Auto` prefers the cell count closest to `expected_columns`; without a hint it prefers
/// the most cells. Ties go to the earlier strategy in [`Strategy::ALL`] order.
pub fn select_candidate(
    candidates: &[BoundaryCandidate],
    choice: StrategyChoice,
    expected_columns: Option<usize>,
) -> Option<&BoundaryCandidate> {
    match (choice, expected_columns) {
        (StrategyChoice::Fixed(strategy), _) => {
            candidates.iter().find(|c| c.strategy == strategy)
        }
        (StrategyChoice::Auto, Some(expected)) => candidates
            .iter()
            .min_by_key(|c| c.cell_count().abs_diff(expected)),
        (StrategyChoice::Auto, None) => candidates
            .iter()
            .rev()
            .max_by_key(|c| c.cell_count()),
    }
}
