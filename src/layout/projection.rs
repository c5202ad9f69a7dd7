//! # Projection Builder
//!
//! Turns a band of the photograph into a 1-D darkness profile, one value per pixel
//! column, plus the sliding-window averages the boundary strategies work on.

use image::{DynamicImage, GenericImageView};

use super::types::Projection;
use crate::geometry::{Band, Rect};

/// Smallest glyph width assumed for any band
pub const MIN_CHAR_WIDTH_PX: i32 = 6;

/// Rec. 601 luma of an RGBA pixel composited over white
fn luma_over_white(pixel: image::Rgba<u8>) -> f64 {
    let [r, g, b, a] = pixel.0;
    let alpha = f64::from(a) / 255.0;
    let over_white = |c: u8| f64::from(c) * alpha + 255.0 * (1.0 - alpha);
    0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b)
}

/// Column darkness sums over `roi`.
///
/// For every column `x` of the region the result holds `Σ_y (255 - luma)`. The region is
/// clamped to the image first; an empty region yields an empty profile.
pub fn vertical_projection(image: &DynamicImage, roi: Rect) -> Vec<u32> {
    let (width, height) = image.dimensions();
    let roi = roi.clamp_to(width, height);
    if roi.is_empty() {
        return Vec::new();
    }

    // Clamped coordinates are non-negative and within the image
    let (left, top) = (roi.left as u32, roi.top as u32);
    let (right, bottom) = (roi.right as u32, roi.bottom as u32);

    (left..right)
        .map(|x| {
            (top..bottom).fold(0u32, |acc, y| {
                let darkness = (255.0 - luma_over_white(image.get_pixel(x, y))).round();
                acc.saturating_add(darkness.clamp(0.0, 255.0) as u32)
            })
        })
        .collect()
}

/// Symmetric moving average with window `[i - radius, i + radius]` clamped to the signal.
///
/// Runs in O(n) with a sliding sum. A radius of zero is treated as one; the output always
/// has the same length as the input.
pub fn smooth(signal: &[u32], radius: usize) -> Vec<u32> {
    sliding_mean(signal.len(), radius, |i| u64::from(signal[i]))
        .map(|(sum, count)| ((sum + count / 2) / count) as u32)
        .collect()
}

/// Floating point variant of [`smooth`], used for local baselines
pub fn moving_average(signal: &[f64], radius: usize) -> Vec<f64> {
    let n = signal.len();
    let radius = radius.max(1);
    let mut out = Vec::with_capacity(n);
    let mut sum = 0.0;
    let mut hi = 0usize;
    let mut lo = 0usize;

    for i in 0..n {
        let want_hi = (i + radius + 1).min(n);
        while hi < want_hi {
            sum += signal[hi];
            hi += 1;
        }
        let want_lo = i.saturating_sub(radius);
        while lo < want_lo {
            sum -= signal[lo];
            lo += 1;
        }
        out.push(sum / (hi - lo) as f64);
    }

    out
}

/// Integer sliding window yielding `(sum, count)` for each index
fn sliding_mean<F>(n: usize, radius: usize, value: F) -> impl Iterator<Item = (u64, u64)>
where
    F: Fn(usize) -> u64,
{
    let radius = radius.max(1);
    let mut sum = 0u64;
    let mut hi = 0usize;
    let mut lo = 0usize;

    (0..n).map(move |i| {
        let want_hi = (i + radius + 1).min(n);
        while hi < want_hi {
            sum += value(hi);
            hi += 1;
        }
        let want_lo = i.saturating_sub(radius);
        while lo < want_lo {
            sum -= value(lo);
            lo += 1;
        }
        (sum, (hi - lo) as u64)
    })
}

/// Glyphs are assumed roughly as wide as the row is tall
pub fn rough_char_width(roi: &Rect) -> i32 {
    roi.height().max(MIN_CHAR_WIDTH_PX)
}

/// Narrowest plausible cell for a band: `max(height × factor, floor)`
pub fn min_cell_width(band: &Band, factor: f64, floor: i32) -> i32 {
    ((f64::from(band.height()) * factor).round() as i32).max(floor)
}

/// Raw and smoothed profile of a band, with the band clamped to the image
pub fn build_projection(image: &DynamicImage, band: &Band) -> Projection {
    let start_time = std::time::Instant::now();
    let roi = band.rect.clamp_to(image.width(), image.height());
    let raw = vertical_projection(image, roi);
    let char_width = rough_char_width(&roi);
    let radius = usize::try_from(char_width).unwrap_or(1).max(1);
    let smoothed = smooth(&raw, radius);

    tracing::debug!(
        target: "layout",
        "Projection built in {}ms: width={}, char_width={}, radius={}",
        start_time.elapsed().as_millis(),
        raw.len(),
        char_width,
        radius
    );

    Projection {
        offset: roi.left,
        raw,
        smoothed,
        char_width,
        radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_projection_counts_dark_columns() {
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([255, 255, 255, 255]));
        for y in 0..3 {
            img.put_pixel(1, y, Rgba([0, 0, 0, 255]));
        }
        let projection = vertical_projection(&DynamicImage::ImageRgba8(img), Rect::new(0, 0, 4, 3));
        assert_eq!(projection, vec![0, 765, 0, 0]);
    }

    #[test]
    fn test_transparent_pixels_count_as_white() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let projection = vertical_projection(&DynamicImage::ImageRgba8(img), Rect::new(0, 0, 2, 2));
        assert_eq!(projection, vec![0, 0]);
    }

    #[test]
    fn test_projection_clamps_roi() {
        let img = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        let projection =
            vertical_projection(&DynamicImage::ImageRgba8(img), Rect::new(3, -2, 20, 2));
        assert_eq!(projection, vec![510, 510]);
        let empty = vertical_projection(
            &DynamicImage::ImageRgba8(RgbaImage::new(5, 5)),
            Rect::new(8, 0, 9, 5),
        );
        assert!(empty.is_empty());
    }

    #[test]
    fn test_smooth_preserves_length_and_edges() {
        let signal = vec![0, 0, 90, 0, 0];
        let smoothed = smooth(&signal, 1);
        assert_eq!(smoothed.len(), signal.len());
        assert_eq!(smoothed, vec![0, 30, 30, 30, 0]);
        assert!(smooth(&[], 3).is_empty());
        assert_eq!(smooth(&[7], 0), vec![7]);
    }

    #[test]
    fn test_smooth_radius_larger_than_signal() {
        assert_eq!(smooth(&[10, 20, 30], 50), vec![20, 20, 20]);
    }

    #[test]
    fn test_moving_average_matches_naive_window() {
        let signal: Vec<f64> = (0..20).map(|i| f64::from((i * 7) % 11)).collect();
        let fast = moving_average(&signal, 3);
        for (i, value) in fast.iter().enumerate() {
            let lo = i.saturating_sub(3);
            let hi = (i + 3).min(signal.len() - 1);
            let naive: f64 = signal[lo..=hi].iter().sum::<f64>() / (hi - lo + 1) as f64;
            assert!((value - naive).abs() < 1e-9);
        }
    }

    #[test]
    fn test_char_and_cell_widths() {
        assert_eq!(rough_char_width(&Rect::new(0, 0, 100, 4)), 6);
        assert_eq!(rough_char_width(&Rect::new(0, 0, 100, 40)), 40);
        let band = Band::new(crate::geometry::BandKind::Header, Rect::new(0, 0, 310, 40));
        assert_eq!(min_cell_width(&band, 0.9, 12), 36);
        let thin = Band::new(crate::geometry::BandKind::Header, Rect::new(0, 0, 310, 5));
        assert_eq!(min_cell_width(&thin, 0.9, 12), 12);
    }

    #[test]
    fn test_build_projection_offset() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 20, Rgba([255, 255, 255, 255])));
        let band = Band::new(crate::geometry::BandKind::Header, Rect::new(-5, 2, 60, 12));
        let projection = build_projection(&img, &band);
        assert_eq!(projection.offset, 0);
        assert_eq!(projection.raw.len(), 50);
        assert_eq!(projection.smoothed.len(), 50);
        assert_eq!(projection.char_width, 10);
    }
}
