//! # Cell Slicer
//!
//! Cuts a band bitmap into per-column cells along a boundary list and pads undersized
//! cells onto a white canvas before they reach the recognizer.

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use super::types::{BoundaryList, Cell, LayoutError};
use crate::geometry::Band;

/// Cells narrower than this are discarded
pub const MIN_SLICE_WIDTH_PX: i32 = 8;
/// Smallest image handed to a recognizer
pub const MIN_CANVAS_PX: u32 = 32;

/// Crop a band out of the photograph, clamped to the image.
///
/// Fails with [`LayoutError::EmptyRegion`] when nothing of the band lies inside the image.
pub fn crop_band(image: &DynamicImage, band: &Band) -> Result<DynamicImage, LayoutError> {
    let rect = band.rect.clamp_to(image.width(), image.height());
    if rect.is_empty() {
        return Err(LayoutError::EmptyRegion {
            width: rect.width(),
            height: rect.height(),
        });
    }
    // Clamped coordinates are non-negative
    Ok(image.crop_imm(
        rect.left as u32,
        rect.top as u32,
        rect.width() as u32,
        rect.height() as u32,
    ))
}

/// Slice a band image into one cell per adjacent boundary pair.
///
/// Each pair is clipped to `[0, width]`; pairs narrower than [`MIN_SLICE_WIDTH_PX`]
/// produce no cell. A cell keeps the index of its pair, so two bands sliced with the same
/// list agree on column numbers even when a cell is skipped.
pub fn slice_by_boundaries(band_image: &DynamicImage, boundaries: &BoundaryList) -> Vec<Cell> {
    let (width, height) = band_image.dimensions();
    let max_x = i32::try_from(width).unwrap_or(i32::MAX);

    boundaries
        .pairs()
        .enumerate()
        .filter_map(|(column, (start, end))| {
            let x_start = start.clamp(0, max_x);
            let x_end = end.clamp(0, max_x);
            if x_end - x_start < MIN_SLICE_WIDTH_PX || height == 0 {
                tracing::trace!(
                    target: "layout",
                    column,
                    x_start,
                    x_end,
                    "Skipping undersized cell"
                );
                return None;
            }
            Some(Cell {
                column,
                x_start,
                x_end,
                image: band_image.crop_imm(
                    x_start as u32,
                    0,
                    (x_end - x_start) as u32,
                    height,
                ),
            })
        })
        .collect()
}

/// Centre an undersized image on a white canvas of at least `min_width × min_height`.
///
/// Images that already meet both minimums are returned unchanged.
pub fn ensure_min_canvas(image: &DynamicImage, min_width: u32, min_height: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width >= min_width && height >= min_height {
        return image.clone();
    }

    let canvas_width = width.max(min_width);
    let canvas_height = height.max(min_height);
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([255, 255, 255, 255]));
    let x = i64::from((canvas_width - width) / 2);
    let y = i64::from((canvas_height - height) / 2);
    image::imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);
    DynamicImage::ImageRgba8(canvas)
}
