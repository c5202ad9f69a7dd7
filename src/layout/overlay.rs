//! # Boundary Overlay
//!
//! Draws detected column boundaries on a copy of a band so strategies can be compared
//! by eye.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;

use super::types::BoundaryList;

/// Colour of boundary lines
pub const BOUNDARY_COLOR: Rgba<u8> = Rgba([220, 30, 30, 255]);
/// Colour of the band outline
pub const FRAME_COLOR: Rgba<u8> = Rgba([30, 90, 220, 255]);

/// Copy of `band_image` with a two pixel line at every boundary and a frame around it
pub fn render_boundary_overlay(band_image: &DynamicImage, boundaries: &BoundaryList) -> RgbaImage {
    let mut canvas = band_image.to_rgba8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    let bottom = (height - 1) as f32;
    let last_x = (width - 1) as i32;
    for &x in boundaries.as_slice() {
        let x = x.clamp(0, last_x);
        for column in [x, (x - 1).max(0)] {
            let column = column as f32;
            draw_line_segment_mut(&mut canvas, (column, 0.0), (column, bottom), BOUNDARY_COLOR);
        }
    }
    draw_hollow_rect_mut(
        &mut canvas,
        PixelRect::at(0, 0).of_size(width, height),
        FRAME_COLOR,
    );

    canvas
}
