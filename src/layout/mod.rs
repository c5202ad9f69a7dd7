//! # Table Layout Recovery
//!
//! This module recovers the column structure of a photographed shift table.
//!
//! The module is organized into focused sub-modules:
//! - `bands`: header/body band location from recognized words
//! - `projection`: column darkness profiles and moving averages
//! - `boundaries`: competing column boundary strategies and reconciliation
//! - `slicing`: band cropping, per-column cells and canvas padding
//! - `overlay`: boundary preview rendering
//! - `types`: Shared types and error definitions

pub mod bands;
pub mod boundaries;
pub mod overlay;
pub mod projection;
pub mod slicing;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    BodySelection, BoundaryCandidate, BoundaryList, Cell, HeaderRow, LayoutError, Polarity,
    Projection, Strategy, StrategyChoice, ValleyBaseline,
};

pub use bands::{
    locate_body_band, locate_header_band, locate_header_row, row_bands, select_body_band,
};
pub use boundaries::{
    detect_all, detect_boundaries, enforce_min_cell_width, select_candidate, BoundaryOptions,
};
pub use overlay::render_boundary_overlay;
pub use projection::{build_projection, min_cell_width, rough_char_width, smooth, vertical_projection};
pub use slicing::{crop_band, ensure_min_canvas, slice_by_boundaries};
