//! Reading-order sorting of detected text lines.
//!
//! # Overview
//!
//! The detection backend reports lines in whatever order it found them.
//! Before playback the lines are arranged into natural reading order:
//! centroids are bucketed into rows of a fixed height, rows run top to
//! bottom, and within a row lines run left to right.
//!
//! ```text
//! Vec<DetectedLine> ──filter──▶ confidence ≥ threshold, non-empty text
//!                   ──bucket──▶ row = floor(ȳ / row_height)
//!                   ──sort────▶ (row, x̄) ascending
//!                   ──rank────▶ SegmentSequence
//! ```

pub mod order;
pub mod segment;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use order::SortOptions;
pub use segment::{SegmentSequence, TextSegment};
