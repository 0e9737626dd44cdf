//! Text segments and the immutable per-pass sequence.

use std::sync::Arc;

use crate::detect::{DetectedLine, Quad};

use super::order::{sort_lines, SortOptions};

// ---------------------------------------------------------------------------
// TextSegment
// ---------------------------------------------------------------------------

/// One unit of text to be spoken and highlighted as an atomic step.
///
/// Immutable once created; `order` is the segment's position in the final
/// reading order. Whitespace-only text never becomes a segment.
#[derive(Debug, Clone)]
pub struct TextSegment {
    pub text: String,
    /// Region of the segment in detector coordinates.
    pub quad: Quad,
    /// Detection confidence of the underlying line.
    pub confidence: f32,
    /// 0-based rank in reading order.
    pub order: usize,
}

// ---------------------------------------------------------------------------
// SegmentSequence
// ---------------------------------------------------------------------------

/// Ordered, immutable list of [`TextSegment`]s for one recognition pass.
///
/// Owned by exactly one playback session and shared read-only (via
/// [`SharedSequence`]) with the highlight synchronizer. Never mutated after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SegmentSequence {
    segments: Vec<TextSegment>,
}

/// Cheap read-only handle to a sequence, cloned into playback events.
pub type SharedSequence = Arc<SegmentSequence>;

impl SegmentSequence {
    /// Build a sequence from raw detector output.
    ///
    /// Filters by confidence, drops whitespace-only lines, sorts into
    /// reading order and assigns each surviving line its rank. An empty
    /// result is valid — the playback coordinator completes such a session
    /// immediately without issuing any speech request.
    pub fn from_lines(lines: Vec<DetectedLine>, opts: &SortOptions) -> Self {
        Self {
            segments: sort_lines(lines, opts),
        }
    }

    /// A sequence with no segments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextSegment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextSegment> {
        self.segments.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
