//! Text-detection interface.
//!
//! The detection backend itself is an external collaborator — this module
//! defines the geometry types it reports ([`Point`], [`Quad`],
//! [`DetectedLine`]) and the object-safe [`TextDetector`] trait the rest of
//! the crate is written against. Detection runs once per recognition pass,
//! on the blocking thread pool, before playback starts.

pub mod engine;
pub mod region;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{DetectError, TextDetector};
pub use region::{DetectedLine, Point, Quad};

// test-only re-export so other modules' test code can import MockDetector
// without the full path.
#[cfg(test)]
pub use engine::MockDetector;
