//! The [`TextDetector`] trait and its errors.
//!
//! [`TextDetector`] is the seam between this crate and whichever OCR /
//! text-detection library the application is wired with. It is object-safe
//! and `Send + Sync` so it can be held behind an `Arc<dyn TextDetector>`
//! and called from `tokio::task::spawn_blocking`.
//!
//! [`MockDetector`] (available under `#[cfg(test)]`) returns a
//! pre-configured response — useful for unit-testing the recognition pass
//! without a real detection backend.

use thiserror::Error;

use crate::detect::region::DetectedLine;
use crate::page::PageImage;

// ---------------------------------------------------------------------------
// DetectError
// ---------------------------------------------------------------------------

/// All errors that can arise from the text-detection subsystem.
#[derive(Debug, Clone, Error)]
pub enum DetectError {
    /// No detection backend is configured or it failed to start.
    #[error("text detection unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the supplied image.
    #[error("invalid page image: {0}")]
    InvalidImage(String),

    /// The detection pass itself failed.
    #[error("text detection failed: {0}")]
    Detection(String),
}

// ---------------------------------------------------------------------------
// TextDetector trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for text-detection backends.
///
/// # Contract
///
/// - `detect` is a blocking call; run it via `spawn_blocking`.
/// - Returned lines carry coordinates in the pixel space of `image`.
/// - Backends report raw lines only — confidence filtering and reading-order
///   sorting are the caller's concern (see [`crate::reading`]).
pub trait TextDetector: Send + Sync {
    /// Detect text lines on `image`.
    fn detect(&self, image: &PageImage) -> Result<Vec<DetectedLine>, DetectError>;
}

// Compile-time assertion: Box<dyn TextDetector> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TextDetector>) {}
};

// ---------------------------------------------------------------------------
// MockDetector  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response without any
/// detection backend.
#[cfg(test)]
pub struct MockDetector {
    response: Result<Vec<DetectedLine>, DetectError>,
}

#[cfg(test)]
impl MockDetector {
    /// Create a mock that always returns `Ok(lines)`.
    pub fn ok(lines: Vec<DetectedLine>) -> Self {
        Self {
            response: Ok(lines),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: DetectError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl TextDetector for MockDetector {
    fn detect(&self, _image: &PageImage) -> Result<Vec<DetectedLine>, DetectError> {
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::region::Quad;

    fn blank_image() -> PageImage {
        PageImage::new(4, 4, 144, vec![0; 4 * 4 * 4])
    }

    #[test]
    fn mock_ok_returns_configured_lines() {
        let lines = vec![DetectedLine::new(
            Quad::from_rect(0.0, 0.0, 10.0, 10.0),
            "第一段",
            0.9,
        )];
        let detector = MockDetector::ok(lines);
        let result = detector.detect(&blank_image()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "第一段");
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let detector = MockDetector::err(DetectError::Detection("boom".into()));
        let err = detector.detect(&blank_image()).unwrap_err();
        assert!(matches!(err, DetectError::Detection(_)));
    }

    #[test]
    fn box_dyn_text_detector_compiles() {
        // If this test compiles, the trait is object-safe.
        let detector: Box<dyn TextDetector> = Box::new(MockDetector::ok(Vec::new()));
        let _ = detector.detect(&blank_image());
    }

    #[test]
    fn detect_error_display_carries_message() {
        let e = DetectError::Unavailable("no backend configured".into());
        assert!(e.to_string().contains("no backend configured"));
    }
}
