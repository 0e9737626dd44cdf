//! Page-image provider interface.
//!
//! Document loading and rasterisation are external collaborators; this
//! module defines the raster type the rest of the crate consumes
//! ([`PageImage`]) and the [`PageProvider`] trait the UI and the
//! recognition pass are written against.

use std::sync::{Arc, Mutex};

use thiserror::Error;

// ---------------------------------------------------------------------------
// PageImage
// ---------------------------------------------------------------------------

/// A rasterised document page.
///
/// `rgba` is tightly packed RGBA8, row-major, `width × height × 4` bytes.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    /// DPI the page was rasterised at — the detector coordinate space.
    pub dpi: u32,
    pub rgba: Vec<u8>,
}

impl PageImage {
    pub fn new(width: u32, height: u32, dpi: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            dpi,
            rgba,
        }
    }

    /// `true` when the buffer length matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

// ---------------------------------------------------------------------------
// PageError
// ---------------------------------------------------------------------------

/// Errors from the page-image provider.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// No document is loaded.
    #[error("no document is loaded: {0}")]
    NoDocument(String),

    /// The requested page index does not exist.
    #[error("page {0} is out of range")]
    OutOfRange(usize),

    /// Rasterisation failed.
    #[error("page rendering failed: {0}")]
    Render(String),
}

// ---------------------------------------------------------------------------
// PageProvider trait
// ---------------------------------------------------------------------------

/// Interface to the document backend.
///
/// Rendering is a blocking call; the recognition pass runs it via
/// `spawn_blocking` while the UI renders at frame time from its own cache.
pub trait PageProvider: Send {
    /// Rasterise the current page at `dpi`.
    fn render_current_page(&self, dpi: u32) -> Result<PageImage, PageError>;

    /// Total number of pages, 0 when no document is loaded.
    fn page_count(&self) -> usize;

    /// Zero-based index of the current page.
    fn current_page(&self) -> usize;

    /// Advance to the next page. Returns `false` at the last page.
    fn next_page(&mut self) -> bool;

    /// Go back to the previous page. Returns `false` at the first page.
    fn prev_page(&mut self) -> bool;
}

/// Shared handle to the document backend. The UI navigates and renders
/// through it; the recognition pass borrows it briefly on the blocking pool.
pub type SharedDocument = Arc<Mutex<dyn PageProvider>>;

// ---------------------------------------------------------------------------
// MockPageProvider  (test-only)
// ---------------------------------------------------------------------------

/// In-memory provider with a fixed number of blank pages.
#[cfg(test)]
pub struct MockPageProvider {
    pages: usize,
    current: usize,
}

#[cfg(test)]
impl MockPageProvider {
    pub fn with_pages(pages: usize) -> Self {
        Self { pages, current: 0 }
    }
}

#[cfg(test)]
impl PageProvider for MockPageProvider {
    fn render_current_page(&self, dpi: u32) -> Result<PageImage, PageError> {
        if self.pages == 0 {
            return Err(PageError::NoDocument("mock".into()));
        }
        Ok(PageImage::new(8, 8, dpi, vec![255; 8 * 8 * 4]))
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn current_page(&self) -> usize {
        self.current
    }

    fn next_page(&mut self) -> bool {
        if self.current + 1 < self.pages {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn prev_page(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_checks_buffer_length() {
        let good = PageImage::new(2, 3, 72, vec![0; 2 * 3 * 4]);
        assert!(good.is_well_formed());

        let bad = PageImage::new(2, 3, 72, vec![0; 5]);
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn mock_navigation_clamps_at_both_ends() {
        let mut doc = MockPageProvider::with_pages(2);
        assert_eq!(doc.current_page(), 0);
        assert!(!doc.prev_page());
        assert!(doc.next_page());
        assert_eq!(doc.current_page(), 1);
        assert!(!doc.next_page());
        assert!(doc.prev_page());
        assert_eq!(doc.current_page(), 0);
    }

    #[test]
    fn empty_mock_renders_no_document() {
        let doc = MockPageProvider::with_pages(0);
        assert!(matches!(
            doc.render_current_page(144),
            Err(PageError::NoDocument(_))
        ));
    }
}
