//! Highlight synchronisation — mirrors the active segment onto the page.
//!
//! [`HighlightSync`] consumes [`PlaybackEvent`]s and keeps the rendering
//! surface showing at most one highlighted region: the segment currently
//! being spoken. Segment polygons arrive in detector coordinates and are
//! scaled into display space with
//! `display zoom factor ÷ detector scale factor`.
//!
//! The synchronizer is armed by a generation's `Started` event and ignores
//! events from any other generation, so a highlight can never outlive the
//! generation that produced it.

use crate::detect::Quad;
use crate::playback::PlaybackEvent;
use crate::reading::segment::SharedSequence;

// ---------------------------------------------------------------------------
// RenderSurface
// ---------------------------------------------------------------------------

/// Interface to the page view that physically draws the highlight.
///
/// The surface only ever shows the most recently set polygon; `set` implies
/// replacing whatever was highlighted before.
pub trait RenderSurface: Send {
    /// Show `quad` (display coordinates) as the active highlight.
    fn set_highlight(&mut self, quad: Quad);

    /// Remove any visible highlight.
    fn clear_highlight(&mut self);

    /// Current display zoom factor of the page view.
    fn zoom_factor(&self) -> f32;
}

// ---------------------------------------------------------------------------
// HighlightState
// ---------------------------------------------------------------------------

/// The currently highlighted region, if any, in display coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightState {
    pub active: Option<Quad>,
}

// ---------------------------------------------------------------------------
// HighlightSync
// ---------------------------------------------------------------------------

/// Maps playback notifications onto the rendering surface.
pub struct HighlightSync {
    surface: Box<dyn RenderSurface>,
    /// Ratio between detector coordinate space and the base page space
    /// (`render_dpi / base_dpi`).
    detect_scale: f32,
    /// Generation currently being tracked, with its sequence.
    armed: Option<(u64, SharedSequence)>,
}

impl HighlightSync {
    pub fn new(surface: Box<dyn RenderSurface>, detect_scale: f32) -> Self {
        Self {
            surface,
            // A degenerate scale would blow the highlight up to infinity.
            detect_scale: if detect_scale > 0.0 { detect_scale } else { 1.0 },
            armed: None,
        }
    }

    /// Feed one playback notification through the synchronizer.
    pub fn on_event(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Started {
                generation,
                sequence,
            } => {
                self.surface.clear_highlight();
                self.armed = Some((*generation, sequence.clone()));
            }

            PlaybackEvent::SegmentStarted { generation, index } => {
                let Some((armed_generation, sequence)) = &self.armed else {
                    return;
                };
                if armed_generation != generation {
                    log::debug!("highlight: ignoring stale segment start (generation {generation})");
                    return;
                }
                self.surface.clear_highlight();
                if let Some(segment) = sequence.get(*index) {
                    let factor = self.surface.zoom_factor() / self.detect_scale;
                    self.surface.set_highlight(segment.quad.scaled(factor));
                }
            }

            PlaybackEvent::SegmentFinished { generation, .. } => {
                if self.is_armed_for(*generation) {
                    self.surface.clear_highlight();
                }
            }

            PlaybackEvent::Finished { generation, .. } => {
                // Terminal for its generation: nothing stays highlighted,
                // whatever the outcome was.
                if self.is_armed_for(*generation) {
                    self.armed = None;
                }
                self.surface.clear_highlight();
            }
        }
    }

    fn is_armed_for(&self, generation: u64) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|(armed, _)| *armed == generation)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectedLine, Quad};
    use crate::playback::{PlaybackEvent, PlaybackOutcome};
    use crate::reading::{SegmentSequence, SortOptions};
    use std::sync::{Arc, Mutex};

    // -----------------------------------------------------------------------
    // Recording surface
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Set(Quad),
        Clear,
    }

    struct RecordingSurface {
        ops: Arc<Mutex<Vec<Op>>>,
        zoom: f32,
    }

    impl RenderSurface for RecordingSurface {
        fn set_highlight(&mut self, quad: Quad) {
            self.ops.lock().unwrap().push(Op::Set(quad));
        }

        fn clear_highlight(&mut self) {
            self.ops.lock().unwrap().push(Op::Clear);
        }

        fn zoom_factor(&self) -> f32 {
            self.zoom
        }
    }

    fn sync_with_zoom(zoom: f32, detect_scale: f32) -> (HighlightSync, Arc<Mutex<Vec<Op>>>) {
        let ops = Arc::new(Mutex::new(Vec::new()));
        let surface = RecordingSurface {
            ops: Arc::clone(&ops),
            zoom,
        };
        (HighlightSync::new(Box::new(surface), detect_scale), ops)
    }

    fn one_segment_sequence() -> SharedSequence {
        Arc::new(SegmentSequence::from_lines(
            vec![DetectedLine::new(
                Quad::from_rect(10.0, 20.0, 100.0, 30.0),
                "line",
                0.9,
            )],
            &SortOptions::default(),
        ))
    }

    fn started(generation: u64, sequence: &SharedSequence) -> PlaybackEvent {
        PlaybackEvent::Started {
            generation,
            sequence: sequence.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Segment start highlights the scaled polygon; segment finish clears.
    #[test]
    fn segment_lifecycle_sets_then_clears() {
        let (mut sync, ops) = sync_with_zoom(4.0, 2.0);
        let sequence = one_segment_sequence();

        sync.on_event(&started(1, &sequence));
        sync.on_event(&PlaybackEvent::SegmentStarted {
            generation: 1,
            index: 0,
        });
        sync.on_event(&PlaybackEvent::SegmentFinished {
            generation: 1,
            index: 0,
        });

        // zoom 4.0 over detect scale 2.0 doubles the detector coordinates.
        let expected = Quad::from_rect(20.0, 40.0, 200.0, 60.0);
        assert_eq!(
            *ops.lock().unwrap(),
            vec![Op::Clear, Op::Clear, Op::Set(expected), Op::Clear]
        );
    }

    /// The terminal notification always clears, for every outcome.
    #[test]
    fn finished_clears_highlight() {
        for outcome in [
            PlaybackOutcome::Completed,
            PlaybackOutcome::Stopped,
            PlaybackOutcome::Failed(crate::playback::PlaybackError::WorkerGone),
        ] {
            let (mut sync, ops) = sync_with_zoom(1.0, 1.0);
            let sequence = one_segment_sequence();

            sync.on_event(&started(1, &sequence));
            sync.on_event(&PlaybackEvent::SegmentStarted {
                generation: 1,
                index: 0,
            });
            sync.on_event(&PlaybackEvent::Finished {
                generation: 1,
                outcome: outcome.clone(),
            });

            assert_eq!(
                ops.lock().unwrap().last(),
                Some(&Op::Clear),
                "highlight must be cleared after {outcome:?}"
            );
        }
    }

    /// Events from a superseded generation never touch the highlight.
    #[test]
    fn stale_generation_events_are_ignored() {
        let (mut sync, ops) = sync_with_zoom(1.0, 1.0);
        let sequence = one_segment_sequence();

        sync.on_event(&started(2, &sequence));
        let before = ops.lock().unwrap().len();

        sync.on_event(&PlaybackEvent::SegmentStarted {
            generation: 1,
            index: 0,
        });
        sync.on_event(&PlaybackEvent::SegmentFinished {
            generation: 1,
            index: 0,
        });

        assert_eq!(ops.lock().unwrap().len(), before);
    }

    /// A segment start without a prior `Started` is inert.
    #[test]
    fn unarmed_sync_ignores_segment_events() {
        let (mut sync, ops) = sync_with_zoom(1.0, 1.0);

        sync.on_event(&PlaybackEvent::SegmentStarted {
            generation: 1,
            index: 0,
        });

        assert!(ops.lock().unwrap().is_empty());
    }

    /// An out-of-range segment index clears but sets nothing.
    #[test]
    fn out_of_range_index_sets_nothing() {
        let (mut sync, ops) = sync_with_zoom(1.0, 1.0);
        let sequence = one_segment_sequence();

        sync.on_event(&started(1, &sequence));
        sync.on_event(&PlaybackEvent::SegmentStarted {
            generation: 1,
            index: 9,
        });

        assert!(!ops.lock().unwrap().iter().any(|op| matches!(op, Op::Set(_))));
    }

    /// A zero detector scale falls back to 1.0 instead of dividing by zero.
    #[test]
    fn zero_detect_scale_falls_back() {
        let (mut sync, ops) = sync_with_zoom(3.0, 0.0);
        let sequence = one_segment_sequence();

        sync.on_event(&started(1, &sequence));
        sync.on_event(&PlaybackEvent::SegmentStarted {
            generation: 1,
            index: 0,
        });

        let expected = Quad::from_rect(30.0, 60.0, 300.0, 90.0);
        assert!(ops.lock().unwrap().contains(&Op::Set(expected)));
    }
}
