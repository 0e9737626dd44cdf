//! Read Aloud — a desktop document reader with a spoken-text accessibility
//! pipeline.
//!
//! The crate renders a document page to an image, runs text detection on it,
//! sorts the detected lines into natural reading order, then speaks the
//! resulting segments one at a time while a highlight tracks the segment
//! currently being read.
//!
//! # Architecture
//!
//! ```text
//! PageProvider ──render──▶ PageImage ──▶ TextDetector ──▶ Vec<DetectedLine>
//!                                                              │
//!                                                              ▼
//!                                              SegmentSequence (reading order)
//!                                                              │
//!                 PlaybackCommand::Start { sequence }          ▼
//! UI ─────────────────────────────────────────▶ PlaybackController (tokio task)
//!                                                    │  one request at a time
//!                                                    ▼
//!                                              SpeechWorker (dedicated thread,
//!                                                    │        owns tts::Tts)
//!                                                    ▼
//!                                              SpeechDone { generation, index }
//!
//! PlaybackEvent { Started, SegmentStarted, SegmentFinished, Finished }
//!    └──▶ UI status line + HighlightSync ──▶ RenderSurface
//! ```
//!
//! The invariants that hold this together: at most one utterance is in
//! flight system-wide, only the worker thread touches the speech resource,
//! and every cross-thread message carries the generation id of the playback
//! session that issued it — messages from superseded generations are drained
//! and ignored.

pub mod app;
pub mod config;
pub mod detect;
pub mod highlight;
pub mod page;
pub mod playback;
pub mod reading;
pub mod speech;
