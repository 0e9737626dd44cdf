//! Playback coordination module.
//!
//! This is the heart of the crate: the state machine that walks a
//! [`crate::reading::SegmentSequence`] one segment at a time, hands each
//! utterance to the speech worker, waits with a bounded timeout, emits the
//! per-segment lifecycle notifications the UI and highlight consume, and
//! guarantees that a superseded generation is fully retired — resource
//! included — before its successor issues a single request.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use read_aloud::config::AppConfig;
//! use read_aloud::playback::{PlaybackCommand, PlaybackController, PlaybackTiming};
//! use read_aloud::speech::{SynthFactory, SystemSynth, SpeechSynth};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let speech = config.speech.clone();
//!     let factory: SynthFactory = Arc::new(move || {
//!         SystemSynth::new(&speech).map(|s| Box::new(s) as Box<dyn SpeechSynth>)
//!     });
//!
//!     let (command_tx, command_rx) = mpsc::channel::<PlaybackCommand>(16);
//!     let (events_tx, _events_rx) = mpsc::channel(32);
//!
//!     let controller = PlaybackController::new(
//!         factory,
//!         events_tx,
//!         PlaybackTiming::from_config(&config.playback),
//!     );
//!     tokio::spawn(controller.run(command_rx));
//!
//!     // command_tx is handed to the UI layer.
//!     # drop(command_tx);
//! }
//! ```

pub mod controller;
pub mod session;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{
    PlaybackCommand, PlaybackController, PlaybackError, PlaybackEvent, PlaybackOutcome,
    PlaybackTiming,
};
pub use session::{PlaybackSession, PlaybackStatus, StopHandle};
