//! Speech synthesis module.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                 SpeechSynth (trait)                         │
//! │                                                            │
//! │   SystemSynth ── wraps tts::Tts (SAPI / speech-dispatcher  │
//! │                  / AVFoundation)                           │
//! │                                                            │
//! │   SpeechWorker ── dedicated "speech-synth" OS thread, the  │
//! │                   only caller of the synth; requests in    │
//! │                   over std mpsc, completions out over a    │
//! │                   tokio channel                            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The synthesis resource is exclusive: at most one utterance is in flight
//! system-wide, and only the worker thread ever touches the handle. After a
//! stop, a timeout or a failure the handle is not trusted — the playback
//! controller drops the worker and spawns a fresh one (new thread, new
//! handle, new self-test).

pub mod synth;
pub mod worker;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use synth::{SpeechSynth, SynthError, SynthFactory, SystemSynth};
pub use worker::{SpeechDone, SpeechRequester, SpeechWorker};

// test-only re-export so playback tests can import MockSynth without the
// full path.
#[cfg(test)]
pub use synth::{MockSynth, MockUtterance};
