//! Playback session state — the unit of cancellable work.
//!
//! One [`PlaybackSession`] is one attempt at reading a [`SegmentSequence`]
//! from start to finish. Starting a new session supersedes the previous
//! one; the superseded session's stop flag is set and every message it
//! produced becomes inert (its generation id no longer matches).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::reading::segment::SharedSequence;

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// States of one playback session.
///
/// ```text
/// Idle ──first segment──▶ Speaking
/// Speaking ──all segments done──▶ Done
///          ──stop requested────▶ Stopping ──loop exited──▶ Done (Stopped)
///          ──timeout / failure─▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Created, no segment spoken yet.
    Idle,
    /// A segment is being spoken or waited on.
    Speaking,
    /// Stop was requested; the loop is winding down.
    Stopping,
    /// The session reached a terminal state without error.
    Done,
    /// The session aborted on a timeout or resource failure.
    Failed,
}

impl PlaybackStatus {
    /// `true` while the session still owns the speech resource.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Speaking | PlaybackStatus::Stopping)
    }

    /// A short human-readable label suitable for the UI status line.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Speaking => "Speaking",
            PlaybackStatus::Stopping => "Stopping",
            PlaybackStatus::Done => "Done",
            PlaybackStatus::Failed => "Failed",
        }
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        PlaybackStatus::Idle
    }
}

// ---------------------------------------------------------------------------
// PlaybackSession
// ---------------------------------------------------------------------------

/// One generation of playback over an immutable segment sequence.
///
/// The stop flag is per-session, never process-wide: a stop aimed at
/// generation `n` can never leak into generation `n + 1`.
pub struct PlaybackSession {
    /// Monotonically increasing id; carried on every cross-thread message.
    pub generation: u64,
    sequence: SharedSequence,
    stop: Arc<AtomicBool>,
    pub status: PlaybackStatus,
    /// Index of the segment currently being spoken.
    pub current_index: usize,
}

impl PlaybackSession {
    pub fn new(generation: u64, sequence: SharedSequence) -> Self {
        Self {
            generation,
            sequence,
            stop: Arc::new(AtomicBool::new(false)),
            status: PlaybackStatus::Idle,
            current_index: 0,
        }
    }

    pub fn sequence(&self) -> &SharedSequence {
        &self.sequence
    }

    /// Handle through which the controller cancels this session after the
    /// session itself has been moved into its task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
            generation: self.generation,
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// StopHandle
// ---------------------------------------------------------------------------

/// Cancellation handle for one specific session.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    generation: u64,
}

impl StopHandle {
    /// Request the session's loop to exit. Observed within one poll
    /// interval.
    pub fn request_stop(&self) {
        log::debug!("playback: stop requested for generation {}", self.generation);
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::SegmentSequence;

    // ---- PlaybackStatus ---

    #[test]
    fn speaking_and_stopping_are_active() {
        assert!(PlaybackStatus::Speaking.is_active());
        assert!(PlaybackStatus::Stopping.is_active());
        assert!(!PlaybackStatus::Idle.is_active());
        assert!(!PlaybackStatus::Done.is_active());
        assert!(!PlaybackStatus::Failed.is_active());
    }

    #[test]
    fn default_status_is_idle() {
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Idle);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(PlaybackStatus::Speaking.label(), "Speaking");
        assert_eq!(PlaybackStatus::Failed.label(), "Failed");
    }

    // ---- PlaybackSession / StopHandle ---

    #[test]
    fn stop_handle_flips_the_session_flag() {
        let session = PlaybackSession::new(4, Arc::new(SegmentSequence::empty()));
        assert!(!session.stop_requested());

        let handle = session.stop_handle();
        assert_eq!(handle.generation(), 4);

        handle.request_stop();
        assert!(session.stop_requested());
    }

    #[test]
    fn stop_flags_are_independent_between_sessions() {
        let a = PlaybackSession::new(1, Arc::new(SegmentSequence::empty()));
        let b = PlaybackSession::new(2, Arc::new(SegmentSequence::empty()));

        a.stop_handle().request_stop();
        assert!(a.stop_requested());
        assert!(!b.stop_requested());
    }
}
