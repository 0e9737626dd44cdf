//! Core speech-synthesis trait and the system-backend implementation.
//!
//! # Overview
//!
//! [`SpeechSynth`] is the minimal surface the worker thread needs to run
//! one utterance to completion while staying interruptible: start an
//! utterance, poll whether it is still playing, stop it. It is
//! deliberately not a "speak and block" API — the blocking wait (and its
//! interrupt check) lives in [`crate::speech::worker`], next to the thread
//! that owns the handle.
//!
//! [`SystemSynth`] is the production implementation over [`tts::Tts`].
//! Construction performs the full initialisation sequence: create the
//! backend, select the configured voice when present, set the speaking
//! rate, then run a self-test that speaks a near-silent utterance and
//! confirms it completes. A handle that fails any of these steps is never
//! returned.
//!
//! [`MockSynth`] (available under `#[cfg(test)]`) plays scripted utterances
//! — the backbone of the playback coordinator tests.

use std::time::{Duration, Instant};

use thiserror::Error;
use tts::Tts;

use crate::config::SpeechConfig;

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

/// All errors that can arise from the speech subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    /// Backend construction, voice selection or rate setup failed.
    /// Fatal: no usable handle exists.
    #[error("speech backend initialisation failed: {0}")]
    Init(String),

    /// The initialisation self-test did not complete.
    /// Fatal: the handle cannot be trusted.
    #[error("speech self-test failed: {0}")]
    SelfTest(String),

    /// A single utterance failed. Recoverable — the caller may retry after
    /// the handle has been reinitialised.
    #[error("utterance failed: {0}")]
    Utterance(String),

    /// The utterance was cut short by an interrupt. Not a fault — the
    /// session that requested it has been stopped or superseded.
    #[error("utterance interrupted")]
    Interrupted,

    /// The backend stopped reporting progress on an utterance.
    #[error("speech backend stopped responding")]
    Unresponsive,
}

// ---------------------------------------------------------------------------
// SpeechSynth trait
// ---------------------------------------------------------------------------

/// Object-safe interface to one exclusive speech-synthesis handle.
///
/// # Contract
///
/// - The handle is created and driven entirely on the one thread that owns
///   it (see [`crate::speech::worker`]); it never crosses a thread
///   boundary, which is why no `Send` bound is required — or wanted, since
///   platform speech handles are not portable across threads.
/// - `begin_utterance` starts playback and returns immediately.
/// - `is_busy` is a cheap probe; an `Err` means the handle is broken.
/// - `stop` is a best-effort halt; afterwards the handle is not trusted and
///   callers reinitialise before reuse.
pub trait SpeechSynth {
    /// Start speaking `text`. Returns once synthesis has been queued.
    fn begin_utterance(&mut self, text: &str) -> Result<(), SynthError>;

    /// `true` while the current utterance is still playing.
    fn is_busy(&mut self) -> Result<bool, SynthError>;

    /// Best-effort immediate halt of the current utterance.
    fn stop(&mut self) -> Result<(), SynthError>;
}

// Compile-time assertion: Box<dyn SpeechSynth> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechSynth>) {}
};

/// Constructor for fresh synth handles.
///
/// The playback controller calls it on startup and again after every
/// stop/timeout/failure, so it must be callable repeatedly.
pub type SynthFactory =
    std::sync::Arc<dyn Fn() -> Result<Box<dyn SpeechSynth>, SynthError> + Send + Sync>;

// ---------------------------------------------------------------------------
// SystemSynth
// ---------------------------------------------------------------------------

/// How long the self-test waits for its near-silent utterance to finish.
const SELF_TEST_BOUND: Duration = Duration::from_secs(3);
/// Poll interval of the self-test wait.
const SELF_TEST_TICK: Duration = Duration::from_millis(25);
/// Assumed speaking throughput for backends that cannot report progress.
const FALLBACK_MS_PER_CHAR: u64 = 80;

/// Production synthesis handle over the system speech backend.
pub struct SystemSynth {
    tts: Tts,
    /// Whether the backend can report `is_speaking`.
    can_report_speaking: bool,
    /// Synthetic busy deadline for backends that cannot.
    busy_until: Option<Instant>,
}

impl std::fmt::Debug for SystemSynth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSynth")
            .field("can_report_speaking", &self.can_report_speaking)
            .finish_non_exhaustive()
    }
}

impl SystemSynth {
    /// Initialise the system speech backend.
    ///
    /// Runs the full sequence from the config: backend construction, voice
    /// selection (best effort — a missing voice only logs a warning), rate
    /// setup, self-test.
    ///
    /// # Errors
    ///
    /// - [`SynthError::Init`] — the backend could not be constructed or
    ///   configured.
    /// - [`SynthError::SelfTest`] — the probe utterance did not complete.
    pub fn new(config: &SpeechConfig) -> Result<Self, SynthError> {
        let mut tts = Tts::default().map_err(|e| SynthError::Init(e.to_string()))?;
        let features = tts.supported_features();

        // Voice selection: substring match on the installed voice names.
        if let Some(wanted) = config.voice.as_deref() {
            if features.voice {
                match tts.voices() {
                    Ok(voices) => match voices.iter().find(|v| v.name().contains(wanted)) {
                        Some(voice) => {
                            tts.set_voice(voice)
                                .map_err(|e| SynthError::Init(e.to_string()))?;
                            log::info!("speech: using voice {}", voice.name());
                        }
                        None => {
                            log::warn!("speech: voice {wanted:?} not installed, using default");
                        }
                    },
                    Err(e) => {
                        log::warn!("speech: voice listing failed ({e}), using default voice");
                    }
                }
            } else {
                log::warn!("speech: backend has no voice selection, ignoring {wanted:?}");
            }
        }

        if features.rate {
            let rate = scaled_rate(
                tts.normal_rate(),
                tts.min_rate(),
                tts.max_rate(),
                config.rate,
            );
            tts.set_rate(rate)
                .map_err(|e| SynthError::Init(e.to_string()))?;
        }

        let mut synth = Self {
            tts,
            can_report_speaking: features.is_speaking,
            busy_until: None,
        };

        synth.self_test()?;
        Ok(synth)
    }

    /// Speak a near-silent utterance and confirm it runs to completion.
    ///
    /// This is the only way to know the backend is actually operative —
    /// constructing a `Tts` succeeds on machines whose audio stack is
    /// broken.
    fn self_test(&mut self) -> Result<(), SynthError> {
        self.tts
            .speak(" ", true)
            .map_err(|e| SynthError::SelfTest(e.to_string()))?;

        let deadline = Instant::now() + SELF_TEST_BOUND;
        while Instant::now() < deadline {
            match self.probe_busy() {
                Ok(false) => {
                    log::debug!("speech: self-test completed");
                    return Ok(());
                }
                Ok(true) => std::thread::sleep(SELF_TEST_TICK),
                Err(e) => return Err(SynthError::SelfTest(e.to_string())),
            }
        }
        Err(SynthError::SelfTest("probe utterance never finished".into()))
    }

    fn probe_busy(&mut self) -> Result<bool, SynthError> {
        if self.can_report_speaking {
            self.tts
                .is_speaking()
                .map_err(|e| SynthError::Utterance(e.to_string()))
        } else {
            // Backend cannot report progress: estimate from text length.
            Ok(self.busy_until.is_some_and(|t| Instant::now() < t))
        }
    }
}

impl SpeechSynth for SystemSynth {
    fn begin_utterance(&mut self, text: &str) -> Result<(), SynthError> {
        if !self.can_report_speaking {
            let est = FALLBACK_MS_PER_CHAR * text.chars().count().max(1) as u64;
            self.busy_until = Some(Instant::now() + Duration::from_millis(est.clamp(500, 30_000)));
        }
        self.tts
            .speak(text, false)
            .map(|_| ())
            .map_err(|e| SynthError::Utterance(e.to_string()))
    }

    fn is_busy(&mut self) -> Result<bool, SynthError> {
        self.probe_busy()
    }

    fn stop(&mut self) -> Result<(), SynthError> {
        self.busy_until = None;
        self.tts
            .stop()
            .map(|_| ())
            .map_err(|e| SynthError::Utterance(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Rate mapping
// ---------------------------------------------------------------------------

/// Map a user-facing rate multiplier onto the backend's rate range.
///
/// `1.0` is the backend's normal rate; values above interpolate towards the
/// maximum, values below towards the minimum. Backend ranges differ wildly
/// (SAPI uses −10..10, speech-dispatcher −100..100), so plain
/// multiplication is not meaningful.
fn scaled_rate(normal: f32, min: f32, max: f32, multiplier: f32) -> f32 {
    let m = multiplier.clamp(0.0, 2.0);
    if m >= 1.0 {
        normal + (max - normal) * (m - 1.0)
    } else {
        min + (normal - min) * m
    }
}

// ---------------------------------------------------------------------------
// MockSynth  (test-only)
// ---------------------------------------------------------------------------

/// Behaviour of one scripted mock utterance.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockUtterance {
    /// Reports busy for `polls` probes, then completes.
    Completes { polls: u32 },
    /// Never completes on its own; only `stop` ends it.
    Hangs,
    /// `begin_utterance` fails with this message.
    FailsToBegin(String),
}

/// A scripted test double. Utterances are consumed from the script in
/// order; once the script is exhausted every utterance completes after one
/// probe.
#[cfg(test)]
pub struct MockSynth {
    script: std::collections::VecDeque<MockUtterance>,
    /// `Some(remaining_polls)` while an utterance is playing;
    /// `Some(u32::MAX)` means it hangs.
    busy: Option<u32>,
    /// Call log shared with the test: "begin:<text>", "stop".
    pub log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl MockSynth {
    pub fn scripted(script: Vec<MockUtterance>) -> Self {
        Self {
            script: script.into(),
            busy: None,
            log: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Every utterance completes after a single probe.
    pub fn always_ok() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn with_log(
        script: Vec<MockUtterance>,
        log: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            script: script.into(),
            busy: None,
            log,
        }
    }
}

#[cfg(test)]
impl SpeechSynth for MockSynth {
    fn begin_utterance(&mut self, text: &str) -> Result<(), SynthError> {
        self.log.lock().unwrap().push(format!("begin:{text}"));
        match self
            .script
            .pop_front()
            .unwrap_or(MockUtterance::Completes { polls: 1 })
        {
            MockUtterance::Completes { polls } => {
                self.busy = Some(polls);
                Ok(())
            }
            MockUtterance::Hangs => {
                self.busy = Some(u32::MAX);
                Ok(())
            }
            MockUtterance::FailsToBegin(msg) => Err(SynthError::Utterance(msg)),
        }
    }

    fn is_busy(&mut self) -> Result<bool, SynthError> {
        match self.busy {
            None | Some(0) => {
                self.busy = None;
                Ok(false)
            }
            Some(u32::MAX) => Ok(true),
            Some(n) => {
                self.busy = Some(n - 1);
                Ok(true)
            }
        }
    }

    fn stop(&mut self) -> Result<(), SynthError> {
        self.log.lock().unwrap().push("stop".into());
        self.busy = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
