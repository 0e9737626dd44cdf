//! Dedicated OS-thread owner of the speech-synthesis handle.
//!
//! The synth handle must only ever be driven from one thread.
//! [`SpeechWorker`] owns that thread: requests arrive over a std mpsc
//! channel, each one is played to completion (or interrupted), and a
//! [`SpeechDone`] tagged with the request's generation and index goes back
//! over a tokio channel via `blocking_send`.
//!
//! # Shutdown caveat
//!
//! Dropping the worker sets the interrupt flag and closes the request
//! channel. A thread that is mid-utterance finishes (or aborts) its current
//! wait loop, finds the channel closed, and exits. It is never joined — a
//! backend that stops responding would otherwise block the caller, and the
//! wait loop's own bound guarantees the thread terminates on its own.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
use std::time::{Duration, Instant};

use super::synth::{SpeechSynth, SynthError, SynthFactory};

/// How long `spawn` waits for the handle to initialise and self-test.
const INIT_TIMEOUT: Duration = Duration::from_secs(15);
/// Hard bound on a single utterance. The playback coordinator times out
/// long before this; the bound only guarantees an abandoned worker thread
/// eventually exits.
const MAX_UTTERANCE: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// One utterance request, tagged with the issuing playback generation.
#[derive(Debug)]
struct SpeechRequest {
    generation: u64,
    index: usize,
    text: String,
}

/// Completion report for one request.
///
/// Consumers must compare `generation` (and `index`) against the session
/// they are waiting for — reports from superseded generations still arrive
/// on the channel and are inert.
#[derive(Debug)]
pub struct SpeechDone {
    pub generation: u64,
    pub index: usize,
    pub result: Result<(), SynthError>,
}

// ---------------------------------------------------------------------------
// SpeechRequester
// ---------------------------------------------------------------------------

/// Cloneable sender half used by the playback session loop to hand one
/// utterance at a time to the worker.
#[derive(Clone)]
pub struct SpeechRequester {
    tx: mpsc::Sender<SpeechRequest>,
}

impl SpeechRequester {
    /// Queue one utterance. Returns `false` when the worker is gone.
    pub fn request(&self, generation: u64, index: usize, text: String) -> bool {
        self.tx
            .send(SpeechRequest {
                generation,
                index,
                text,
            })
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// SpeechWorker
// ---------------------------------------------------------------------------

/// Handle to the running `speech-synth` thread.
///
/// Construct with [`SpeechWorker::spawn`]; drop to retire the thread. The
/// worker is single-use with respect to trust: after an interrupt or a
/// failed utterance the playback controller drops it and spawns a fresh
/// one rather than reusing the handle.
#[derive(Debug)]
pub struct SpeechWorker {
    request_tx: mpsc::Sender<SpeechRequest>,
    interrupt: Arc<AtomicBool>,
    thread: std::thread::JoinHandle<()>,
}

impl SpeechWorker {
    /// Spawn the worker thread and initialise a fresh synth handle on it.
    ///
    /// Blocks until the handle reports ready or failed, so a fatal
    /// initialisation error surfaces here — before any playback starts.
    /// Returns the worker together with the receiver for its completion
    /// reports.
    ///
    /// `tick` is the poll interval of the utterance wait loop.
    pub fn spawn(
        factory: SynthFactory,
        tick: Duration,
    ) -> Result<(Self, tokio::sync::mpsc::Receiver<SpeechDone>), SynthError> {
        let (request_tx, request_rx) = mpsc::channel::<SpeechRequest>();
        let (done_tx, done_rx) = tokio::sync::mpsc::channel::<SpeechDone>(16);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SynthError>>();

        let interrupt = Arc::new(AtomicBool::new(false));
        let interrupt_flag = Arc::clone(&interrupt);

        let thread = std::thread::Builder::new()
            .name("speech-synth".into())
            .spawn(move || {
                let mut synth = match factory() {
                    Ok(synth) => {
                        let _ = ready_tx.send(Ok(()));
                        synth
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(req) = request_rx.recv() {
                    log::debug!(
                        "speech: gen {} segment {} ({} chars)",
                        req.generation,
                        req.index,
                        req.text.chars().count()
                    );

                    let result =
                        speak_to_completion(synth.as_mut(), &req.text, &interrupt_flag, tick);

                    let done = SpeechDone {
                        generation: req.generation,
                        index: req.index,
                        result,
                    };
                    if done_tx.blocking_send(done).is_err() {
                        // Receiver gone — the worker has been retired.
                        break;
                    }
                }

                log::debug!("speech: worker thread exiting");
            })
            .map_err(|e| SynthError::Init(format!("failed to spawn speech thread: {e}")))?;

        match ready_rx.recv_timeout(INIT_TIMEOUT) {
            Ok(Ok(())) => Ok((
                Self {
                    request_tx,
                    interrupt,
                    thread,
                },
                done_rx,
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SynthError::Init(
                "speech backend did not come up in time".into(),
            )),
        }
    }

    /// Sender half for the session loop.
    pub fn requester(&self) -> SpeechRequester {
        SpeechRequester {
            tx: self.request_tx.clone(),
        }
    }

    /// Best-effort halt of the in-progress utterance. The worker is not
    /// trusted afterwards; spawn a fresh one before the next utterance.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    /// Cheap liveness probe: `false` once the worker thread has exited.
    pub fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }
}

impl Drop for SpeechWorker {
    fn drop(&mut self) {
        // Abort any in-flight utterance; the closed request channel then
        // lets the thread run off the end of its loop.
        self.interrupt.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// speak_to_completion
// ---------------------------------------------------------------------------

/// Play `text` to the end, to an interrupt, or to an error.
///
/// An interrupt comes back as [`SynthError::Interrupted`] so the waiting
/// session can tell a cut-short utterance from a genuinely completed one —
/// a stop must never be mistaken for a segment finishing.
fn speak_to_completion(
    synth: &mut dyn SpeechSynth,
    text: &str,
    interrupt: &AtomicBool,
    tick: Duration,
) -> Result<(), SynthError> {
    synth.begin_utterance(text)?;

    let deadline = Instant::now() + MAX_UTTERANCE;
    loop {
        if interrupt.load(Ordering::Relaxed) {
            let _ = synth.stop();
            return Err(SynthError::Interrupted);
        }
        match synth.is_busy() {
            Ok(false) => return Ok(()),
            Ok(true) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            let _ = synth.stop();
            return Err(SynthError::Unresponsive);
        }
        std::thread::sleep(tick);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::synth::{MockSynth, MockUtterance};
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(1);

    fn ok_factory() -> SynthFactory {
        Arc::new(|| Ok(Box::new(MockSynth::always_ok()) as Box<dyn SpeechSynth>))
    }

    /// A failing factory must surface the error from `spawn` itself.
    #[test]
    fn spawn_with_failing_factory_returns_init_error() {
        let factory: SynthFactory = Arc::new(|| Err(SynthError::Init("no audio".into())));
        let err = SpeechWorker::spawn(factory, TICK).unwrap_err();
        assert_eq!(err, SynthError::Init("no audio".into()));
    }

    /// A queued utterance must come back as a completion tagged with the
    /// same generation and index.
    #[tokio::test]
    async fn request_round_trips_generation_and_index() {
        let (worker, mut done_rx) = SpeechWorker::spawn(ok_factory(), TICK).unwrap();
        let requester = worker.requester();

        assert!(requester.request(7, 3, "สวัสดี".into()));

        let done = done_rx.recv().await.expect("completion");
        assert_eq!(done.generation, 7);
        assert_eq!(done.index, 3);
        assert!(done.result.is_ok());
    }

    /// A hanging utterance must end promptly once the worker is
    /// interrupted, and the completion must be marked as interrupted.
    #[tokio::test]
    async fn interrupt_ends_hanging_utterance() {
        let factory: SynthFactory = Arc::new(|| {
            Ok(Box::new(MockSynth::scripted(vec![MockUtterance::Hangs])) as Box<dyn SpeechSynth>)
        });
        let (worker, mut done_rx) = SpeechWorker::spawn(factory, TICK).unwrap();
        let requester = worker.requester();

        assert!(requester.request(1, 0, "stuck".into()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.interrupt();

        let done = tokio::time::timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .expect("interrupt must unblock the worker")
            .expect("completion");
        assert_eq!(done.result, Err(SynthError::Interrupted));
    }

    /// A failed utterance is reported as that request's failure, not a
    /// worker crash.
    #[tokio::test]
    async fn begin_failure_is_reported_in_completion() {
        let factory: SynthFactory = Arc::new(|| {
            Ok(
                Box::new(MockSynth::scripted(vec![MockUtterance::FailsToBegin(
                    "boom".into(),
                )])) as Box<dyn SpeechSynth>,
            )
        });
        let (worker, mut done_rx) = SpeechWorker::spawn(factory, TICK).unwrap();
        let requester = worker.requester();

        assert!(requester.request(2, 0, "x".into()));
        let done = done_rx.recv().await.expect("completion");
        assert_eq!(done.result, Err(SynthError::Utterance("boom".into())));

        // The worker survives a failed utterance; retiring it is the
        // playback controller's decision.
        assert!(worker.is_alive());
    }

    /// A dropped worker retires its thread; later requests report failure.
    #[tokio::test]
    async fn worker_retires_after_drop() {
        let (worker, done_rx) = SpeechWorker::spawn(ok_factory(), TICK).unwrap();
        let requester = worker.requester();
        drop(worker);
        drop(done_rx);

        // A request already in flight is aborted by the interrupt flag; the
        // thread then finds the completion channel closed and exits.
        let _ = requester.request(1, 0, "late".into());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!requester.request(1, 1, "later".into()));
    }

    /// Sequential utterances complete in order on one worker.
    #[tokio::test]
    async fn sequential_requests_complete_in_order() {
        let (worker, mut done_rx) = SpeechWorker::spawn(ok_factory(), TICK).unwrap();
        let requester = worker.requester();

        for i in 0..3 {
            assert!(requester.request(1, i, format!("segment {i}")));
        }
        for i in 0..3 {
            let done = done_rx.recv().await.expect("completion");
            assert_eq!(done.index, i);
        }
    }
}
