//! Playback coordinator — drives the segment-by-segment reading loop.
//!
//! [`PlaybackController`] owns the speech worker and responds to
//! [`PlaybackCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Session flow
//!
//! ```text
//! PlaybackCommand::Start { sequence }
//!   ├─▶ supersede: stop flag, interrupt worker, await old session,
//!   │              force-respawn the speech worker
//!   └─▶ spawn run_session (new generation)
//!          │ per segment i:
//!          │   emit SegmentStarted(gen, i)
//!          │   hand (gen, i, text) to the worker     [non-blocking]
//!          │   bounded wait on the completion channel
//!          │   emit SegmentFinished(gen, i), brief pause
//!          └─ exactly one Finished(gen, outcome) on exit
//!
//! PlaybackCommand::Stop
//!   └─▶ set the session's stop flag + interrupt the worker;
//!       observed within one poll interval
//! ```
//!
//! The controller never calls the speech resource itself — it hands
//! requests to the worker thread and waits on a completion channel with a
//! bounded, fixed-interval timeout. Completions tagged with a superseded
//! generation are drained and ignored, so stale work can never corrupt the
//! live session.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::PlaybackConfig;
use crate::reading::segment::{SegmentSequence, SharedSequence};
use crate::speech::{SpeechDone, SpeechRequester, SpeechWorker, SynthError, SynthFactory};

use super::session::{PlaybackSession, PlaybackStatus, StopHandle};

/// How long a superseded session may take to acknowledge its stop flag.
/// The wait loop re-checks the flag every poll interval, so in practice
/// this is never reached.
const RETIRE_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Commands sent from the UI layer to the playback controller.
#[derive(Debug)]
pub enum PlaybackCommand {
    /// Begin a new generation, superseding any in-flight one.
    Start { sequence: SegmentSequence },
    /// Request cancellation of the current generation.
    Stop,
}

/// Lifecycle notifications delivered to the UI layer.
///
/// Per generation the trace is: one `Started`, then
/// `SegmentStarted`/`SegmentFinished` pairs in ascending index order, then
/// exactly one terminal `Finished` — always the generation's last event.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// A new generation began. Carries the sequence so consumers (the
    /// highlight synchronizer) can resolve segment polygons.
    Started {
        generation: u64,
        sequence: SharedSequence,
    },
    /// Segment `index` is about to be spoken.
    SegmentStarted { generation: u64, index: usize },
    /// Segment `index` finished playing.
    SegmentFinished { generation: u64, index: usize },
    /// Terminal notification of a generation.
    Finished {
        generation: u64,
        outcome: PlaybackOutcome,
    },
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every segment played to the end.
    Completed,
    /// Cancelled by a stop request or by a newer generation.
    Stopped,
    /// Aborted on a resource failure or timeout.
    Failed(PlaybackError),
}

/// Reasons a generation can fail.
///
/// A broken resource is not trusted mid-sequence: playback aborts instead
/// of skipping to the next segment, and the worker is reinitialised before
/// any future generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The speech backend could not be (re)initialised.
    #[error("speech resource failed to initialise: {0}")]
    ResourceInit(String),

    /// One utterance failed.
    #[error("segment {index} failed: {message}")]
    Segment { index: usize, message: String },

    /// No completion arrived within the bounded wait.
    #[error("segment {index} timed out waiting for speech completion")]
    SegmentTimeout { index: usize },

    /// The worker thread went away mid-session.
    #[error("speech worker channel closed unexpectedly")]
    WorkerGone,

    /// The session task itself died.
    #[error("playback task failed: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// PlaybackTiming
// ---------------------------------------------------------------------------

/// Timing parameters of the playback loop, as [`Duration`]s.
#[derive(Debug, Clone)]
pub struct PlaybackTiming {
    /// Stop-flag re-check interval while waiting for a completion.
    pub poll_interval: Duration,
    /// Per-segment wait budget, in poll intervals.
    pub max_polls: u32,
    /// Pause between adjacent segments.
    pub inter_segment_pause: Duration,
    /// Poll interval of the worker's utterance wait loop.
    pub worker_tick: Duration,
}

impl PlaybackTiming {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            inter_segment_pause: Duration::from_millis(config.inter_segment_pause_ms),
            ..Self::default()
        }
    }
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_polls: 300,
            inter_segment_pause: Duration::from_millis(100),
            worker_tick: Duration::from_millis(25),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

/// A session task in flight.
struct RunningSession {
    generation: u64,
    handle: JoinHandle<(PlaybackOutcome, mpsc::Receiver<SpeechDone>)>,
    stop: StopHandle,
}

/// One step of the controller loop.
enum Step {
    SessionExit(
        u64,
        Result<(PlaybackOutcome, mpsc::Receiver<SpeechDone>), JoinError>,
    ),
    Command(Option<PlaybackCommand>),
}

/// Drives playback generations. Create with [`PlaybackController::new`],
/// then call [`run`](Self::run) inside a tokio task.
pub struct PlaybackController {
    factory: SynthFactory,
    events_tx: mpsc::Sender<PlaybackEvent>,
    timing: PlaybackTiming,
    next_generation: u64,
    worker: Option<SpeechWorker>,
    /// Completion receiver of the current worker; `None` while loaned to a
    /// session task.
    worker_rx: Option<mpsc::Receiver<SpeechDone>>,
    session: Option<RunningSession>,
}

impl PlaybackController {
    /// Create a new controller.
    ///
    /// The speech worker is spawned lazily on the first `Start`, so a fatal
    /// backend failure surfaces as that generation's
    /// `Finished(Failed(ResourceInit))` instead of at construction time.
    pub fn new(
        factory: SynthFactory,
        events_tx: mpsc::Sender<PlaybackEvent>,
        timing: PlaybackTiming,
    ) -> Self {
        Self {
            factory,
            events_tx,
            timing,
            next_generation: 1,
            worker: None,
            worker_rx: None,
            session: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the controller until `command_rx` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`. It stays responsive to commands while a session is in
    /// flight.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<PlaybackCommand>) {
        loop {
            let step = match self.session.take() {
                Some(mut running) => {
                    let step = tokio::select! {
                        joined = &mut running.handle => {
                            Step::SessionExit(running.generation, joined)
                        }
                        cmd = command_rx.recv() => Step::Command(cmd),
                    };
                    if matches!(&step, Step::Command(_)) {
                        self.session = Some(running);
                    }
                    step
                }
                None => Step::Command(command_rx.recv().await),
            };

            match step {
                Step::SessionExit(generation, joined) => {
                    self.on_session_exit(generation, joined, false).await;
                }
                Step::Command(Some(PlaybackCommand::Start { sequence })) => {
                    self.start_playback(sequence).await;
                }
                Step::Command(Some(PlaybackCommand::Stop)) => {
                    self.request_stop();
                }
                Step::Command(None) => break,
            }
        }

        // Command channel closed — retire any in-flight generation first.
        self.retire_session().await;
        log::info!("playback: command channel closed, controller shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Begin a new generation, superseding any in-flight one.
    async fn start_playback(&mut self, sequence: SegmentSequence) {
        let generation = self.next_generation;
        self.next_generation += 1;

        // The old generation must reach its terminal state before the new
        // one may issue any request against the resource.
        self.retire_session().await;

        // A worker that was stopped, timed out, failed or died is replaced
        // by a fresh handle — including a fresh self-test — before the new
        // generation starts.
        if let Err(e) = self.ensure_worker().await {
            log::error!("playback: speech resource unavailable: {e}");
            let _ = self
                .events_tx
                .send(PlaybackEvent::Finished {
                    generation,
                    outcome: PlaybackOutcome::Failed(PlaybackError::ResourceInit(e.to_string())),
                })
                .await;
            return;
        }

        let (requester, mut done_rx) = match (self.worker.as_ref(), self.worker_rx.take()) {
            (Some(worker), Some(done_rx)) => (worker.requester(), done_rx),
            _ => {
                let _ = self
                    .events_tx
                    .send(PlaybackEvent::Finished {
                        generation,
                        outcome: PlaybackOutcome::Failed(PlaybackError::ResourceInit(
                            "speech worker unavailable".into(),
                        )),
                    })
                    .await;
                return;
            }
        };

        // Drain completions left over from earlier generations.
        while let Ok(stale) = done_rx.try_recv() {
            log::debug!(
                "playback: discarding stale completion (generation {}, segment {})",
                stale.generation,
                stale.index
            );
        }

        let session = PlaybackSession::new(generation, Arc::new(sequence));
        let stop = session.stop_handle();
        let events_tx = self.events_tx.clone();
        let timing = self.timing.clone();

        let handle =
            tokio::spawn(async move { run_session(session, requester, done_rx, events_tx, timing).await });

        self.session = Some(RunningSession {
            generation,
            handle,
            stop,
        });
    }

    /// Cancel the current generation, if any.
    fn request_stop(&mut self) {
        match &self.session {
            Some(running) => {
                running.stop.request_stop();
                if let Some(worker) = &self.worker {
                    worker.interrupt();
                }
            }
            None => log::debug!("playback: stop with no active generation"),
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Stop the in-flight session and wait (bounded) for its loop to exit.
    ///
    /// The worker is always discarded afterwards: an interrupted handle —
    /// even one whose last utterance happened to complete — is rebuilt
    /// before it is used again.
    async fn retire_session(&mut self) {
        let Some(mut running) = self.session.take() else {
            return;
        };

        log::debug!("playback: retiring generation {}", running.generation);
        running.stop.request_stop();
        if let Some(worker) = &self.worker {
            worker.interrupt();
        }

        match tokio::time::timeout(RETIRE_GRACE, &mut running.handle).await {
            Ok(joined) => self.on_session_exit(running.generation, joined, true).await,
            Err(_) => {
                log::error!(
                    "playback: generation {} did not exit within the grace period",
                    running.generation
                );
                running.handle.abort();
                self.discard_worker();
            }
        }
    }

    /// Bookkeeping once a session task has ended.
    ///
    /// `retired` marks sessions that were interrupted by the controller —
    /// their worker is tainted regardless of the reported outcome.
    async fn on_session_exit(
        &mut self,
        generation: u64,
        joined: Result<(PlaybackOutcome, mpsc::Receiver<SpeechDone>), JoinError>,
        retired: bool,
    ) {
        match joined {
            Ok((outcome, done_rx)) => {
                log::info!("playback: generation {generation} ended: {outcome:?}");
                if outcome == PlaybackOutcome::Completed && !retired {
                    self.worker_rx = Some(done_rx);
                } else {
                    self.discard_worker();
                }
            }
            Err(e) => {
                log::error!("playback: generation {generation} task failed: {e}");
                self.discard_worker();
                // The session died before its terminal notification.
                let _ = self
                    .events_tx
                    .send(PlaybackEvent::Finished {
                        generation,
                        outcome: PlaybackOutcome::Failed(PlaybackError::Internal(e.to_string())),
                    })
                    .await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Worker lifecycle
    // -----------------------------------------------------------------------

    /// Cheap liveness probe over the current worker; respawn on failure.
    ///
    /// Spawning includes the backend self-test, which blocks — it runs on
    /// the blocking thread pool so the controller stays responsive.
    async fn ensure_worker(&mut self) -> Result<(), SynthError> {
        let healthy = self.worker.as_ref().is_some_and(|w| w.is_alive()) && self.worker_rx.is_some();
        if healthy {
            return Ok(());
        }

        self.discard_worker();
        log::debug!("playback: spawning fresh speech worker");
        let factory = Arc::clone(&self.factory);
        let tick = self.timing.worker_tick;
        let (worker, done_rx) = tokio::task::spawn_blocking(move || SpeechWorker::spawn(factory, tick))
            .await
            .map_err(|e| SynthError::Init(format!("worker spawn task failed: {e}")))??;
        self.worker = Some(worker);
        self.worker_rx = Some(done_rx);
        Ok(())
    }

    fn discard_worker(&mut self) {
        self.worker = None;
        self.worker_rx = None;
    }
}

// ---------------------------------------------------------------------------
// run_session — the per-generation loop
// ---------------------------------------------------------------------------

/// Walk the sequence, one utterance at a time.
///
/// Returns the outcome together with the completion receiver so the
/// controller can hand the channel to the next generation when the worker
/// survives.
async fn run_session(
    mut session: PlaybackSession,
    requester: SpeechRequester,
    mut done_rx: mpsc::Receiver<SpeechDone>,
    events_tx: mpsc::Sender<PlaybackEvent>,
    timing: PlaybackTiming,
) -> (PlaybackOutcome, mpsc::Receiver<SpeechDone>) {
    let generation = session.generation;
    let total = session.sequence().len();

    let _ = events_tx
        .send(PlaybackEvent::Started {
            generation,
            sequence: Arc::clone(session.sequence()),
        })
        .await;
    log::info!("playback: generation {generation} started ({total} segments)");

    let mut outcome = PlaybackOutcome::Completed;

    for index in 0..total {
        if session.stop_requested() {
            session.status = PlaybackStatus::Stopping;
            outcome = PlaybackOutcome::Stopped;
            break;
        }

        session.status = PlaybackStatus::Speaking;
        session.current_index = index;

        let Some(segment) = session.sequence().get(index) else {
            break;
        };
        let text = segment.text.clone();

        let _ = events_tx
            .send(PlaybackEvent::SegmentStarted { generation, index })
            .await;

        if !requester.request(generation, index, text) {
            outcome = PlaybackOutcome::Failed(PlaybackError::WorkerGone);
            break;
        }

        match wait_for_completion(&session, index, &mut done_rx, &timing).await {
            Wait::Done => {
                let _ = events_tx
                    .send(PlaybackEvent::SegmentFinished { generation, index })
                    .await;
            }
            Wait::Stopped => {
                outcome = PlaybackOutcome::Stopped;
                break;
            }
            Wait::Failed(message) => {
                outcome = PlaybackOutcome::Failed(PlaybackError::Segment { index, message });
                break;
            }
            Wait::TimedOut => {
                outcome = PlaybackOutcome::Failed(PlaybackError::SegmentTimeout { index });
                break;
            }
            Wait::ChannelClosed => {
                outcome = PlaybackOutcome::Failed(PlaybackError::WorkerGone);
                break;
            }
        }

        // Brief pause so adjacent segments do not run into each other.
        if index + 1 < total {
            tokio::time::sleep(timing.inter_segment_pause).await;
        }
    }

    session.status = match &outcome {
        PlaybackOutcome::Completed | PlaybackOutcome::Stopped => PlaybackStatus::Done,
        PlaybackOutcome::Failed(_) => PlaybackStatus::Failed,
    };

    let _ = events_tx
        .send(PlaybackEvent::Finished {
            generation,
            outcome: outcome.clone(),
        })
        .await;

    (outcome, done_rx)
}

/// Outcome of one bounded completion wait.
enum Wait {
    Done,
    Stopped,
    Failed(String),
    TimedOut,
    ChannelClosed,
}

/// Wait for segment `index` of the session's generation to complete.
///
/// The stop flag is re-checked every poll interval; completions from other
/// generations (or other indices) are drained and ignored. The wait is
/// bounded by `max_polls` intervals.
async fn wait_for_completion(
    session: &PlaybackSession,
    index: usize,
    done_rx: &mut mpsc::Receiver<SpeechDone>,
    timing: &PlaybackTiming,
) -> Wait {
    let mut polls: u32 = 0;
    loop {
        if session.stop_requested() {
            return Wait::Stopped;
        }

        match tokio::time::timeout(timing.poll_interval, done_rx.recv()).await {
            Ok(Some(done)) => {
                if done.generation != session.generation || done.index != index {
                    // Superseded generation: acknowledged by draining it,
                    // otherwise inert.
                    log::debug!(
                        "playback: ignoring stale completion (generation {}, segment {})",
                        done.generation,
                        done.index
                    );
                    continue;
                }
                return match done.result {
                    Ok(()) => Wait::Done,
                    Err(SynthError::Interrupted) => Wait::Stopped,
                    Err(e) => Wait::Failed(e.to_string()),
                };
            }
            Ok(None) => return Wait::ChannelClosed,
            Err(_) => {
                polls += 1;
                if polls >= timing.max_polls {
                    return Wait::TimedOut;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectedLine, Quad};
    use crate::reading::{SegmentSequence, SortOptions};
    use crate::speech::{MockSynth, MockUtterance, SpeechSynth};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn test_timing() -> PlaybackTiming {
        PlaybackTiming {
            poll_interval: Duration::from_millis(10),
            max_polls: 10,
            inter_segment_pause: Duration::from_millis(1),
            worker_tick: Duration::from_millis(1),
        }
    }

    fn sequence_of(texts: &[&str]) -> SegmentSequence {
        let lines = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                DetectedLine::new(Quad::from_rect(0.0, i as f32 * 30.0, 100.0, 20.0), *t, 0.9)
            })
            .collect();
        SegmentSequence::from_lines(lines, &SortOptions::default())
    }

    fn ok_factory() -> SynthFactory {
        Arc::new(|| Ok(Box::new(MockSynth::always_ok()) as Box<dyn SpeechSynth>))
    }

    /// Factory that yields a differently scripted synth per spawn.
    fn scripted_factory(scripts: Vec<Vec<MockUtterance>>) -> SynthFactory {
        let scripts = Arc::new(scripts);
        let calls = Arc::new(AtomicUsize::new(0));
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let script = scripts.get(n).cloned().unwrap_or_default();
            Ok(Box::new(MockSynth::scripted(script)) as Box<dyn SpeechSynth>)
        })
    }

    fn spawn_controller(
        factory: SynthFactory,
    ) -> (
        mpsc::Sender<PlaybackCommand>,
        mpsc::Receiver<PlaybackEvent>,
        JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(64);
        let controller = PlaybackController::new(factory, events_tx, test_timing());
        let handle = tokio::spawn(controller.run(cmd_rx));
        (cmd_tx, events_rx, handle)
    }

    async fn next_event(rx: &mut mpsc::Receiver<PlaybackEvent>) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a playback event")
            .expect("event channel closed")
    }

    /// Collect events up to and including the next `Finished`.
    async fn collect_generation(rx: &mut mpsc::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            let done = matches!(&event, PlaybackEvent::Finished { .. });
            events.push(event);
            if done {
                return events;
            }
        }
    }

    /// Compact trace representation for assertions.
    fn trace(events: &[PlaybackEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                PlaybackEvent::Started { .. } => "started".into(),
                PlaybackEvent::SegmentStarted { index, .. } => format!("s{index}"),
                PlaybackEvent::SegmentFinished { index, .. } => format!("f{index}"),
                PlaybackEvent::Finished { outcome, .. } => match outcome {
                    PlaybackOutcome::Completed => "finished:completed".into(),
                    PlaybackOutcome::Stopped => "finished:stopped".into(),
                    PlaybackOutcome::Failed(_) => "finished:failed".into(),
                },
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Three segments played without cancellation produce the exact
    /// notification trace, ending in `Finished(Completed)`.
    #[tokio::test]
    async fn full_trace_for_three_segments() {
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(ok_factory());

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["第一段", "第二段", "第三段"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(
            trace(&events),
            ["started", "s0", "f0", "s1", "f1", "s2", "f2", "finished:completed"]
        );
    }

    /// An empty sequence is not an error: it completes immediately with
    /// zero segment notifications.
    #[tokio::test]
    async fn empty_sequence_completes_immediately() {
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(ok_factory());

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: SegmentSequence::empty(),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "finished:completed"]);
    }

    /// A fatal backend initialisation means no segment is ever announced;
    /// the failure surfaces as the generation's terminal notification.
    #[tokio::test]
    async fn fatal_init_emits_no_segment_events() {
        let factory: SynthFactory = Arc::new(|| Err(SynthError::Init("no audio stack".into())));
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(factory);

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["unreachable"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlaybackEvent::Finished { outcome, .. } => {
                assert!(matches!(
                    outcome,
                    PlaybackOutcome::Failed(PlaybackError::ResourceInit(_))
                ));
            }
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    /// Stopping while segment 1 is playing ends the trace at
    /// `Finished(Stopped)` with no segment index beyond 1.
    #[tokio::test]
    async fn stop_during_second_segment() {
        let factory = scripted_factory(vec![vec![
            MockUtterance::Completes { polls: 1 },
            MockUtterance::Hangs,
        ]]);
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(factory);

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["one", "two", "three"]),
            })
            .await
            .unwrap();

        // Read through segmentStarted(1), then stop.
        let mut events = Vec::new();
        loop {
            let event = next_event(&mut events_rx).await;
            let at_second = matches!(&event, PlaybackEvent::SegmentStarted { index: 1, .. });
            events.push(event);
            if at_second {
                break;
            }
        }
        cmd_tx.send(PlaybackCommand::Stop).await.unwrap();

        loop {
            let event = next_event(&mut events_rx).await;
            let done = matches!(&event, PlaybackEvent::Finished { .. });
            events.push(event);
            if done {
                break;
            }
        }

        assert_eq!(trace(&events), ["started", "s0", "f0", "s1", "finished:stopped"]);
    }

    /// A segment whose completion never arrives within the bounded wait
    /// fails the generation with a timeout; the next generation gets a
    /// fresh resource and plays normally.
    #[tokio::test]
    async fn timeout_fails_generation_and_reinit_allows_next() {
        let factory = scripted_factory(vec![
            vec![MockUtterance::Completes { polls: 1 }, MockUtterance::Hangs],
            Vec::new(), // second spawn: everything completes
        ]);
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(factory);

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["ok", "stuck"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "s0", "f0", "s1", "finished:failed"]);
        match events.last() {
            Some(PlaybackEvent::Finished { outcome, .. }) => {
                assert_eq!(
                    *outcome,
                    PlaybackOutcome::Failed(PlaybackError::SegmentTimeout { index: 1 })
                );
            }
            other => panic!("expected Finished, got {other:?}"),
        }

        // The worker was reinitialised; a new generation plays through.
        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["fresh"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "s0", "f0", "finished:completed"]);
    }

    /// A failed utterance aborts the generation — no skipping ahead.
    #[tokio::test]
    async fn utterance_failure_aborts_generation() {
        let factory = scripted_factory(vec![vec![
            MockUtterance::Completes { polls: 1 },
            MockUtterance::FailsToBegin("synth died".into()),
        ]]);
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(factory);

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["one", "two", "three"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "s0", "f0", "s1", "finished:failed"]);
        match events.last() {
            Some(PlaybackEvent::Finished {
                outcome: PlaybackOutcome::Failed(PlaybackError::Segment { index, message }),
                ..
            }) => {
                assert_eq!(*index, 1);
                assert!(message.contains("synth died"));
            }
            other => panic!("expected segment failure, got {other:?}"),
        }
    }

    /// Starting a new generation mid-flight fully retires the old one:
    /// its terminal notification appears before the new generation's first
    /// event, and no old-generation event follows.
    #[tokio::test]
    async fn new_start_supersedes_in_flight_generation() {
        let factory = scripted_factory(vec![
            vec![MockUtterance::Hangs],
            Vec::new(), // replacement worker after the supersede
        ]);
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(factory);

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["slow"]),
            })
            .await
            .unwrap();

        // Wait until the first generation is mid-segment.
        let mut seen = Vec::new();
        loop {
            let event = next_event(&mut events_rx).await;
            let speaking = matches!(&event, PlaybackEvent::SegmentStarted { index: 0, .. });
            seen.push(event);
            if speaking {
                break;
            }
        }

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["next"]),
            })
            .await
            .unwrap();

        // Old generation must finish (Stopped) before the new one starts.
        let old_finish = next_event(&mut events_rx).await;
        let old_generation = match old_finish {
            PlaybackEvent::Finished {
                generation,
                outcome: PlaybackOutcome::Stopped,
            } => generation,
            other => panic!("expected old generation Finished(Stopped), got {other:?}"),
        };

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "s0", "f0", "finished:completed"]);
        for event in &events {
            let generation = match event {
                PlaybackEvent::Started { generation, .. }
                | PlaybackEvent::SegmentStarted { generation, .. }
                | PlaybackEvent::SegmentFinished { generation, .. }
                | PlaybackEvent::Finished { generation, .. } => *generation,
            };
            assert!(generation > old_generation, "stale event after supersede");
        }
    }

    /// Stop without an active session is a no-op; playback still works
    /// afterwards.
    #[tokio::test]
    async fn stop_without_session_is_inert() {
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(ok_factory());

        cmd_tx.send(PlaybackCommand::Stop).await.unwrap();
        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["still works"]),
            })
            .await
            .unwrap();

        let events = collect_generation(&mut events_rx).await;
        assert_eq!(trace(&events), ["started", "s0", "f0", "finished:completed"]);
    }

    /// Generation ids increase monotonically across starts.
    #[tokio::test]
    async fn generations_are_monotonic() {
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(ok_factory());

        let mut last_generation = 0;
        for text in ["a", "b", "c"] {
            cmd_tx
                .send(PlaybackCommand::Start {
                    sequence: sequence_of(&[text]),
                })
                .await
                .unwrap();
            let events = collect_generation(&mut events_rx).await;
            let generation = match &events[0] {
                PlaybackEvent::Started { generation, .. } => *generation,
                other => panic!("expected Started, got {other:?}"),
            };
            assert!(generation > last_generation);
            last_generation = generation;
        }
    }

    /// The `Started` event carries the sequence it will play.
    #[tokio::test]
    async fn started_event_carries_sequence() {
        let (cmd_tx, mut events_rx, _controller) = spawn_controller(ok_factory());

        cmd_tx
            .send(PlaybackCommand::Start {
                sequence: sequence_of(&["alpha", "beta"]),
            })
            .await
            .unwrap();

        match next_event(&mut events_rx).await {
            PlaybackEvent::Started { sequence, .. } => {
                assert_eq!(sequence.len(), 2);
                assert_eq!(sequence.get(0).unwrap().text, "alpha");
            }
            other => panic!("expected Started, got {other:?}"),
        }
    }
}
