//! Application entry point — Read Aloud.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Create the playback and reader channels.
//! 5. Spawn the playback controller on the tokio runtime.
//! 6. Spawn the reader orchestrator (render → detect → sort → start).
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.
//!
//! The document backend and the text-detection backend are external
//! collaborators. This build wires stub implementations that surface an
//! explanatory error, so the app launches and the speech pipeline can be
//! exercised even before real backends are plugged in.

use std::sync::{Arc, Mutex};

use read_aloud::{
    app::{ReaderApp, ReaderCommand, ReaderEvent, ViewState, ViewSurface},
    config::AppConfig,
    detect::{DetectError, DetectedLine, TextDetector},
    highlight::HighlightSync,
    page::{PageError, PageImage, PageProvider, SharedDocument},
    playback::{PlaybackCommand, PlaybackController, PlaybackTiming},
    reading::{SegmentSequence, SortOptions},
    speech::{SpeechSynth, SynthFactory, SystemSynth},
};
use tokio::sync::mpsc;

use eframe::egui;

// ---------------------------------------------------------------------------
// Reader orchestrator
// ---------------------------------------------------------------------------

/// One recognition pass per [`ReaderCommand::ReadCurrentPage`]: rasterise
/// the page, detect its text, sort into reading order, then hand the
/// sequence to the playback controller. Both collaborator calls are
/// blocking and run on the tokio blocking pool.
async fn run_reader(
    doc: SharedDocument,
    detector: Arc<dyn TextDetector>,
    config: AppConfig,
    playback_tx: mpsc::Sender<PlaybackCommand>,
    event_tx: mpsc::Sender<ReaderEvent>,
    mut command_rx: mpsc::Receiver<ReaderCommand>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            ReaderCommand::ReadCurrentPage => {
                // --- Render the current page ------------------------------
                let doc_clone = Arc::clone(&doc);
                let dpi = config.detect.render_dpi;
                let rendered = tokio::task::spawn_blocking(move || {
                    doc_clone.lock().unwrap().render_current_page(dpi)
                })
                .await;

                let image = match rendered {
                    Ok(Ok(image)) => image,
                    Ok(Err(e)) => {
                        let _ = event_tx
                            .send(ReaderEvent::RecognitionFailed {
                                message: e.to_string(),
                            })
                            .await;
                        continue;
                    }
                    Err(e) => {
                        let _ = event_tx
                            .send(ReaderEvent::RecognitionFailed {
                                message: format!("page render task failed: {e}"),
                            })
                            .await;
                        continue;
                    }
                };

                // --- Detect text ------------------------------------------
                let detector_clone = Arc::clone(&detector);
                let detected =
                    tokio::task::spawn_blocking(move || detector_clone.detect(&image)).await;

                let lines = match detected {
                    Ok(Ok(lines)) => lines,
                    Ok(Err(e)) => {
                        let _ = event_tx
                            .send(ReaderEvent::RecognitionFailed {
                                message: e.to_string(),
                            })
                            .await;
                        continue;
                    }
                    Err(e) => {
                        let _ = event_tx
                            .send(ReaderEvent::RecognitionFailed {
                                message: format!("detection task failed: {e}"),
                            })
                            .await;
                        continue;
                    }
                };

                log::info!("reader: detected {} text lines", lines.len());

                // --- Sort into reading order and start playback -----------
                let opts = SortOptions {
                    confidence_threshold: config.detect.confidence_threshold,
                    row_height: config.detect.row_height,
                };
                let sequence = SegmentSequence::from_lines(lines, &opts);

                let _ = playback_tx
                    .send(PlaybackCommand::Start { sequence })
                    .await;
            }

            ReaderCommand::StopReading => {
                let _ = playback_tx.send(PlaybackCommand::Stop).await;
            }
        }
    }

    log::info!("reader: command channel closed, orchestrator shutting down");
}

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let size = config.ui.window_size.unwrap_or((960.0, 720.0));

    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([size.0, size.1])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Read Aloud starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads — playback + recognition)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Channel setup
    let (reader_tx, reader_rx) = mpsc::channel::<ReaderCommand>(16);
    let (reader_event_tx, reader_event_rx) = mpsc::channel::<ReaderEvent>(16);
    let (playback_tx, playback_rx) = mpsc::channel::<PlaybackCommand>(16);
    let (events_tx, events_rx) = mpsc::channel(32);

    // 5. Playback controller on the tokio runtime. The speech handle is
    //    created lazily (and re-created after every stop or failure) by
    //    this factory.
    let speech_config = config.speech.clone();
    let factory: SynthFactory = Arc::new(move || {
        SystemSynth::new(&speech_config).map(|s| Box::new(s) as Box<dyn SpeechSynth>)
    });

    let controller = PlaybackController::new(
        factory,
        events_tx,
        PlaybackTiming::from_config(&config.playback),
    );
    rt.spawn(controller.run(playback_rx));

    // 6. Reader orchestrator. The document and detection backends are
    //    external collaborators — stubs below keep the app functional
    //    without them.
    let doc: SharedDocument = Arc::new(Mutex::new(UnloadedDocument));
    let detector: Arc<dyn TextDetector> = Arc::new(NoDetector);

    rt.spawn(run_reader(
        Arc::clone(&doc),
        detector,
        config.clone(),
        playback_tx,
        reader_event_tx,
        reader_rx,
    ));

    // 7. Build the egui app and run it (blocks until the window is closed)
    let view = Arc::new(Mutex::new(ViewState::new()));
    let highlight_sync = HighlightSync::new(
        Box::new(ViewSurface::new(Arc::clone(&view))),
        config.detect.detect_scale(),
    );

    let app = ReaderApp::new(
        doc,
        highlight_sync,
        reader_tx,
        reader_event_rx,
        events_rx,
        view,
        config.clone(),
    );
    let options = native_options(&config);

    eframe::run_native("Read Aloud", options, Box::new(move |_cc| Ok(Box::new(app))))
}

// ---------------------------------------------------------------------------
// UnloadedDocument — fallback PageProvider when no document backend is wired
// ---------------------------------------------------------------------------

struct UnloadedDocument;

impl PageProvider for UnloadedDocument {
    fn render_current_page(&self, _dpi: u32) -> Result<PageImage, PageError> {
        Err(PageError::NoDocument(
            "no document backend is wired into this build".into(),
        ))
    }

    fn page_count(&self) -> usize {
        0
    }

    fn current_page(&self) -> usize {
        0
    }

    fn next_page(&mut self) -> bool {
        false
    }

    fn prev_page(&mut self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// NoDetector — fallback TextDetector when no detection backend is wired
// ---------------------------------------------------------------------------

struct NoDetector;

impl TextDetector for NoDetector {
    fn detect(&self, _image: &PageImage) -> Result<Vec<DetectedLine>, DetectError> {
        Err(DetectError::Unavailable(
            "no text-detection backend is wired into this build".into(),
        ))
    }
}
