//! Read Aloud document window — egui/eframe application.
//!
//! # Architecture
//!
//! [`ReaderApp`] is the top-level [`eframe::App`]. It owns three channel
//! endpoints:
//!
//! * `command_tx`  — sends [`ReaderCommand`] to the reader orchestrator.
//! * `reader_rx`   — receives [`ReaderEvent`] (recognition failures).
//! * `playback_rx` — receives [`PlaybackEvent`] from the playback
//!   controller; every event is also fed through the [`HighlightSync`].
//!
//! The page view shows the current page image with the active-segment
//! highlight painted over it; the status bar mirrors playback progress.
//!
//! # Shortcuts
//!
//! | Key | Action |
//! |-----|--------|
//! | `F9` | Recognise the current page and read it aloud |
//! | `Escape` | Stop reading |
//! | `←` / `PageUp` | Previous page |
//! | `→` / `PageDown` | Next page |
//! | `Ctrl` `+` / `Ctrl` `-` | Zoom in / out |

use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::detect::Quad;
use crate::highlight::{HighlightState, HighlightSync, RenderSurface};
use crate::page::SharedDocument;
use crate::playback::{PlaybackEvent, PlaybackOutcome};

// ---------------------------------------------------------------------------
// Reader message types (owned by the ui module; the orchestrator in main
// imports them from here).
// ---------------------------------------------------------------------------

/// Commands sent from the UI thread to the reader orchestrator.
#[derive(Debug, Clone)]
pub enum ReaderCommand {
    /// Render the current page, detect its text, and start reading.
    ReadCurrentPage,
    /// Cancel the in-flight recognition/playback.
    StopReading,
}

/// Events delivered from the reader orchestrator to the UI.
///
/// Playback progress arrives separately as [`PlaybackEvent`]s.
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// Page rendering or text detection failed.
    RecognitionFailed { message: String },
}

// ---------------------------------------------------------------------------
// ViewState — state shared between the UI and the highlight synchronizer
// ---------------------------------------------------------------------------

/// Page-view state: zoom factor written by the UI, highlight written by the
/// highlight synchronizer, both read at paint time.
#[derive(Debug)]
pub struct ViewState {
    pub zoom: f32,
    pub highlight: HighlightState,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            highlight: HighlightState::default(),
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to [`ViewState`].
pub type SharedView = Arc<Mutex<ViewState>>;

/// [`RenderSurface`] implementation over the shared view state.
pub struct ViewSurface {
    view: SharedView,
}

impl ViewSurface {
    pub fn new(view: SharedView) -> Self {
        Self { view }
    }
}

impl RenderSurface for ViewSurface {
    fn set_highlight(&mut self, quad: Quad) {
        self.view.lock().unwrap().highlight.active = Some(quad);
    }

    fn clear_highlight(&mut self) {
        self.view.lock().unwrap().highlight.active = None;
    }

    fn zoom_factor(&self) -> f32 {
        self.view.lock().unwrap().zoom
    }
}

// ---------------------------------------------------------------------------
// ReadingStatus — UI-side status line
// ---------------------------------------------------------------------------

/// What the status bar shows.
#[derive(Debug, Clone, PartialEq)]
enum ReadingStatus {
    Idle,
    /// Page render + text detection are running.
    Recognizing,
    /// Segment `index` of `total` is being spoken.
    Speaking { index: usize, total: usize },
    Done,
    Error(String),
}

impl ReadingStatus {
    fn is_busy(&self) -> bool {
        matches!(
            self,
            ReadingStatus::Recognizing | ReadingStatus::Speaking { .. }
        )
    }

    fn label(&self) -> String {
        match self {
            ReadingStatus::Idle => "Ready".into(),
            ReadingStatus::Recognizing => "Recognising page text…".into(),
            ReadingStatus::Speaking { index, total } => {
                format!("Reading segment {} of {}", index + 1, total)
            }
            ReadingStatus::Done => "Finished reading".into(),
            ReadingStatus::Error(message) => format!("Error: {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ReaderApp
// ---------------------------------------------------------------------------

/// Semi-transparent yellow, as in every classic read-along highlight.
const HIGHLIGHT_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(110, 101, 25, 110);

/// eframe application — the document reader window.
pub struct ReaderApp {
    // ── Collaborators ────────────────────────────────────────────────────
    doc: SharedDocument,
    highlight_sync: HighlightSync,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<ReaderCommand>,
    reader_rx: mpsc::Receiver<ReaderEvent>,
    playback_rx: mpsc::Receiver<PlaybackEvent>,

    // ── View state ───────────────────────────────────────────────────────
    view: SharedView,
    status: ReadingStatus,
    /// Segment count of the generation being played, for the status line.
    segment_total: usize,
    /// Cached texture of the current page and which page it belongs to.
    page_texture: Option<egui::TextureHandle>,
    cached_page: Option<usize>,

    // ── Configuration ────────────────────────────────────────────────────
    config: AppConfig,
}

impl ReaderApp {
    pub fn new(
        doc: SharedDocument,
        highlight_sync: HighlightSync,
        command_tx: mpsc::Sender<ReaderCommand>,
        reader_rx: mpsc::Receiver<ReaderEvent>,
        playback_rx: mpsc::Receiver<PlaybackEvent>,
        view: SharedView,
        config: AppConfig,
    ) -> Self {
        Self {
            doc,
            highlight_sync,
            command_tx,
            reader_rx,
            playback_rx,
            view,
            status: ReadingStatus::Idle,
            segment_total: 0,
            page_texture: None,
            cached_page: None,
            config,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending reader events (non-blocking).
    fn poll_reader(&mut self) {
        while let Ok(event) = self.reader_rx.try_recv() {
            match event {
                ReaderEvent::RecognitionFailed { message } => {
                    self.status = ReadingStatus::Error(message);
                }
            }
        }
    }

    /// Drain all pending playback events (non-blocking) and mirror them
    /// into the status line and the highlight.
    fn poll_playback(&mut self) {
        while let Ok(event) = self.playback_rx.try_recv() {
            self.highlight_sync.on_event(&event);

            match &event {
                PlaybackEvent::Started { sequence, .. } => {
                    self.segment_total = sequence.len();
                }
                PlaybackEvent::SegmentStarted { index, .. } => {
                    self.status = ReadingStatus::Speaking {
                        index: *index,
                        total: self.segment_total,
                    };
                }
                PlaybackEvent::SegmentFinished { .. } => {}
                PlaybackEvent::Finished { outcome, .. } => {
                    self.status = match outcome {
                        PlaybackOutcome::Completed => ReadingStatus::Done,
                        PlaybackOutcome::Stopped => ReadingStatus::Idle,
                        PlaybackOutcome::Failed(e) => ReadingStatus::Error(e.to_string()),
                    };
                }
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn read_current_page(&mut self) {
        if self.status.is_busy() {
            return;
        }
        self.status = ReadingStatus::Recognizing;
        let _ = self.command_tx.try_send(ReaderCommand::ReadCurrentPage);
    }

    fn stop_reading(&mut self) {
        let _ = self.command_tx.try_send(ReaderCommand::StopReading);
    }

    fn change_page(&mut self, forward: bool) {
        let changed = {
            let mut doc = self.doc.lock().unwrap();
            if forward {
                doc.next_page()
            } else {
                doc.prev_page()
            }
        };
        if changed {
            // Reading continues over the old page's segments until stopped;
            // turning the page only invalidates the displayed image.
            self.page_texture = None;
            self.cached_page = None;
        }
    }

    fn zoom_by(&mut self, factor: f32) {
        let mut view = self.view.lock().unwrap();
        view.zoom = (view.zoom * factor).clamp(0.2, 8.0);
    }

    // ── Keyboard shortcuts ───────────────────────────────────────────────

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let zoom_step = self.config.ui.zoom_step.max(1.01);

        if ctx.input(|i| i.key_pressed(egui::Key::F9)) {
            self.read_current_page();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.stop_reading();
        }
        if ctx.input(|i| {
            i.key_pressed(egui::Key::ArrowRight) || i.key_pressed(egui::Key::PageDown)
        }) {
            self.change_page(true);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft) || i.key_pressed(egui::Key::PageUp)) {
            self.change_page(false);
        }
        if ctx.input(|i| i.modifiers.ctrl && i.key_pressed(egui::Key::Plus)) {
            self.zoom_by(zoom_step);
        }
        if ctx.input(|i| i.modifiers.ctrl && i.key_pressed(egui::Key::Minus)) {
            self.zoom_by(1.0 / zoom_step);
        }
    }

    // ── Toolbar ──────────────────────────────────────────────────────────

    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        let zoom_step = self.config.ui.zoom_step.max(1.01);

        ui.horizontal(|ui| {
            let read = ui.add_enabled(
                !self.status.is_busy(),
                egui::Button::new("Read aloud (F9)"),
            );
            if read.clicked() {
                self.read_current_page();
            }

            if ui.button("Stop").clicked() {
                self.stop_reading();
            }

            ui.separator();

            if ui.button("Previous").clicked() {
                self.change_page(false);
            }
            if ui.button("Next").clicked() {
                self.change_page(true);
            }

            ui.separator();

            if ui.button("Zoom +").clicked() {
                self.zoom_by(zoom_step);
            }
            if ui.button("Zoom -").clicked() {
                self.zoom_by(1.0 / zoom_step);
            }
        });
    }

    // ── Page view ────────────────────────────────────────────────────────

    /// Rasterise the current page and upload it as a texture.
    fn refresh_page_texture(&mut self, ctx: &egui::Context, page: usize) {
        let rendered = {
            let doc = self.doc.lock().unwrap();
            doc.render_current_page(self.config.detect.render_dpi)
        };

        match rendered {
            Ok(image) if image.is_well_formed() => {
                let color_image = egui::ColorImage::from_rgba_unmultiplied(
                    [image.width as usize, image.height as usize],
                    &image.rgba,
                );
                self.page_texture =
                    Some(ctx.load_texture("page", color_image, egui::TextureOptions::LINEAR));
                self.cached_page = Some(page);
            }
            Ok(_) => {
                log::warn!("app: page image buffer does not match its dimensions");
                self.page_texture = None;
                self.cached_page = Some(page);
            }
            Err(e) => {
                log::debug!("app: page render unavailable: {e}");
                self.page_texture = None;
                self.cached_page = Some(page);
            }
        }
    }

    fn draw_page(&mut self, ui: &mut egui::Ui) {
        let (page_count, current) = {
            let doc = self.doc.lock().unwrap();
            (doc.page_count(), doc.current_page())
        };

        if page_count == 0 {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("No document loaded")
                        .color(egui::Color32::from_rgb(120, 120, 120))
                        .size(16.0),
                );
            });
            return;
        }

        if self.cached_page != Some(current) {
            self.refresh_page_texture(ui.ctx(), current);
        }

        let zoom = self.view.lock().unwrap().zoom;
        // The texture is rasterised at detection DPI; bring it back to the
        // base page size before applying the user zoom.
        let display_scale = zoom / self.config.detect.detect_scale();

        let Some(texture) = self.page_texture.clone() else {
            ui.centered_and_justified(|ui| {
                ui.label("The current page could not be rendered");
            });
            return;
        };

        egui::ScrollArea::both().show(ui, |ui| {
            let size = texture.size_vec2() * display_scale;
            let response = ui.add(egui::Image::new((texture.id(), size)));

            // Highlight overlay: the synchronizer already scaled the quad
            // into display space; it only needs the image origin applied.
            if let Some(quad) = self.view.lock().unwrap().highlight.active {
                let origin = response.rect.min;
                let (min, max) = quad.bounds();
                let rect = egui::Rect::from_min_max(
                    origin + egui::vec2(min.x, min.y),
                    origin + egui::vec2(max.x, max.y),
                );
                ui.painter().rect_filled(rect, 2.0, HIGHLIGHT_FILL);
            }
        });
    }

    // ── Status bar ───────────────────────────────────────────────────────

    fn draw_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(self.status.label());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (page_count, current) = {
                    let doc = self.doc.lock().unwrap();
                    (doc.page_count(), doc.current_page())
                };
                if page_count > 0 {
                    ui.label(format!("Page {} of {}", current + 1, page_count));
                }
                let zoom = self.view.lock().unwrap().zoom;
                ui.label(format!("{:.0}%", zoom * 100.0));
            });
        });
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for ReaderApp {
    /// Called every frame by eframe. Polls channels, then renders the
    /// toolbar, page view and status bar.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_reader();
        self.poll_playback();
        self.handle_shortcuts(ctx);

        // Keep polling while work is in flight; events arrive between
        // frames and only a repaint makes them visible.
        if self.status.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_page(ui);
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Read Aloud window closing");
    }
}
