//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the system speech-synthesis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Preferred voice name (substring match against the installed voices).
    ///
    /// `None` keeps the platform default voice. When the named voice is not
    /// installed the default is used and a warning is logged.
    pub voice: Option<String>,
    /// Speaking-rate multiplier: `1.0` is the backend's normal rate, `0.5`
    /// half speed, `2.0` the backend's maximum.
    pub rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Timing parameters of the segment playback loop.
///
/// The per-segment timeout is `poll_interval_ms × max_polls`
/// (30 s with the defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How often the coordinator re-checks the stop flag while waiting for
    /// an utterance to complete, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of poll intervals to wait for one utterance before the
    /// segment is reported as timed out.
    pub max_polls: u32,
    /// Pause between two adjacent segments, in milliseconds.
    pub inter_segment_pause_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_polls: 300,
            inter_segment_pause_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// DetectConfig
// ---------------------------------------------------------------------------

/// Settings for the text-detection pass and the reading-order sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectConfig {
    /// Detected lines below this confidence are discarded (0.0 – 1.0).
    pub confidence_threshold: f32,
    /// Height of one reading-order row bucket, in detector coordinate units.
    pub row_height: f32,
    /// DPI at which the page is rasterised for detection.
    pub render_dpi: u32,
    /// Base DPI of the document coordinate space.
    pub base_dpi: u32,
}

impl DetectConfig {
    /// Ratio between detector coordinate space and the base page space.
    ///
    /// Highlight scaling divides the display zoom factor by this value.
    pub fn detect_scale(&self) -> f32 {
        if self.base_dpi == 0 {
            return 1.0;
        }
        self.render_dpi as f32 / self.base_dpi as f32
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            row_height: 20.0,
            render_dpi: 144,
            base_dpi: 72,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance and page-view behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Last saved window size `(w, h)` in logical pixels.  `None` means let
    /// the OS / window manager pick a size on first launch.
    pub window_size: Option<(f32, f32)>,
    /// Multiplier applied per zoom-in step (zoom-out uses its inverse).
    pub zoom_step: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: None,
            zoom_step: 1.2,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use read_aloud::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Speech backend settings.
    pub speech: SpeechConfig,
    /// Playback loop timing.
    pub playback: PlaybackConfig,
    /// Text detection / reading-order settings.
    pub detect: DetectConfig,
    /// Window / page-view settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
