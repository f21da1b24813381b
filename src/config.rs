//! Configuration: file-backed settings and the active pipeline configuration.
//!
//! `Settings` is discovered with the prefer crate and parsed by extension.
//! `PipelineConfig` is the pure-data view the preprocessing engine and attempt
//! ladder consume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::OutputFormat;
use crate::presets::{preset, ImageOptions, Languages, Preset, PresetId, SegmentationMode};
use crate::text::TextOptions;

/// Errors from config loading and knob validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{knob} must be within {min}..={max}, got {value}")]
    OutOfRange {
        knob: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

pub const SCALE_RANGE: (f32, f32) = (1.6, 3.5);
pub const CONTRAST_RANGE: (f32, f32) = (0.8, 1.6);
pub const SHARPEN_RANGE: (f32, f32) = (0.0, 1.0);
pub const TIMEOUT_RANGE_SECS: (u64, u64) = (20, 300);

/// A single user-adjustable setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Knob {
    Languages(Languages),
    Segmentation(u8),
    Grayscale(bool),
    Binarize(bool),
    Scale(f32),
    Contrast(f32),
    Sharpen(f32),
    Timeout(Duration),
}

fn check_range(knob: &'static str, value: f32, (min, max): (f32, f32)) -> Result<f32, ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            knob,
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        })
    }
}

/// The active configuration.
///
/// Selecting a preset replaces every knob at once. Overriding one knob keeps the
/// others, demotes the selection to [`PresetId::Custom`], and leaves runtime
/// strategies (budgets, ladder, concurrency) with the last selected preset.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    selection: PresetId,
    profile: PresetId,
    pub options: ImageOptions,
    pub timeout: Duration,
}

impl PipelineConfig {
    pub fn new(id: PresetId) -> Self {
        let entry = preset(id);
        Self {
            selection: id,
            profile: id,
            options: entry.defaults,
            timeout: entry.timeout,
        }
    }

    pub fn select_preset(&mut self, id: PresetId) {
        *self = Self::new(id);
    }

    /// Validate and apply one knob, demoting the selection to custom.
    pub fn override_knob(&mut self, knob: Knob) -> Result<(), ConfigError> {
        match knob {
            Knob::Languages(languages) => self.options.languages = languages,
            Knob::Segmentation(mode) => {
                self.options.segmentation =
                    SegmentationMode::try_from(mode).map_err(ConfigError::Invalid)?;
            }
            Knob::Grayscale(on) => self.options.grayscale = on,
            Knob::Binarize(on) => self.options.binarize = on,
            Knob::Scale(v) => self.options.scale = check_range("scale", v, SCALE_RANGE)?,
            Knob::Contrast(v) => self.options.contrast = check_range("contrast", v, CONTRAST_RANGE)?,
            Knob::Sharpen(v) => self.options.sharpen = check_range("sharpen", v, SHARPEN_RANGE)?,
            Knob::Timeout(t) => {
                let (min, max) = TIMEOUT_RANGE_SECS;
                if t < Duration::from_secs(min) || t > Duration::from_secs(max) {
                    return Err(ConfigError::OutOfRange {
                        knob: "timeout",
                        value: t.as_secs_f64(),
                        min: min as f64,
                        max: max as f64,
                    });
                }
                self.timeout = t;
            }
        }
        self.selection = PresetId::Custom;
        Ok(())
    }

    /// What the user has selected; `Custom` after any override.
    pub fn selection(&self) -> PresetId {
        self.selection
    }

    /// The registry entry whose budgets, ladder and concurrency apply.
    pub fn preset(&self) -> &'static Preset {
        preset(self.profile)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(PresetId::default())
    }
}

/// Tesseract location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSettings {
    /// Binary path; `tesseract` from PATH when unset.
    pub binary: Option<String>,
    /// Language data directory passed as `--tessdata-dir`.
    pub data_dir: Option<String>,
}

/// Settings loaded from a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub preset: PresetId,
    pub tesseract: TesseractSettings,
    /// Directory containing pdfinfo/pdftoppm/pdftotext, when not on PATH.
    pub poppler_dir: Option<String>,
    pub text: TextOptions,
    pub output: OutputFormat,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn expand(path: &Option<String>) -> Option<PathBuf> {
    path.as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
}

impl Settings {
    /// Load settings using prefer for discovery, falling back to defaults.
    pub async fn load() -> Self {
        match prefer::load("ocrflow").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(settings) => settings,
                    Err(e) => {
                        tracing::warn!("ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load settings from a specific file. TOML, YAML or JSON by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut settings: Settings = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("TOML: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("YAML: {}", e)))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("JSON: {}", e)))?,
        };

        settings.source_path = Some(path.to_path_buf());
        Ok(settings)
    }

    pub fn tesseract_binary(&self) -> Option<PathBuf> {
        expand(&self.tesseract.binary)
    }

    pub fn tessdata_dir(&self) -> Option<PathBuf> {
        expand(&self.tesseract.data_dir)
    }

    pub fn poppler_dir(&self) -> Option<PathBuf> {
        expand(&self.poppler_dir)
    }
}
