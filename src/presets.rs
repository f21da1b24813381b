//! Preset registry: named speed/quality profiles.
//!
//! Presets are plain data. Anything that varies with runtime input (hardware
//! parallelism, fast mode, remaining page time) is expressed as a named strategy
//! enum that the pipeline evaluates, never as a stored closure.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier of a registry entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PresetId {
    #[serde(alias = "fastest")]
    #[value(alias = "fastest")]
    SuperTurbo,
    #[serde(alias = "fast")]
    #[value(alias = "fast")]
    #[default]
    Turbo,
    Balanced,
    Tables,
    Accurate,
    /// Reached by overriding a single knob of another preset.
    Custom,
}

impl PresetId {
    pub const ALL: [PresetId; 6] = [
        PresetId::SuperTurbo,
        PresetId::Turbo,
        PresetId::Balanced,
        PresetId::Tables,
        PresetId::Accurate,
        PresetId::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetId::SuperTurbo => "super-turbo",
            PresetId::Turbo => "turbo",
            PresetId::Balanced => "balanced",
            PresetId::Tables => "tables",
            PresetId::Accurate => "accurate",
            PresetId::Custom => "custom",
        }
    }

    pub fn preset(&self) -> &'static Preset {
        preset(*self)
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "super-turbo" | "superturbo" | "fastest" => Ok(PresetId::SuperTurbo),
            "turbo" | "fast" => Ok(PresetId::Turbo),
            "balanced" => Ok(PresetId::Balanced),
            "tables" => Ok(PresetId::Tables),
            "accurate" => Ok(PresetId::Accurate),
            "custom" => Ok(PresetId::Custom),
            other => Err(format!("unknown preset: {}", other)),
        }
    }
}

/// Recognition language set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Languages {
    #[serde(rename = "tha")]
    Thai,
    #[serde(rename = "eng")]
    English,
    #[default]
    #[serde(rename = "tha+eng")]
    ThaiEnglish,
}

impl Languages {
    /// Engine language code, `+`-joined.
    pub fn code(&self) -> &'static str {
        match self {
            Languages::Thai => "tha",
            Languages::English => "eng",
            Languages::ThaiEnglish => "tha+eng",
        }
    }

    /// Individual language codes.
    pub fn codes(&self) -> &'static [&'static str] {
        match self {
            Languages::Thai => &["tha"],
            Languages::English => &["eng"],
            Languages::ThaiEnglish => &["tha", "eng"],
        }
    }

    pub fn includes_thai(&self) -> bool {
        matches!(self, Languages::Thai | Languages::ThaiEnglish)
    }

    pub fn includes_english(&self) -> bool {
        matches!(self, Languages::English | Languages::ThaiEnglish)
    }
}

impl FromStr for Languages {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tha" => Ok(Languages::Thai),
            "eng" => Ok(Languages::English),
            "tha+eng" | "eng+tha" => Ok(Languages::ThaiEnglish),
            other => Err(format!("unsupported language set: {} (use tha, eng or tha+eng)", other)),
        }
    }
}

impl fmt::Display for Languages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Engine page segmentation mode. Only layouts the pipeline knows how to use are
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SegmentationMode(u8);

impl SegmentationMode {
    /// Fully automatic layout analysis. Used by one-shot calls.
    pub const AUTO: SegmentationMode = SegmentationMode(3);
    /// A single uniform block of text.
    pub const BLOCK: SegmentationMode = SegmentationMode(6);
    /// A single text line.
    pub const LINE: SegmentationMode = SegmentationMode(7);
    pub const SPARSE: SegmentationMode = SegmentationMode(11);
    pub const SPARSE_OSD: SegmentationMode = SegmentationMode(12);

    pub const ALLOWED: [u8; 5] = [3, 6, 7, 11, 12];

    pub fn new(mode: u8) -> Option<Self> {
        Self::ALLOWED.contains(&mode).then_some(SegmentationMode(mode))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SegmentationMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SegmentationMode::new(value).ok_or_else(|| {
            format!(
                "segmentation mode {} not supported (allowed: {:?})",
                value,
                SegmentationMode::ALLOWED
            )
        })
    }
}

impl From<SegmentationMode> for u8 {
    fn from(mode: SegmentationMode) -> Self {
        mode.0
    }
}

impl fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image-processing knobs fed to the preprocessing engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub languages: Languages,
    pub segmentation: SegmentationMode,
    pub grayscale: bool,
    pub binarize: bool,
    pub scale: f32,
    pub contrast: f32,
    pub sharpen: f32,
}

impl ImageOptions {
    /// Cheaper settings for small bitmaps and logo-like images.
    pub fn fast_mode(&self) -> ImageOptions {
        ImageOptions {
            grayscale: true,
            binarize: false,
            scale: 2.0,
            contrast: 1.05,
            sharpen: 0.0,
            ..*self
        }
    }
}

/// Tuning parameters passed to the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineParams {
    pub dpi: u32,
    /// Engine mode; 1 selects the LSTM recognizer.
    pub oem: u8,
    pub preserve_interword_spaces: bool,
    /// Whether the word dictionaries are loaded.
    pub dictionaries: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            dpi: 300,
            oem: 1,
            preserve_interword_spaces: false,
            dictionaries: true,
        }
    }
}

/// How many workers a pool gets, given a hardware parallelism hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyRule {
    /// One worker regardless of hardware.
    Single,
    /// `min(max, hint)`, at least one.
    UpTo(usize),
    /// `max(1, min(max, hint - 1))`: leave a core for everything else.
    SpareOneCore(usize),
}

impl ConcurrencyRule {
    pub fn limit(&self, hint: usize) -> usize {
        match *self {
            ConcurrencyRule::Single => 1,
            ConcurrencyRule::UpTo(max) => max.min(hint).max(1),
            ConcurrencyRule::SpareOneCore(max) => max.min(hint.saturating_sub(1)).max(1),
        }
    }
}

/// Hardware parallelism, falling back to 4 when the platform can't tell.
pub fn hardware_hint() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Sub-budget for one attempt, carved from the time left on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    pub floor: Duration,
    pub ceiling: Duration,
}

impl AttemptBudget {
    pub fn for_remaining(&self, remaining: Duration) -> Duration {
        remaining.min(self.ceiling).max(self.floor)
    }
}

/// One configured recognition try.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Attempt {
    pub label: &'static str,
    pub segmentation: SegmentationMode,
    pub scale_mul: f32,
    pub binarize: bool,
    pub ordinal: usize,
}

/// Named ladder generators. Every ladder runs from the most expensive, highest
/// quality attempt down to the cheapest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderStrategy {
    /// A single line-mode try at full scale.
    TinyOnly,
    /// Requested layout at full scale, then a shrunken line-mode try.
    NormalThenTiny,
    /// Like `NormalThenTiny` with a block-mode step in between.
    NormalMidTiny,
    /// Binarized line and block tries for tabular pages, then an unbinarized tiny try.
    Grid,
    /// Binarized requested layout, binarized block mode, then tiny.
    Thorough,
}

impl LadderStrategy {
    /// Build the ordered attempt list. In fast mode the first rung uses line mode.
    pub fn generate(&self, fast_mode: bool, requested: SegmentationMode) -> Vec<Attempt> {
        let normal = if fast_mode {
            SegmentationMode::LINE
        } else {
            requested
        };
        let rungs: Vec<(&'static str, SegmentationMode, f32, bool)> = match self {
            LadderStrategy::TinyOnly => vec![("tiny", SegmentationMode::LINE, 1.0, false)],
            LadderStrategy::NormalThenTiny => vec![
                ("normal", normal, 1.0, false),
                ("tiny", SegmentationMode::LINE, 0.7, false),
            ],
            LadderStrategy::NormalMidTiny => vec![
                ("normal", normal, 1.0, false),
                ("mid", SegmentationMode::BLOCK, 0.85, false),
                ("tiny", SegmentationMode::LINE, 0.7, false),
            ],
            LadderStrategy::Grid => vec![
                ("grid-7", SegmentationMode::LINE, 1.0, true),
                ("grid-6", SegmentationMode::BLOCK, 0.9, true),
                ("tiny", SegmentationMode::LINE, 0.75, false),
            ],
            LadderStrategy::Thorough => vec![
                ("normal", requested, 1.0, true),
                ("mid", SegmentationMode::BLOCK, 0.9, true),
                ("tiny", SegmentationMode::LINE, 0.75, false),
            ],
        };

        rungs
            .into_iter()
            .enumerate()
            .map(|(ordinal, (label, segmentation, scale_mul, binarize))| Attempt {
                label,
                segmentation,
                scale_mul,
                binarize,
                ordinal,
            })
            .collect()
    }
}

/// A registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub id: PresetId,
    pub label: &'static str,
    pub description: &'static str,
    pub defaults: ImageOptions,
    /// Upper bound on preprocessing output, in megapixels.
    pub cap_megapixels: f32,
    pub page_budget: Duration,
    /// Hard ceiling on one page's whole pipeline.
    pub timeout: Duration,
    pub render_concurrency: ConcurrencyRule,
    pub ocr_concurrency: ConcurrencyRule,
    pub ladder: LadderStrategy,
    pub attempt_budget: AttemptBudget,
    pub engine: EngineParams,
}

impl Preset {
    pub fn cap_pixels(&self) -> f64 {
        f64::from(self.cap_megapixels) * 1_000_000.0
    }

    pub fn attempts(&self, fast_mode: bool, requested: SegmentationMode) -> Vec<Attempt> {
        self.ladder.generate(fast_mode, requested)
    }
}

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

const fn options(
    segmentation: SegmentationMode,
    scale: f32,
    contrast: f32,
    sharpen: f32,
    binarize: bool,
) -> ImageOptions {
    ImageOptions {
        languages: Languages::ThaiEnglish,
        segmentation,
        grayscale: true,
        binarize,
        scale,
        contrast,
        sharpen,
    }
}

static PRESETS: [Preset; 6] = [
    Preset {
        id: PresetId::SuperTurbo,
        label: "Super Turbo",
        description: "Fastest; single line-mode pass, small images",
        defaults: options(SegmentationMode::LINE, 1.6, 1.0, 0.0, false),
        cap_megapixels: 0.9,
        page_budget: secs(15),
        timeout: secs(60),
        render_concurrency: ConcurrencyRule::UpTo(8),
        ocr_concurrency: ConcurrencyRule::Single,
        ladder: LadderStrategy::TinyOnly,
        attempt_budget: AttemptBudget {
            floor: secs(4),
            ceiling: secs(8),
        },
        engine: EngineParams {
            dpi: 220,
            oem: 1,
            preserve_interword_spaces: false,
            dictionaries: false,
        },
    },
    Preset {
        id: PresetId::Turbo,
        label: "Turbo",
        description: "Fast; two attempts, dictionaries off",
        defaults: options(SegmentationMode::BLOCK, 1.8, 1.05, 0.0, false),
        cap_megapixels: 1.2,
        page_budget: secs(25),
        timeout: secs(90),
        render_concurrency: ConcurrencyRule::UpTo(6),
        ocr_concurrency: ConcurrencyRule::SpareOneCore(2),
        ladder: LadderStrategy::NormalThenTiny,
        attempt_budget: AttemptBudget {
            floor: secs(6),
            ceiling: secs(16),
        },
        engine: EngineParams {
            dpi: 250,
            oem: 1,
            preserve_interword_spaces: false,
            dictionaries: false,
        },
    },
    Preset {
        id: PresetId::Balanced,
        label: "Balanced",
        description: "Default trade-off between speed and accuracy",
        defaults: options(SegmentationMode::BLOCK, 2.2, 1.1, 0.2, false),
        cap_megapixels: 2.2,
        page_budget: secs(45),
        timeout: secs(120),
        render_concurrency: ConcurrencyRule::UpTo(5),
        ocr_concurrency: ConcurrencyRule::SpareOneCore(2),
        ladder: LadderStrategy::NormalMidTiny,
        attempt_budget: AttemptBudget {
            floor: secs(8),
            ceiling: secs(22),
        },
        engine: EngineParams {
            dpi: 300,
            oem: 1,
            preserve_interword_spaces: false,
            dictionaries: true,
        },
    },
    Preset {
        id: PresetId::Tables,
        label: "Tables",
        description: "Tabular documents; binarized, spacing preserved",
        defaults: options(SegmentationMode::LINE, 2.4, 1.15, 0.4, true),
        cap_megapixels: 2.6,
        page_budget: secs(55),
        timeout: secs(150),
        render_concurrency: ConcurrencyRule::UpTo(4),
        ocr_concurrency: ConcurrencyRule::Single,
        ladder: LadderStrategy::Grid,
        attempt_budget: AttemptBudget {
            floor: secs(12),
            ceiling: secs(28),
        },
        engine: EngineParams {
            dpi: 320,
            oem: 1,
            preserve_interword_spaces: true,
            dictionaries: true,
        },
    },
    Preset {
        id: PresetId::Accurate,
        label: "Accurate",
        description: "Slowest; large binarized images and generous budgets",
        defaults: options(SegmentationMode::BLOCK, 2.8, 1.2, 0.6, true),
        cap_megapixels: 3.5,
        page_budget: secs(75),
        timeout: secs(180),
        render_concurrency: ConcurrencyRule::UpTo(4),
        ocr_concurrency: ConcurrencyRule::Single,
        ladder: LadderStrategy::Thorough,
        attempt_budget: AttemptBudget {
            floor: secs(14),
            ceiling: secs(30),
        },
        engine: EngineParams {
            dpi: 350,
            oem: 1,
            preserve_interword_spaces: true,
            dictionaries: true,
        },
    },
    Preset {
        id: PresetId::Custom,
        label: "Custom",
        description: "Hand-tuned knobs",
        defaults: options(SegmentationMode::BLOCK, 2.0, 1.1, 0.1, false),
        cap_megapixels: 2.0,
        page_budget: secs(45),
        timeout: secs(120),
        render_concurrency: ConcurrencyRule::UpTo(5),
        ocr_concurrency: ConcurrencyRule::SpareOneCore(2),
        ladder: LadderStrategy::NormalThenTiny,
        attempt_budget: AttemptBudget {
            floor: secs(8),
            ceiling: secs(18),
        },
        engine: EngineParams {
            dpi: 280,
            oem: 1,
            preserve_interword_spaces: false,
            dictionaries: true,
        },
    },
];

/// Look up a registry entry.
pub fn preset(id: PresetId) -> &'static Preset {
    match id {
        PresetId::SuperTurbo => &PRESETS[0],
        PresetId::Turbo => &PRESETS[1],
        PresetId::Balanced => &PRESETS[2],
        PresetId::Tables => &PRESETS[3],
        PresetId::Accurate => &PRESETS[4],
        PresetId::Custom => &PRESETS[5],
    }
}

/// All registry entries in speed order.
pub fn all() -> &'static [Preset] {
    &PRESETS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_matches_id() {
        for id in PresetId::ALL {
            assert_eq!(preset(id).id, id);
        }
    }

    #[test]
    fn test_ladders_non_empty_and_decreasing() {
        for entry in all() {
            for fast in [false, true] {
                for mode in SegmentationMode::ALLOWED {
                    let requested = SegmentationMode::new(mode).unwrap();
                    let ladder = entry.attempts(fast, requested);
                    assert!(!ladder.is_empty(), "{} has an empty ladder", entry.id);
                    for (i, pair) in ladder.windows(2).enumerate() {
                        assert!(
                            pair[0].scale_mul > pair[1].scale_mul,
                            "{} rung {} is not cheaper than rung {}",
                            entry.id,
                            i + 1,
                            i
                        );
                    }
                    for (i, attempt) in ladder.iter().enumerate() {
                        assert_eq!(attempt.ordinal, i);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fast_mode_forces_line_mode_first() {
        let ladder = preset(PresetId::Turbo).attempts(true, SegmentationMode::BLOCK);
        assert_eq!(ladder[0].segmentation, SegmentationMode::LINE);
        let ladder = preset(PresetId::Turbo).attempts(false, SegmentationMode::SPARSE);
        assert_eq!(ladder[0].segmentation, SegmentationMode::SPARSE);
    }

    #[test]
    fn test_attempt_budget_clamps() {
        let budget = preset(PresetId::Turbo).attempt_budget;
        assert_eq!(budget.for_remaining(secs(100)), secs(16));
        assert_eq!(budget.for_remaining(secs(9)), secs(9));
        assert_eq!(budget.for_remaining(Duration::ZERO), secs(6));
    }

    #[test]
    fn test_concurrency_rules() {
        assert_eq!(ConcurrencyRule::Single.limit(16), 1);
        assert_eq!(ConcurrencyRule::UpTo(6).limit(16), 6);
        assert_eq!(ConcurrencyRule::UpTo(6).limit(2), 2);
        assert_eq!(ConcurrencyRule::UpTo(6).limit(0), 1);
        assert_eq!(ConcurrencyRule::SpareOneCore(2).limit(8), 2);
        assert_eq!(ConcurrencyRule::SpareOneCore(2).limit(2), 1);
        assert_eq!(ConcurrencyRule::SpareOneCore(2).limit(1), 1);
    }

    #[test]
    fn test_preset_aliases() {
        assert_eq!("fast".parse::<PresetId>().unwrap(), PresetId::Turbo);
        assert_eq!("fastest".parse::<PresetId>().unwrap(), PresetId::SuperTurbo);
        assert_eq!("Tables".parse::<PresetId>().unwrap(), PresetId::Tables);
        assert!("slow".parse::<PresetId>().is_err());
    }

    #[test]
    fn test_segmentation_mode_validation() {
        assert!(SegmentationMode::new(6).is_some());
        assert!(SegmentationMode::new(4).is_none());
        assert!(SegmentationMode::try_from(13).is_err());
    }

    #[test]
    fn test_fast_mode_options_keep_language() {
        let base = preset(PresetId::Accurate).defaults;
        let fast = base.fast_mode();
        assert_eq!(fast.languages, base.languages);
        assert!(!fast.binarize);
        assert_eq!(fast.scale, 2.0);
        assert_eq!(fast.sharpen, 0.0);
    }

    #[test]
    fn test_default_preset_is_turbo() {
        assert_eq!(PresetId::default(), PresetId::Turbo);
    }
}
