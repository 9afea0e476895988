use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::BackendKind;
use crate::error::PsmsError;
use crate::zones::UnmatchedLinePolicy;

const DEFAULT_ZONES_PATH: &str = "data/zones.txt";
const DEFAULT_SOURCE: &str = "stub://lot";
const DEFAULT_CONFIDENCE: f32 = 0.15;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_SAVE_EVERY: u32 = 1;
const DEFAULT_LOG_EVERY: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    zones_path: Option<PathBuf>,
    unmatched_lines: Option<UnmatchedLinePolicy>,
    source: Option<String>,
    max_frames: Option<u64>,
    log_every: Option<u64>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<BackendKind>,
    model_path: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    class_names_path: Option<PathBuf>,
    confidence: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    every_n: Option<u32>,
    font_path: Option<PathBuf>,
    draw_zones: Option<bool>,
    draw_zone_info: Option<bool>,
}

/// Settings for one monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub zones_path: PathBuf,
    pub unmatched_lines: UnmatchedLinePolicy,
    pub source: String,
    /// Stop after this many frames; `None` runs until end-of-stream or quit.
    pub max_frames: Option<u64>,
    pub log_every: u64,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub replay_path: Option<PathBuf>,
    pub class_names_path: Option<PathBuf>,
    /// Detections must score strictly above this.
    pub confidence: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model_path: None,
            replay_path: None,
            class_names_path: None,
            confidence: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

/// Where annotated frames go and what is drawn on them.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Annotated frames are written here; `None` runs headless.
    pub dir: Option<PathBuf>,
    pub every_n: u32,
    pub font_path: Option<PathBuf>,
    pub draw_zones: bool,
    pub draw_zone_info: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: None,
            every_n: DEFAULT_SAVE_EVERY,
            font_path: None,
            draw_zones: true,
            draw_zone_info: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        // The empty file yields every default.
        Self::from_file(MonitorConfigFile::default())
    }
}

impl MonitorConfig {
    /// Defaults, then the file named by `PSMS_CONFIG`, then `PSMS_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(config_path_from_env().as_deref().map(Path::new))
    }

    /// Like [`MonitorConfig::load`] but with an explicit config file, which
    /// takes precedence over `PSMS_CONFIG`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(Some(path.as_ref()))
    }

    /// [`MonitorConfig::load`] without the final [`MonitorConfig::validate`],
    /// for callers that layer their own overrides on top and validate once.
    pub fn load_unvalidated() -> Result<Self> {
        Self::assemble(config_path_from_env().as_deref().map(Path::new))
    }

    /// [`MonitorConfig::load_from`] without the final validation.
    pub fn load_from_unvalidated(path: impl AsRef<Path>) -> Result<Self> {
        Self::assemble(Some(path.as_ref()))
    }

    fn load_with(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::assemble(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn assemble(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Self {
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file.backend.unwrap_or_default(),
            model_path: detector_file.model_path,
            replay_path: detector_file.replay_path,
            class_names_path: detector_file.class_names_path,
            confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };
        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            dir: output_file.dir,
            every_n: output_file.every_n.unwrap_or(DEFAULT_SAVE_EVERY),
            font_path: output_file.font_path,
            draw_zones: output_file.draw_zones.unwrap_or(true),
            draw_zone_info: output_file.draw_zone_info.unwrap_or(false),
        };
        Self {
            zones_path: file
                .zones_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ZONES_PATH)),
            unmatched_lines: file.unmatched_lines.unwrap_or_default(),
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            max_frames: file.max_frames,
            log_every: file.log_every.unwrap_or(DEFAULT_LOG_EVERY),
            detector,
            output,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_var("PSMS_ZONES") {
            self.zones_path = PathBuf::from(path);
        }
        if let Some(source) = non_empty_var("PSMS_SOURCE") {
            self.source = source;
        }
        if let Some(backend) = non_empty_var("PSMS_BACKEND") {
            self.detector.backend = backend.parse()?;
        }
        if let Some(path) = non_empty_var("PSMS_MODEL") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_var("PSMS_REPLAY") {
            self.detector.replay_path = Some(PathBuf::from(path));
        }
        if let Some(confidence) = non_empty_var("PSMS_CONFIDENCE") {
            self.detector.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("PSMS_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(dir) = non_empty_var("PSMS_OUTPUT_DIR") {
            self.output.dir = Some(PathBuf::from(dir));
        }
        if let Some(max_frames) = non_empty_var("PSMS_MAX_FRAMES") {
            let frames: u64 = max_frames
                .trim()
                .parse()
                .map_err(|_| anyhow!("PSMS_MAX_FRAMES must be a non-negative integer"))?;
            self.max_frames = Some(frames);
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let confidence = self.detector.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(invalid(format!(
                "detector confidence must be within [0, 1], got {}",
                confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(invalid(format!(
                "detector iou_threshold must be within [0, 1], got {}",
                self.detector.iou_threshold
            )));
        }
        if self.detector.input_size == 0 {
            return Err(invalid("detector input_size must be greater than zero"));
        }
        if self.detector.backend == BackendKind::Tract && self.detector.model_path.is_none() {
            return Err(invalid("the tract backend needs detector.model_path"));
        }
        if self.source.trim().is_empty() {
            return Err(invalid("source must not be empty"));
        }
        if self.log_every == 0 {
            return Err(invalid("log_every must be greater than zero"));
        }
        if self.output.every_n == 0 {
            return Err(invalid("output.every_n must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    PsmsError::InvalidConfig(message.into()).into()
}

fn config_path_from_env() -> Option<String> {
    non_empty_var("PSMS_CONFIG")
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
