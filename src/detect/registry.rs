use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde::Deserialize;

use crate::config::DetectorSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::ReplayBackend;
use crate::detect::result::ClassNames;

/// Detector implementations selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Scripted detections from a JSON file (or none at all).
    #[default]
    Replay,
    /// YOLO ONNX model via tract (feature `backend-tract`).
    Tract,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Replay => f.write_str("replay"),
            BackendKind::Tract => f.write_str("tract"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| anyhow!("unknown detector backend '{}'", s))
    }
}

/// Build and warm up the backend described by `settings`.
pub fn open_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let class_names = settings
        .class_names_path
        .as_ref()
        .map(ClassNames::from_path)
        .transpose()?;

    let mut backend: Box<dyn DetectorBackend> = match settings.backend {
        BackendKind::Replay => {
            let replay = match &settings.replay_path {
                Some(path) => ReplayBackend::from_path(path)?,
                None => ReplayBackend::empty(ClassNames::coco()),
            };
            Box::new(match class_names {
                Some(names) => replay.with_class_names(names),
                None => replay,
            })
        }
        BackendKind::Tract => open_tract(settings, class_names)?,
    };

    backend.warm_up()?;
    log::info!(
        "detector backend '{}' ready ({} classes, confidence > {})",
        backend.name(),
        backend.class_names().len(),
        settings.confidence
    );
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn open_tract(
    settings: &DetectorSettings,
    class_names: Option<ClassNames>,
) -> Result<Box<dyn DetectorBackend>> {
    use crate::detect::backends::TractBackend;

    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract backend needs a model path"))?;
    let backend = TractBackend::new(
        model_path,
        settings.input_size,
        class_names.unwrap_or_else(ClassNames::coco),
    )?
    .with_iou_threshold(settings.iou_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(
    _settings: &DetectorSettings,
    _class_names: Option<ClassNames>,
) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "the tract backend requires the backend-tract feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Replay".parse::<BackendKind>().unwrap(), BackendKind::Replay);
        assert_eq!(" tract ".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert!("opencv".parse::<BackendKind>().is_err());
    }

    #[test]
    fn replay_without_script_is_empty() {
        let settings = DetectorSettings::default();
        let backend = open_backend(&settings).unwrap();
        assert_eq!(backend.name(), "replay");
        assert_eq!(backend.class_names().name(2), "car");
    }

    #[test]
    fn class_names_file_overrides_script_table() {
        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("names.txt");
        std::fs::write(&names, "space\n").unwrap();
        let settings = DetectorSettings {
            class_names_path: Some(names),
            ..DetectorSettings::default()
        };
        let backend = open_backend(&settings).unwrap();
        assert_eq!(backend.class_names().name(0), "space");
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_requires_feature() {
        let settings = DetectorSettings {
            backend: BackendKind::Tract,
            ..DetectorSettings::default()
        };
        assert!(open_backend(&settings).is_err());
    }
}
