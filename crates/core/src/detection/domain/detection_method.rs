use std::fmt;
use std::str::FromStr;

use crate::shared::constants::{BLAZEFACE_MODEL_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL};
use crate::shared::model_resolver::ModelSpec;

/// Which face detector to run.
///
/// `cnn` is the accurate landmark-producing YOLO model; `hog` is the
/// lightweight BlazeFace model for fast, box-only detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionMethod {
    #[default]
    Cnn,
    Hog,
}

impl DetectionMethod {
    pub fn model(&self) -> ModelSpec {
        match self {
            DetectionMethod::Cnn => ModelSpec {
                name: YOLO_MODEL_NAME,
                url: Some(YOLO_MODEL_URL),
            },
            DetectionMethod::Hog => ModelSpec {
                name: BLAZEFACE_MODEL_NAME,
                url: None,
            },
        }
    }

    /// Confidence threshold used when none is given.
    pub fn default_confidence(&self) -> f64 {
        match self {
            DetectionMethod::Cnn => 0.25,
            DetectionMethod::Hog => 0.5,
        }
    }
}

impl FromStr for DetectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cnn" | "yolo" => Ok(DetectionMethod::Cnn),
            "hog" | "blazeface" => Ok(DetectionMethod::Hog),
            other => Err(format!(
                "Detection method must be 'cnn' or 'hog', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::Cnn => write!(f, "cnn"),
            DetectionMethod::Hog => write!(f, "hog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cnn", DetectionMethod::Cnn)]
    #[case("CNN", DetectionMethod::Cnn)]
    #[case("yolo", DetectionMethod::Cnn)]
    #[case("hog", DetectionMethod::Hog)]
    #[case("blazeface", DetectionMethod::Hog)]
    fn test_parse(#[case] input: &str, #[case] expected: DetectionMethod) {
        assert_eq!(input.parse::<DetectionMethod>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "sift".parse::<DetectionMethod>().unwrap_err();
        assert!(err.contains("sift"));
    }

    #[test]
    fn test_display_roundtrips() {
        for m in [DetectionMethod::Cnn, DetectionMethod::Hog] {
            assert_eq!(m.to_string().parse::<DetectionMethod>().unwrap(), m);
        }
    }

    #[test]
    fn test_default_is_cnn() {
        assert_eq!(DetectionMethod::default(), DetectionMethod::Cnn);
    }

    #[test]
    fn test_only_cnn_model_is_downloadable() {
        assert!(DetectionMethod::Cnn.model().url.is_some());
        assert!(DetectionMethod::Hog.model().url.is_none());
    }
}
