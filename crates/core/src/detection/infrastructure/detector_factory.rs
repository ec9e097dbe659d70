use std::path::Path;

use crate::detection::domain::detection_method::DetectionMethod;
use crate::detection::domain::face_detector::FaceDetector;

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Creates the detector backing `method` from an already-resolved model file.
pub fn create_detector(
    method: DetectionMethod,
    model_path: &Path,
    confidence: f64,
    intra_threads: usize,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::debug!(
        "Loading {method} detector from {} (confidence={confidence})",
        model_path.display()
    );
    match method {
        DetectionMethod::Cnn => Ok(Box::new(OnnxYoloDetector::new(
            model_path,
            confidence,
            intra_threads,
        )?)),
        DetectionMethod::Hog => Ok(Box::new(OnnxBlazefaceDetector::new(
            model_path,
            confidence,
            intra_threads,
        )?)),
    }
}
