use std::path::Path;

use crate::embedding::domain::embedding::Embedding;

/// Wall-clock time spent in each stage for one image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageTimings {
    pub decode_ms: f64,
    pub detect_ms: f64,
    pub embed_ms: f64,
}

/// Every face embedding found in one image, in detector order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedImage {
    pub embeddings: Vec<Embedding>,
    pub timings: StageTimings,
}

/// Turns one image file into face embeddings.
///
/// Implementations own their models and are moved into worker threads,
/// so they must be `Send` but need not be `Sync`.
pub trait ImageEncoder: Send {
    fn encode(&mut self, path: &Path) -> Result<EncodedImage, Box<dyn std::error::Error>>;
}
