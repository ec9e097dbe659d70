use std::path::Path;
use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::imaging::domain::image_reader::ImageReader;
use crate::pipeline::image_encoder::{EncodedImage, ImageEncoder, StageTimings};

/// Single-image encoding pipeline: decode → detect → embed each face.
pub struct EncodeImageUseCase {
    reader: Box<dyn ImageReader>,
    detector: Box<dyn FaceDetector>,
    embedder: Box<dyn FaceEmbedder>,
}

impl EncodeImageUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        detector: Box<dyn FaceDetector>,
        embedder: Box<dyn FaceEmbedder>,
    ) -> Self {
        Self {
            reader,
            detector,
            embedder,
        }
    }
}

impl ImageEncoder for EncodeImageUseCase {
    fn encode(&mut self, path: &Path) -> Result<EncodedImage, Box<dyn std::error::Error>> {
        let t0 = Instant::now();
        let frame = self.reader.read(path)?;
        let decode_ms = elapsed_ms(t0);

        let t0 = Instant::now();
        let faces = self.detector.detect(&frame)?;
        let detect_ms = elapsed_ms(t0);

        let t0 = Instant::now();
        let embeddings = faces
            .iter()
            .map(|face| self.embedder.embed(&frame, face))
            .collect::<Result<Vec<_>, _>>()?;
        let embed_ms = elapsed_ms(t0);

        log::debug!("{}: {} face(s)", path.display(), embeddings.len());

        Ok(EncodedImage {
            embeddings,
            timings: StageTimings {
                decode_ms,
                detect_ms,
                embed_ms,
            },
        })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
