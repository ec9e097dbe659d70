/// ArcFace face embedder using ONNX Runtime.
///
/// Produces L2-normalized 512-d embeddings from 112×112 face chips.
use std::path::Path;

use thiserror::Error;

use crate::detection::infrastructure::execution_provider::build_session;
use crate::embedding::domain::alignment::{face_chip, ALIGNED_SIZE};
use crate::embedding::domain::embedding::Embedding;
use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;
pub const EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("face box ({x1:.0}, {y1:.0}, {x2:.0}, {y2:.0}) is empty")]
    EmptyFace { x1: f64, y1: f64, x2: f64, y2: f64 },
    #[error("expected {expected}-dim embedding, got {got}")]
    Dimension { expected: usize, got: usize },
}

pub struct OnnxArcfaceEmbedder {
    session: ort::session::Session,
}

impl OnnxArcfaceEmbedder {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, intra_threads)?;
        Ok(Self { session })
    }
}

impl FaceEmbedder for OnnxArcfaceEmbedder {
    fn embed(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<Embedding, Box<dyn std::error::Error>> {
        let chip = face_chip(frame, face).ok_or(EmbedError::EmptyFace {
            x1: face.x1,
            y1: face.y1,
            x2: face.x2,
            y2: face.y2,
        })?;

        let tensor = preprocess(&chip);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let raw = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?
            .to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedError::Dimension {
                expected: EMBEDDING_DIM,
                got: raw.len(),
            }
            .into());
        }
        Ok(Embedding::normalized(raw))
    }
}

/// Normalize a 112×112 RGB chip to `(p - 127.5) / 127.5`, NCHW.
fn preprocess(chip: &Frame) -> ndarray::Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let src = chip.as_ndarray();
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size.min(chip.height() as usize) {
        for x in 0..size.min(chip.width() as usize) {
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[y, x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}
