use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::image_encoder::EncodedImage;
use crate::pipeline::pipeline_logger::PipelineLogger;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("failed to encode {path}: {message}")]
    Image { path: PathBuf, message: String },
    #[error("an encoding worker panicked")]
    WorkerPanicked,
    #[error("at least one encoder is required")]
    NoEncoders,
    #[error("executor returned {got} results for {expected} images")]
    ResultCount { expected: usize, got: usize },
}

impl EncodeError {
    pub fn image(path: &Path, err: impl Display) -> Self {
        Self::Image {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Abstracts how a list of images is pushed through the per-image encoder.
///
/// This is a port. Infrastructure provides a sequential adapter and a
/// batched worker pool; both return results in input order and stop at the
/// first failing image.
pub trait EncodingExecutor: Send {
    fn execute(
        &mut self,
        images: &[PathBuf],
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<EncodedImage>, EncodeError>;
}
