use std::path::PathBuf;

use crate::pipeline::encoding_executor::{EncodeError, EncodingExecutor};
use crate::pipeline::image_encoder::{EncodedImage, ImageEncoder};
use crate::pipeline::pipeline_logger::PipelineLogger;

/// Encodes images one after another on the calling thread.
pub struct SequentialExecutor {
    encoder: Box<dyn ImageEncoder>,
}

impl SequentialExecutor {
    pub fn new(encoder: Box<dyn ImageEncoder>) -> Self {
        Self { encoder }
    }
}

impl EncodingExecutor for SequentialExecutor {
    fn execute(
        &mut self,
        images: &[PathBuf],
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<EncodedImage>, EncodeError> {
        let total = images.len();
        let mut results = Vec::with_capacity(total);

        for (i, path) in images.iter().enumerate() {
            let encoded = self
                .encoder
                .encode(path)
                .map_err(|e| EncodeError::image(path, e))?;
            results.push(encoded);
            logger.progress(i + 1, total);
        }

        Ok(results)
    }
}
