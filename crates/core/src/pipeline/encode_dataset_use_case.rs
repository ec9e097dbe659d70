use std::path::{Path, PathBuf};

use crate::dataset::domain::labeled_image::LabeledImage;
use crate::dataset::infrastructure::dataset_scanner;
use crate::embedding::domain::embedding::Embedding;
use crate::pipeline::encoding_executor::{EncodeError, EncodingExecutor};
use crate::pipeline::image_encoder::EncodedImage;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::KDTREE_LEAF_SIZE;
use crate::storage::domain::face_encodings::{EncodingStructure, FaceEncodings};
use crate::storage::infrastructure::encodings_file::{self, OutputFormat};

/// Configuration for one dataset encoding run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeConfig {
    pub structure: EncodingStructure,
    pub leaf_size: usize,
    pub format: OutputFormat,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            structure: EncodingStructure::List,
            leaf_size: KDTREE_LEAF_SIZE,
            format: OutputFormat::Bincode,
        }
    }
}

/// Whole-dataset pipeline: scan → encode every image → label → index → write.
pub struct EncodeDatasetUseCase {
    executor: Box<dyn EncodingExecutor>,
    logger: Box<dyn PipelineLogger>,
    config: EncodeConfig,
}

impl EncodeDatasetUseCase {
    pub fn new(
        executor: Box<dyn EncodingExecutor>,
        logger: Box<dyn PipelineLogger>,
        config: EncodeConfig,
    ) -> Self {
        Self {
            executor,
            logger,
            config,
        }
    }

    /// Encodes every image under `dataset` and writes the result to `output`.
    ///
    /// Nothing is written if any image fails.
    pub fn execute(
        &mut self,
        dataset: &Path,
        output: &Path,
    ) -> Result<FaceEncodings, Box<dyn std::error::Error>> {
        let images = dataset_scanner::scan(dataset)?;
        self.logger
            .info(&format!("Found {} images in {}", images.len(), dataset.display()));
        if images.is_empty() {
            log::warn!("No images found; writing an empty encodings file");
        }

        let paths: Vec<PathBuf> = images.iter().map(|image| image.path.clone()).collect();
        let encoded = self.executor.execute(&paths, &mut *self.logger)?;

        let (embeddings, names) = pair_with_labels(&images, encoded, &mut *self.logger)?;
        self.logger.info(&format!(
            "Encoded {} faces across {} images",
            embeddings.len(),
            images.len()
        ));

        let encodings = FaceEncodings::build(
            self.config.structure,
            embeddings,
            names,
            self.config.leaf_size,
        )?;

        self.logger.info(&format!(
            "Serializing encodings ({}, {}) to {}",
            self.config.structure,
            self.config.format,
            output.display()
        ));
        encodings_file::write(output, &encodings, self.config.format)?;

        self.logger.summary();
        Ok(encodings)
    }
}

/// Flattens per-image results into parallel embedding and label lists,
/// recording stage timings and the face count of each image.
fn pair_with_labels(
    images: &[LabeledImage],
    encoded: Vec<EncodedImage>,
    logger: &mut dyn PipelineLogger,
) -> Result<(Vec<Embedding>, Vec<String>), EncodeError> {
    if encoded.len() != images.len() {
        return Err(EncodeError::ResultCount {
            expected: images.len(),
            got: encoded.len(),
        });
    }

    let mut embeddings = Vec::new();
    let mut names = Vec::new();

    for (image, result) in images.iter().zip(encoded) {
        logger.timing("decode", result.timings.decode_ms);
        logger.timing("detect", result.timings.detect_ms);
        logger.timing("embed", result.timings.embed_ms);
        logger.metric("faces_per_image", result.embeddings.len() as f64);

        if result.embeddings.is_empty() {
            log::debug!("No face found in {}", image.path.display());
        }
        for embedding in result.embeddings {
            embeddings.push(embedding);
            names.push(image.label.clone());
        }
    }

    Ok((embeddings, names))
}
