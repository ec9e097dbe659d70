use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::pipeline::encoding_executor::{EncodeError, EncodingExecutor};
use crate::pipeline::image_encoder::{EncodedImage, ImageEncoder};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::BATCH_MULTIPLIER;

type Job = (usize, PathBuf);
type JobResult = (usize, Result<EncodedImage, String>);

/// Encodes images on a pool of worker threads, one batch at a time.
///
/// Layout per batch: `queue → N workers → parent [collect in input order]`
///
/// A fresh pool is spawned for every batch of `workers × BATCH_MULTIPLIER`
/// images. Each worker owns one encoder; encoders come back through the
/// join handles and are handed to the next batch's pool, so models are
/// loaded once per worker rather than once per batch.
pub struct ThreadedBatchExecutor {
    encoders: Vec<Box<dyn ImageEncoder>>,
    batch_size: usize,
}

impl ThreadedBatchExecutor {
    pub fn new(encoders: Vec<Box<dyn ImageEncoder>>) -> Result<Self, EncodeError> {
        if encoders.is_empty() {
            return Err(EncodeError::NoEncoders);
        }
        let batch_size = encoders.len() * BATCH_MULTIPLIER;
        Ok(Self {
            encoders,
            batch_size,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.encoders.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn run_batch(
        &mut self,
        batch: &[PathBuf],
        done: &mut usize,
        total: usize,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<EncodedImage>, EncodeError> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(batch.len());
        for job in batch.iter().cloned().enumerate() {
            // Capacity equals the batch length and the receiver is alive.
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<JobResult>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = std::mem::take(&mut self.encoders)
            .into_iter()
            .map(|encoder| {
                spawn_worker(
                    encoder,
                    job_rx.clone(),
                    result_tx.clone(),
                    cancelled.clone(),
                )
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        let mut slots: Vec<Option<EncodedImage>> = vec![None; batch.len()];
        let mut first_error: Option<EncodeError> = None;

        for (index, result) in result_rx {
            match result {
                Ok(encoded) => {
                    slots[index] = Some(encoded);
                    *done += 1;
                    logger.progress(*done, total);
                }
                Err(message) => {
                    cancelled.store(true, Ordering::Relaxed);
                    set_if_none(
                        &mut first_error,
                        EncodeError::Image {
                            path: batch[index].clone(),
                            message,
                        },
                    );
                }
            }
        }

        self.join_workers(handles, &mut first_error);

        if let Some(e) = first_error {
            return Err(e);
        }
        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(EncodeError::WorkerPanicked)
    }

    /// Reclaims the encoders and records a panic as the error if none is set.
    fn join_workers(
        &mut self,
        handles: Vec<JoinHandle<Box<dyn ImageEncoder>>>,
        first_error: &mut Option<EncodeError>,
    ) {
        for handle in handles {
            match handle.join() {
                Ok(encoder) => self.encoders.push(encoder),
                Err(_) => set_if_none(first_error, EncodeError::WorkerPanicked),
            }
        }
    }
}

impl EncodingExecutor for ThreadedBatchExecutor {
    fn execute(
        &mut self,
        images: &[PathBuf],
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<EncodedImage>, EncodeError> {
        if self.encoders.is_empty() {
            return Err(EncodeError::NoEncoders);
        }

        let total = images.len();
        let mut done = 0;
        let mut results = Vec::with_capacity(total);

        for (n, batch) in images.chunks(self.batch_size).enumerate() {
            log::debug!(
                "Batch {}: {} images on {} workers",
                n + 1,
                batch.len(),
                self.encoders.len()
            );
            results.extend(self.run_batch(batch, &mut done, total, logger)?);
        }

        Ok(results)
    }
}

fn spawn_worker(
    mut encoder: Box<dyn ImageEncoder>,
    job_rx: crossbeam_channel::Receiver<Job>,
    result_tx: crossbeam_channel::Sender<JobResult>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn ImageEncoder>> {
    std::thread::spawn(move || {
        for (index, path) in job_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let result = encoder.encode(&path).map_err(|e| e.to_string());
            let failed = result.is_err();
            if result_tx.send((index, result)).is_err() || failed {
                break;
            }
        }
        encoder
    })
}

fn set_if_none(slot: &mut Option<EncodeError>, err: EncodeError) {
    if slot.is_none() {
        *slot = Some(err);
    }
}
