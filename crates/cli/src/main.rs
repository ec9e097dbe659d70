use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use faceprint_core::detection::domain::detection_method::DetectionMethod;
use faceprint_core::detection::infrastructure::detector_factory::create_detector;
use faceprint_core::embedding::infrastructure::onnx_arcface_embedder::OnnxArcfaceEmbedder;
use faceprint_core::imaging::infrastructure::image_file_reader::ImageFileReader;
use faceprint_core::pipeline::encode_dataset_use_case::{EncodeConfig, EncodeDatasetUseCase};
use faceprint_core::pipeline::encode_image_use_case::EncodeImageUseCase;
use faceprint_core::pipeline::encoding_executor::EncodingExecutor;
use faceprint_core::pipeline::image_encoder::ImageEncoder;
use faceprint_core::pipeline::infrastructure::sequential_executor::SequentialExecutor;
use faceprint_core::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
use faceprint_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceprint_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, KDTREE_LEAF_SIZE,
};
use faceprint_core::shared::model_resolver::{self, ModelSpec};
use faceprint_core::storage::domain::face_encodings::EncodingStructure;
use faceprint_core::storage::infrastructure::encodings_file::OutputFormat;

const EMBEDDING_MODEL: ModelSpec = ModelSpec {
    name: EMBEDDING_MODEL_NAME,
    url: Some(EMBEDDING_MODEL_URL),
};

/// Extract face encodings from a directory of per-person image folders.
#[derive(Parser, Debug)]
#[command(name = "encode-faces")]
struct Cli {
    /// Dataset root; each subdirectory holds images of one person.
    #[arg(short = 'i', long)]
    dataset: PathBuf,

    /// Output file for the serialized encodings.
    #[arg(short = 'e', long)]
    encodings: PathBuf,

    /// Face detector: cnn (accurate) or hog (fast).
    #[arg(short = 'd', long, default_value = "cnn")]
    detection_method: DetectionMethod,

    /// Store a k-d tree for fast nearest-neighbor lookup instead of a flat list.
    #[arg(long)]
    fast_nn: bool,

    /// Worker threads (default: available CPU cores).
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Face detection confidence threshold (0.0-1.0, default depends on the detector).
    #[arg(long)]
    confidence: Option<f64>,

    /// Maximum points per k-d tree leaf.
    #[arg(long, default_value_t = KDTREE_LEAF_SIZE)]
    leaf_size: usize,

    /// Output format: bincode or json (default: json for .json files, else bincode).
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Directory to look for model files before the cache.
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

impl Cli {
    fn workers(&self) -> usize {
        self.workers.unwrap_or_else(available_cores)
    }

    fn confidence(&self) -> f64 {
        self.confidence
            .unwrap_or_else(|| self.detection_method.default_confidence())
    }

    fn encode_config(&self) -> EncodeConfig {
        EncodeConfig {
            structure: if self.fast_nn {
                EncodingStructure::KdTree
            } else {
                EncodingStructure::List
            },
            leaf_size: self.leaf_size,
            format: OutputFormat::for_path(&self.encodings, self.format),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let workers = cli.workers();
    let intra_threads = (available_cores() / workers).max(1);
    log::info!(
        "Encoding {} with {} detector on {workers} worker(s)",
        cli.dataset.display(),
        cli.detection_method
    );

    let detector_model = resolve_model(&cli.detection_method.model(), cli.model_dir.as_deref())?;
    let embedding_model = resolve_model(&EMBEDDING_MODEL, cli.model_dir.as_deref())?;

    let mut encoders = Vec::with_capacity(workers);
    for _ in 0..workers {
        encoders.push(build_encoder(
            &cli,
            &detector_model,
            &embedding_model,
            intra_threads,
        )?);
    }

    let executor: Box<dyn EncodingExecutor> = if workers == 1 {
        let encoder = encoders.pop().ok_or("No encoder was built")?;
        Box::new(SequentialExecutor::new(encoder))
    } else {
        Box::new(ThreadedBatchExecutor::new(encoders)?)
    };

    let mut use_case = EncodeDatasetUseCase::new(
        executor,
        Box::new(StdoutPipelineLogger::default()),
        cli.encode_config(),
    );
    let encodings = use_case.execute(&cli.dataset, &cli.encodings)?;

    log::info!(
        "Wrote {} encodings ({}) to {}",
        encodings.len(),
        encodings.structure(),
        cli.encodings.display()
    );
    Ok(())
}

fn build_encoder(
    cli: &Cli,
    detector_model: &Path,
    embedding_model: &Path,
    intra_threads: usize,
) -> Result<Box<dyn ImageEncoder>, Box<dyn std::error::Error>> {
    let detector = create_detector(
        cli.detection_method,
        detector_model,
        cli.confidence(),
        intra_threads,
    )?;
    let embedder = OnnxArcfaceEmbedder::new(embedding_model, intra_threads)?;
    Ok(Box::new(EncodeImageUseCase::new(
        Box::new(ImageFileReader::new()),
        detector,
        Box::new(embedder),
    )))
}

fn resolve_model(
    spec: &ModelSpec,
    model_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", spec.name);
    let name = spec.name;
    let path = model_resolver::resolve(
        spec,
        model_dir,
        Some(Box::new(move |downloaded, total| {
            download_progress(name, downloaded, total)
        })),
    )?;
    log::debug!("Using {}", path.display());
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.dataset.exists() {
        return Err(format!("Dataset directory not found: {}", cli.dataset.display()).into());
    }
    if !cli.dataset.is_dir() {
        return Err(format!("Dataset path is not a directory: {}", cli.dataset.display()).into());
    }
    if cli.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    if let Some(confidence) = cli.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {confidence}"
            )
            .into());
        }
    }
    if cli.leaf_size == 0 {
        return Err("Leaf size must be at least 1".into());
    }
    if let Some(dir) = &cli.model_dir {
        if !dir.is_dir() {
            return Err(format!("Model directory not found: {}", dir.display()).into());
        }
    }
    Ok(())
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
