pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// BlazeFace has no published download; it must be placed in the model directory.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Images per batch = workers * BATCH_MULTIPLIER.
pub const BATCH_MULTIPLIER: usize = 4;

/// Default k-d tree leaf size.
pub const KDTREE_LEAF_SIZE: usize = 40;

/// Bumped whenever the serialized encodings layout changes.
pub const ENCODINGS_FORMAT_VERSION: u32 = 1;
