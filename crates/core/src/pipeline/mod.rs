pub mod encode_dataset_use_case;
pub mod encode_image_use_case;
pub mod encoding_executor;
pub mod image_encoder;
pub mod infrastructure;
pub mod pipeline_logger;
