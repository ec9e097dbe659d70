pub mod alignment;
pub mod embedding;
pub mod face_embedder;
