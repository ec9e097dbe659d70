pub mod dataset;
pub mod detection;
pub mod embedding;
pub mod imaging;
pub mod indexing;
pub mod pipeline;
pub mod shared;
pub mod storage;
