pub mod sequential_executor;
pub mod threaded_batch_executor;
