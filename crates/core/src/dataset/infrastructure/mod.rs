pub mod dataset_scanner;
