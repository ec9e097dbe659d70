pub mod encodings_file;
