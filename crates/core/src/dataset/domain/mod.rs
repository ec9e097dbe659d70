pub mod labeled_image;
