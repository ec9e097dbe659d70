pub mod face_encodings;
