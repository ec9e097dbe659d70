pub mod detection_method;
pub mod face_detector;
pub mod face_landmarks;
