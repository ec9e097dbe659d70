use crate::detection::domain::face_landmarks::FaceLandmarks;

/// A detected face in source-image pixel coordinates.
///
/// Corners are `[x1, y1)` to `[x2, y2)`; detectors clamp them to the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    pub landmarks: Option<FaceLandmarks>,
}

impl FaceBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: FaceLandmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Clamp all corners into a `frame_w × frame_h` frame.
    pub fn clamped(mut self, frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        self.x1 = self.x1.clamp(0.0, fw);
        self.y1 = self.y1.clamp(0.0, fh);
        self.x2 = self.x2.clamp(0.0, fw);
        self.y2 = self.y2.clamp(0.0, fh);
        self
    }

    /// Integer pixel rectangle `(x, y, width, height)` covering the box.
    pub fn pixel_rect(&self) -> (u32, u32, u32, u32) {
        let x = self.x1.max(0.0).floor() as u32;
        let y = self.y1.max(0.0).floor() as u32;
        let x2 = self.x2.max(0.0).ceil() as u32;
        let y2 = self.y2.max(0.0).ceil() as u32;
        (x, y, x2.saturating_sub(x), y2.saturating_sub(y))
    }
}
