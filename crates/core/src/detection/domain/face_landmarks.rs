//! Five-point face landmarks in source-image pixel coordinates.
//!
//! Order: left eye, right eye, nose tip, left mouth corner, right mouth corner.
//! Detectors report undetected points as `(0.0, 0.0)`.

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    /// Alignment needs every point; a partial set would skew the transform.
    pub fn all_visible(&self) -> bool {
        self.points.iter().all(|(x, _)| *x > 0.0)
    }

    pub fn as_f32(&self) -> [(f32, f32); 5] {
        self.points.map(|(x, y)| (x as f32, y as f32))
    }
}
