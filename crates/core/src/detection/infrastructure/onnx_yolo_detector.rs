/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, and NMS post-processing.
/// The pose variant of the model also yields five facial keypoints, which
/// the embedder uses for alignment.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;
use super::math::nms;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoints per detection (5 landmarks × 3 values each: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        confidence: f64,
        intra_threads: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path, intra_threads)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let letterboxed = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(letterboxed.tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let raw = decode_output(
            data,
            &shape,
            self.confidence,
            letterboxed.scale,
            letterboxed.pad_x,
            letterboxed.pad_y,
        )?;

        Ok(nms(raw, NMS_IOU_THRESH)
            .into_iter()
            .map(|b| b.clamped(frame.width(), frame.height()))
            .collect())
    }
}

/// Parse a YOLO-pose output tensor into boxes in original frame coordinates.
///
/// The tensor is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; rows are
/// `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            num_dets * num_feats
        )
        .into());
    }

    let unletterbox = |x: f64, y: f64| ((x - pad_x as f64) / scale, (y - pad_y as f64) / scale);

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let row: Vec<f32> = if transposed {
            (0..num_feats).map(|f| data[f * num_dets + i]).collect()
        } else {
            data[i * num_feats..(i + 1) * num_feats].to_vec()
        };

        if row.len() < 5 {
            continue;
        }
        let conf = row[4] as f64;
        if conf < confidence {
            continue;
        }

        let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
        let (x1, y1) = unletterbox(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = unletterbox(cx + w / 2.0, cy + h / 2.0);
        let mut face = FaceBox::new(x1, y1, x2, y2, conf);

        if row.len() >= 5 + NUM_KEYPOINT_VALUES {
            let mut pts = [(0.0f64, 0.0f64); 5];
            for (k, pt) in pts.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                    *pt = unletterbox(row[base] as f64, row[base + 1] as f64);
                }
            }
            face = face.with_landmarks(FaceLandmarks::new(pts));
        }

        boxes.push(face);
    }
    Ok(boxes)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size`, NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100);
        let lb = letterbox(&frame, 640);

        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert!((lb.scale - 3.2).abs() < 0.01);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50);
        let lb = letterbox(&frame, 640);

        let y = lb.pad_y as usize + 1;
        let x = lb.pad_x as usize + 1;
        assert!((lb.tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);
        assert!((lb.tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    fn row(cx: f32, cy: f32, w: f32, h: f32, conf: f32, kp_conf: f32) -> Vec<f32> {
        let mut r = vec![cx, cy, w, h, conf];
        for k in 0..5 {
            r.extend_from_slice(&[cx - 10.0 + k as f32 * 5.0, cy, kp_conf]);
        }
        r
    }

    /// Real outputs carry thousands of candidates; pad to more rows than
    /// features so the layout is unambiguous.
    fn padded(mut rows: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        let width = rows[0].len();
        while rows.len() <= width {
            rows.push(vec![0.0; width]);
        }
        rows
    }

    fn row_major(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<usize>) {
        let data = rows.iter().flatten().copied().collect();
        (data, vec![1, rows.len(), rows[0].len()])
    }

    fn feature_major(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<usize>) {
        let mut data = Vec::new();
        for f in 0..rows[0].len() {
            for r in rows {
                data.push(r[f]);
            }
        }
        (data, vec![1, rows[0].len(), rows.len()])
    }

    #[test]
    fn test_decode_row_major_output() {
        let rows = padded(vec![
            row(100.0, 100.0, 40.0, 60.0, 0.9, 0.9),
            row(300.0, 300.0, 40.0, 40.0, 0.1, 0.9),
        ]);
        let (data, shape) = row_major(&rows);
        let boxes = decode_output(&data, &shape, 0.25, 1.0, 0, 0).unwrap();

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].corners(), [80.0, 70.0, 120.0, 130.0]);
        assert!(boxes[0].landmarks.as_ref().unwrap().all_visible());
    }

    #[test]
    fn test_decode_transposed_output_matches_row_major() {
        let rows = padded(vec![
            row(100.0, 100.0, 40.0, 60.0, 0.9, 0.9),
            row(300.0, 300.0, 40.0, 40.0, 0.8, 0.9),
        ]);
        let (a_data, a_shape) = row_major(&rows);
        let (b_data, b_shape) = feature_major(&rows);

        let a = decode_output(&a_data, &a_shape, 0.25, 1.0, 0, 0).unwrap();
        let b = decode_output(&b_data, &b_shape, 0.25, 1.0, 0, 0).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_undoes_letterbox() {
        let rows = padded(vec![row(340.0, 340.0, 64.0, 64.0, 0.9, 0.9)]);
        let (data, shape) = row_major(&rows);
        let boxes = decode_output(&data, &shape, 0.25, 2.0, 20, 20).unwrap();
        assert_eq!(boxes[0].corners(), [144.0, 144.0, 176.0, 176.0]);
    }

    #[test]
    fn test_decode_low_confidence_keypoints_are_hidden() {
        let rows = padded(vec![row(100.0, 100.0, 40.0, 60.0, 0.9, 0.1)]);
        let (data, shape) = row_major(&rows);
        let boxes = decode_output(&data, &shape, 0.25, 1.0, 0, 0).unwrap();
        assert!(!boxes[0].landmarks.as_ref().unwrap().all_visible());
    }

    #[test]
    fn test_decode_without_keypoints() {
        let rows = padded(vec![vec![50.0, 50.0, 20.0, 20.0, 0.9]]);
        let (data, shape) = row_major(&rows);
        let boxes = decode_output(&data, &shape, 0.25, 1.0, 0, 0).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].landmarks.is_none());
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_output(&[0.0; 5], &[1, 5], 0.25, 1.0, 0, 0).is_err());
        assert!(decode_output(&[0.0; 5], &[1, 2, 20], 0.25, 1.0, 0, 0).is_err());
    }
}
