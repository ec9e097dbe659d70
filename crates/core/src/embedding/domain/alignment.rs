//! Face normalization ahead of embedding.
//!
//! Faces with a full set of landmarks are warped onto the five InsightFace
//! reference points with a 4-DOF similarity transform. Faces without
//! landmarks are cropped to their box and resized.

use crate::shared::face_box::FaceBox;
use crate::shared::frame::{Frame, CHANNELS};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Produce a 112×112 RGB face chip for `face`.
///
/// Returns `None` when the face has no usable landmarks and its box is empty.
pub fn face_chip(frame: &Frame, face: &FaceBox) -> Option<Frame> {
    match face.landmarks.as_ref() {
        Some(lm) if lm.all_visible() => Some(align_face(frame, &lm.as_f32())),
        _ => crop_and_resize(frame, face),
    }
}

/// Warp the face so its landmarks land on the reference positions.
pub fn align_face(frame: &Frame, landmarks: &[(f32, f32); 5]) -> Frame {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(frame, &matrix, ALIGNED_SIZE)
}

/// Nearest-neighbor resize of the box contents to 112×112.
pub fn crop_and_resize(frame: &Frame, face: &FaceBox) -> Option<Frame> {
    let (x, y, w, h) = face.pixel_rect();
    let crop = frame.crop(x, y, w, h)?;

    let out = ALIGNED_SIZE as usize;
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let mut data = Vec::with_capacity(out * out * CHANNELS);
    for oy in 0..out {
        let sy = (((oy as f64 + 0.5) * src_h as f64 / out as f64) as usize).min(src_h - 1);
        for ox in 0..out {
            let sx = (((ox as f64 + 0.5) * src_w as f64 / out as f64) as usize).min(src_w - 1);
            for c in 0..CHANNELS {
                data.push(crop.sample(sx as i64, sy as i64, c));
            }
        }
    }
    Some(Frame::new(data, ALIGNED_SIZE, ALIGNED_SIZE))
}

/// Estimate a 2×3 similarity transform (scale, rotation, translation)
/// from `src` landmarks to `dst` landmarks using least-squares.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations for A * [a, b, tx, ty]^T = B, two rows per point:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [[0.0f64; 4]; 4];
    let mut atb = [0.0f64; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy, dx, dy) = (sx as f64, sy as f64, dx as f64, dy as f64);
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j][k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let [a, b, tx, ty] = solve_4x4(ata, atb).map(|v| v as f32);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting.
///
/// A singular system (all landmarks coincide) yields the identity scale.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(a: [[f64; 4]; 4], b: [f64; 4]) -> [f64; 4] {
    let mut m = [[0.0f64; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&a[i]);
        m[i][4] = b[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        for row in (col + 1)..4 {
            if m[row][col].abs() > m[max_row][col].abs() {
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f64; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Apply a 2×3 similarity warp with bilinear sampling; outside pixels are black.
fn warp_affine(frame: &Frame, matrix: &[f32; 6], out_size: u32) -> Frame {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);
    let out = out_size as usize;

    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return Frame::new(vec![0u8; out * out * CHANNELS], out_size, out_size);
    }
    let ia = a / det;
    let ib = b / det;

    let mut data = Vec::with_capacity(out * out * CHANNELS);
    for oy in 0..out {
        for ox in 0..out {
            // src = M⁻¹ · (dst - t)
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i64;
            let y0 = sy.floor() as i64;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for c in 0..CHANNELS {
                let val = frame.sample(x0, y0, c) as f32 * (1.0 - fx) * (1.0 - fy)
                    + frame.sample(x0 + 1, y0, c) as f32 * fx * (1.0 - fy)
                    + frame.sample(x0, y0 + 1, c) as f32 * (1.0 - fx) * fy
                    + frame.sample(x0 + 1, y0 + 1, c) as f32 * fx * fy;
                data.push(val.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    Frame::new(data, out_size, out_size)
}
