use ndarray::ArrayView3;

/// A decoded RGB image: contiguous bytes in row-major order.
///
/// Decoding and color conversion happen at the imaging boundary; detectors
/// and embedders only ever see RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Channel value at `(x, y)`, or 0 outside the frame.
    pub fn sample(&self, x: i64, y: i64, channel: usize) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        self.data[(y as usize * self.width as usize + x as usize) * CHANNELS + channel]
    }

    /// Copy a rectangle out of the frame; the rectangle is clamped to the frame.
    ///
    /// Returns `None` when the clamped rectangle is empty.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Frame> {
        let x0 = x.min(self.width);
        let y0 = y.min(self.height);
        let x1 = x.saturating_add(width).min(self.width);
        let y1 = y.saturating_add(height).min(self.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let row_len = (x1 - x0) as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_len * (y1 - y0) as usize);
        for row in y0..y1 {
            let start = (row as usize * self.width as usize + x0 as usize) * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(data, x1 - x0, y1 - y0))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
