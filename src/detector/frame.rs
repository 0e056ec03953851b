use std::io::Cursor;

use image::{ImageOutputFormat, RgbImage};

/// RGBA pixel buffer decoded from a video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Solid-color frame, used by synthetic sources and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
        for chunk in self.data.chunks_exact(4) {
            rgb.push(chunk[0]);
            rgb.push(chunk[1]);
            rgb.push(chunk[2]);
        }
        rgb
    }

    /// Grayscale plane using integer BT.601 weights.
    pub fn to_grayscale(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .map(|rgba| {
                ((rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32, filter: image::imageops::FilterType) -> Frame {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame buffer matches its dimensions");
        let resized = image::imageops::resize(&img, target_width, target_height, filter);

        Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
        }
    }

    /// Downscale by a percentage of the current dimensions, preserving
    /// aspect ratio. 100% returns an unmodified clone.
    pub fn scale_by_percent(&self, percent: f32, filter: image::imageops::FilterType) -> Frame {
        if percent >= 100.0 {
            return self.clone();
        }
        let (w, h) = scaled_dimensions(self.width, self.height, percent);
        self.resize_to(w, h, filter)
    }

    /// JPEG-compress for persistence collaborators. Returns `None` for
    /// degenerate buffers rather than erroring.
    pub fn to_jpeg(&self, quality: u8) -> Option<Vec<u8>> {
        if self.data.is_empty() || self.width == 0 || self.height == 0 {
            return None;
        }
        let img = RgbImage::from_raw(self.width, self.height, self.to_rgb())?;
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))
            .ok()?;
        Some(buffer.into_inner())
    }
}

/// Dimensions after applying a scale percentage, clamped to at least 1x1.
pub fn scaled_dimensions(width: u32, height: u32, percent: f32) -> (u32, u32) {
    let scale = percent / 100.0;
    let w = ((width as f32 * scale).round() as u32).max(1);
    let h = ((height as f32 * scale).round() as u32).max(1);
    (w, h)
}

/// Lightweight frame metadata for hand-off to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub frame_index: u64,
    pub timestamp_seconds: f64,
}

/// A frame sampled during the detection pass, pre-scaled to the
/// processing resolution.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub frame_index: u64,
    pub timestamp_seconds: f64,
    pub image: Frame,
}

impl SampledFrame {
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            width: self.image.width,
            height: self.image.height,
            frame_index: self.frame_index,
            timestamp_seconds: self.timestamp_seconds,
        }
    }
}
