use super::error::DetectError;
use super::frame::Frame;

/// Native properties of an opened video stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0 {
            self.width as f64 / self.height as f64
        } else {
            0.0
        }
    }
}

/// Seekable, frame-indexable decoding capability supplied by the host.
///
/// The handle is exclusively owned by one detection run; implementations
/// release decoder resources in `Drop`, which runs on every exit path.
pub trait VideoSource {
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the next frame in stream order. `Ok(None)` marks the end
    /// of the stream. A mid-stream decode failure is `SourceUnreadable`.
    fn next_frame(&mut self) -> Result<Option<Frame>, DetectError>;

    /// Re-decode the frame at an exact index, at native resolution.
    /// Failure to land on the frame is `SeekFailure`.
    fn seek_to(&mut self, frame_index: u64) -> Result<Frame, DetectError>;
}

/// Deterministic in-memory source built from solid-color segments.
///
/// Stands in for a real decoder in tests and demos, with optional
/// failure injection for the decode and seek paths.
pub struct SyntheticVideoSource {
    metadata: VideoMetadata,
    segments: Vec<(f64, [u8; 3])>, // (duration seconds, color)
    cursor: u64,
    fail_decode_at: Option<u64>,
    fail_seeks: bool,
    unreadable: bool,
}

impl SyntheticVideoSource {
    pub fn new(width: u32, height: u32, fps: f64, segments: Vec<(f64, [u8; 3])>) -> Self {
        let total_seconds: f64 = segments.iter().map(|(d, _)| d).sum();
        let frame_count = (total_seconds * fps).round() as u64;
        Self {
            metadata: VideoMetadata {
                fps,
                frame_count,
                width,
                height,
            },
            segments,
            cursor: 0,
            fail_decode_at: None,
            fail_seeks: false,
            unreadable: false,
        }
    }

    /// A source whose very first decode fails, as if the container could
    /// not be opened.
    pub fn unreadable(width: u32, height: u32, fps: f64) -> Self {
        let mut source = Self::new(width, height, fps, vec![]);
        source.unreadable = true;
        source
    }

    /// Inject a decode failure at the given frame index.
    pub fn fail_decode_at(mut self, frame_index: u64) -> Self {
        self.fail_decode_at = Some(frame_index);
        self
    }

    /// Make every exact-frame seek fail, as if the stream were corrupted.
    pub fn fail_seeks(mut self) -> Self {
        self.fail_seeks = true;
        self
    }

    fn color_at(&self, frame_index: u64) -> Option<[u8; 3]> {
        let t = frame_index as f64 / self.metadata.fps;
        let mut elapsed = 0.0;
        for (duration, color) in &self.segments {
            elapsed += duration;
            if t < elapsed {
                return Some(*color);
            }
        }
        None
    }

    fn render(&self, frame_index: u64) -> Option<Frame> {
        if frame_index >= self.metadata.frame_count {
            return None;
        }
        self.color_at(frame_index)
            .map(|color| Frame::filled(self.metadata.width, self.metadata.height, color))
    }
}

impl VideoSource for SyntheticVideoSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, DetectError> {
        if self.unreadable {
            return Err(DetectError::SourceUnreadable(
                "container could not be opened".into(),
            ));
        }
        if let Some(fail_at) = self.fail_decode_at {
            if self.cursor >= fail_at {
                return Err(DetectError::SourceUnreadable(format!(
                    "decode failed at frame {}",
                    self.cursor
                )));
            }
        }
        let frame = self.render(self.cursor);
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn seek_to(&mut self, frame_index: u64) -> Result<Frame, DetectError> {
        if self.unreadable || self.fail_seeks {
            return Err(DetectError::SeekFailure { frame_index });
        }
        self.cursor = frame_index + 1;
        self.render(frame_index)
            .ok_or(DetectError::SeekFailure { frame_index })
    }
}
