use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::error::DetectError;
use super::frame::SampledFrame;
use super::source::VideoSource;

/// Cooperative cancellation signal shared with the host. Cloned handles
/// observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lazy, finite, single-pass sequence of frames sampled at a fixed scan
/// rate and pre-scaled to the processing resolution.
///
/// The sampler owns the source for the duration of the scan pass;
/// `into_source` hands the handle back for the capture pass. The
/// iterator is fused: after exhaustion, a decode error, or
/// cancellation it keeps returning `None`. Restarting requires
/// reopening the video.
pub struct FrameSampler<S: VideoSource> {
    source: S,
    stride: u64,
    fps: f64,
    processing_scale_percent: f32,
    cancel: CancelToken,
    next_index: u64,
    done: bool,
    cancelled: bool,
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(
        source: S,
        scan_rate_fps: f64,
        processing_scale_percent: f32,
        cancel: CancelToken,
    ) -> Self {
        let fps = source.metadata().fps;
        let stride = if fps > 0.0 && scan_rate_fps > 0.0 {
            ((fps / scan_rate_fps).round() as u64).max(1)
        } else {
            1
        };
        Self {
            source,
            stride,
            fps,
            processing_scale_percent,
            cancel,
            next_index: 0,
            done: false,
            cancelled: false,
        }
    }

    /// Original-frame distance between consecutive samples.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Release the underlying source after the scan pass.
    pub fn into_source(self) -> S {
        self.source
    }

    fn timestamp_of(&self, frame_index: u64) -> f64 {
        if self.fps > 0.0 {
            frame_index as f64 / self.fps
        } else {
            0.0
        }
    }
}

impl<S: VideoSource> Iterator for FrameSampler<S> {
    type Item = Result<SampledFrame, DetectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            self.cancelled = true;
            return None;
        }

        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            let index = self.next_index;
            self.next_index += 1;

            if index % self.stride != 0 {
                continue;
            }

            let image = frame.scale_by_percent(
                self.processing_scale_percent,
                image::imageops::FilterType::Triangle,
            );
            return Some(Ok(SampledFrame {
                frame_index: index,
                timestamp_seconds: self.timestamp_of(index),
                image,
            }));
        }
    }
}
