use log::warn;

use super::error::{DetectError, DetectionWarning};
use super::frame::{Frame, FrameInfo};
use super::source::VideoSource;
use super::state_machine::SlideEvent;

/// Final output unit: the captured slide at target resolution.
#[derive(Debug, Clone)]
pub struct KeyframeRecord {
    pub frame_index: u64,
    pub timestamp_seconds: f64,
    pub image: Frame,
}

impl KeyframeRecord {
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            width: self.image.width,
            height: self.image.height,
            frame_index: self.frame_index,
            timestamp_seconds: self.timestamp_seconds,
        }
    }
}

/// Resolves confirmed events back to full-detail frames.
///
/// Detection runs at the (small) processing resolution; the capture
/// resolution is an independent knob so output quality does not pay
/// for scan speed. The two scales flow through distinct image buffers
/// and never collapse into one setting.
pub struct ResolutionMapper {
    target_resolution_percent: f32,
}

impl ResolutionMapper {
    pub fn new(target_resolution_percent: f32) -> Self {
        Self {
            target_resolution_percent,
        }
    }

    /// Re-decode the event's exact frame at native resolution and scale
    /// it to the target percent. 100% keeps the native buffer
    /// untouched; the mapper never upsamples beyond native.
    pub fn resolve<S: VideoSource>(
        &self,
        source: &mut S,
        event: &SlideEvent,
    ) -> Result<KeyframeRecord, DetectError> {
        let native = source.seek_to(event.frame_index)?;
        let image = native.scale_by_percent(
            self.target_resolution_percent,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(KeyframeRecord {
            frame_index: event.frame_index,
            timestamp_seconds: event.timestamp_seconds,
            image,
        })
    }

    /// Resolve a batch of events in order. A frame that cannot be
    /// re-decoded is dropped with a warning; partial results beat
    /// aborting a long run.
    pub fn resolve_all<S: VideoSource>(
        &self,
        source: &mut S,
        events: &[SlideEvent],
        warnings: &mut Vec<DetectionWarning>,
    ) -> Vec<KeyframeRecord> {
        let mut records = Vec::with_capacity(events.len());
        for event in events {
            match self.resolve(source, event) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        "dropping slide at frame {}: {err}",
                        event.frame_index
                    );
                    warnings.push(DetectionWarning::CaptureSkipped {
                        frame_index: event.frame_index,
                        timestamp_seconds: event.timestamp_seconds,
                    });
                }
            }
        }
        records
    }
}
