use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::emitter::{KeyframeEmitter, KeyframeSink, VecSink};
use super::error::{DetectError, DetectionWarning};
use super::mapper::{KeyframeRecord, ResolutionMapper};
use super::observer::{DetectionObserver, NullObserver};
use super::sampler::{CancelToken, FrameSampler};
use super::scorer::SimilarityScorer;
use super::source::VideoSource;
use super::state_machine::{TransitionConfig, TransitionStateMachine};

/// Full configuration of one detection run. Validated eagerly, before
/// any frame is decoded.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionConfig {
    /// Samples per second of source video examined by the scan pass.
    pub scan_rate_fps: f64,
    /// Scale used only for similarity scoring, 10-100% of native.
    pub processing_scale_percent: f32,
    /// Scale of the captured output images, 25-100% of native.
    /// Independent of the processing scale.
    pub target_resolution_percent: f32,
    pub histogram_threshold: f64,
    pub similarity_threshold: f64,
    pub frame_gap: u32,
    pub transition_limit: u32,
    /// Sampled frames between observer progress reports.
    pub progress_interval: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scan_rate_fps: 10.0,
            processing_scale_percent: 100.0,
            target_resolution_percent: 100.0,
            histogram_threshold: 0.9,
            similarity_threshold: 0.9,
            frame_gap: 10,
            transition_limit: 3,
            progress_interval: 50,
        }
    }
}

impl DetectionConfig {
    /// Quarter-resolution scan with full-quality captures. Roughly a
    /// 16x cheaper scoring pass on typical lecture footage.
    pub fn fast_quality() -> Self {
        Self {
            processing_scale_percent: 25.0,
            target_resolution_percent: 100.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> DetectError {
            DetectError::ConfigurationInvalid {
                field,
                reason: reason.into(),
            }
        }

        if !(self.scan_rate_fps > 0.0) {
            return Err(invalid("scan_rate_fps", "must be positive"));
        }
        if !(10.0..=100.0).contains(&self.processing_scale_percent) {
            return Err(invalid("processing_scale_percent", "must be in 10..=100"));
        }
        if !(25.0..=100.0).contains(&self.target_resolution_percent) {
            return Err(invalid("target_resolution_percent", "must be in 25..=100"));
        }
        if !(0.0..=1.0).contains(&self.histogram_threshold) {
            return Err(invalid("histogram_threshold", "must be in 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid("similarity_threshold", "must be in 0..=1"));
        }
        if self.frame_gap == 0 {
            return Err(invalid("frame_gap", "must be at least 1"));
        }
        if self.transition_limit == 0 {
            return Err(invalid("transition_limit", "must be at least 1"));
        }
        if self.progress_interval == 0 {
            return Err(invalid("progress_interval", "must be at least 1"));
        }
        Ok(())
    }

    fn transition(&self) -> TransitionConfig {
        TransitionConfig {
            similarity_threshold: self.similarity_threshold,
            histogram_threshold: self.histogram_threshold,
            frame_gap: self.frame_gap,
            transition_limit: self.transition_limit,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Stopped via the cancel token; partial output is valid.
    Cancelled,
    /// The decode loop failed mid-stream; partial output is valid.
    SourceLost,
}

/// Result of one detection run. Recoverable problems are listed in
/// `warnings`; `keyframes` holds whatever was produced up to the end
/// of the run, even when the run did not complete.
#[derive(Debug)]
pub struct DetectionReport {
    pub keyframes: Vec<KeyframeRecord>,
    pub warnings: Vec<DetectionWarning>,
    pub status: RunStatus,
    pub frames_scanned: u64,
}

impl DetectionReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Orchestrates the sampler → scorer → state machine → mapper →
/// emitter pipeline for one video at a time.
pub struct SlideDetector {
    config: DetectionConfig,
    observer: Arc<dyn DetectionObserver>,
    cancel: CancelToken,
}

impl SlideDetector {
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default())
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NullObserver),
            cancel: CancelToken::new(),
        }
    }

    pub fn observer(mut self, observer: Arc<dyn DetectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Handle the host can use to abort a long scan between frames.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run detection and collect the keyframes into the report.
    ///
    /// `Err` is reserved for caller bugs (invalid configuration, or a
    /// dimension mismatch inside the pipeline). Decode loss and
    /// cancellation produce an `Ok` report carrying partial output and
    /// a non-`Completed` status.
    pub fn detect<S: VideoSource>(&self, source: S) -> Result<DetectionReport, DetectError> {
        let mut sink = VecSink::new();
        let mut report = self.detect_into(source, &mut sink)?;
        report.keyframes = sink.into_records();
        Ok(report)
    }

    /// Streaming variant: keyframes go to `sink` as they are captured
    /// and `report.keyframes` stays empty.
    pub fn detect_into<S: VideoSource>(
        &self,
        source: S,
        sink: &mut dyn KeyframeSink,
    ) -> Result<DetectionReport, DetectError> {
        self.config.validate()?;

        let metadata = source.metadata().clone();
        info!(
            "scanning {}x{} @ {:.2} fps, {} frames, processing scale {}%",
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count,
            self.config.processing_scale_percent
        );
        self.observer.on_started(&metadata);

        let mut sampler = FrameSampler::new(
            source,
            self.config.scan_rate_fps,
            self.config.processing_scale_percent,
            self.cancel.clone(),
        );
        let scorer = SimilarityScorer::new();
        let mut machine = TransitionStateMachine::with_config(self.config.transition());

        let mut events = Vec::new();
        let mut warnings = Vec::new();
        let mut frames_scanned: u64 = 0;
        let mut last_frame_index: u64 = 0;
        let mut decode_lost = false;

        for item in sampler.by_ref() {
            match item {
                Ok(frame) => {
                    frames_scanned += 1;
                    last_frame_index = frame.frame_index;
                    let (event, _score) = machine.advance(frame, &scorer)?;
                    if let Some(event) = event {
                        debug!(
                            "slide change at frame {} ({:.2}s)",
                            event.frame_index, event.timestamp_seconds
                        );
                        self.observer.on_slide(&event);
                        events.push(event);
                    }
                    if frames_scanned % self.config.progress_interval == 0 {
                        self.observer
                            .on_progress(last_frame_index + 1, metadata.frame_count);
                    }
                }
                Err(err) => {
                    warn!("decode stopped at frame {last_frame_index}: {err}");
                    warnings.push(DetectionWarning::DecodeStopped {
                        last_frame_index,
                        message: err.to_string(),
                    });
                    decode_lost = true;
                }
            }
        }

        let cancelled = sampler.was_cancelled();
        let mut source = sampler.into_source();
        self.observer.on_finished(frames_scanned);

        let mapper = ResolutionMapper::new(self.config.target_resolution_percent);
        let records = mapper.resolve_all(&mut source, &events, &mut warnings);

        let mut emitter = KeyframeEmitter::new();
        for record in records {
            emitter.emit(record, sink);
        }

        let status = if decode_lost {
            RunStatus::SourceLost
        } else if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        info!(
            "run finished: {} slides, {} warnings, status {:?}",
            emitter.emitted(),
            warnings.len(),
            status
        );

        Ok(DetectionReport {
            keyframes: Vec::new(),
            warnings,
            status,
            frames_scanned,
        })
    }

    /// Detect across independent videos in parallel. Each source gets
    /// an isolated run; results keep the input order.
    pub fn detect_batch<S: VideoSource + Send>(
        &self,
        sources: Vec<S>,
    ) -> Vec<Result<DetectionReport, DetectError>> {
        sources
            .into_par_iter()
            .map(|source| self.detect(source))
            .collect()
    }
}

impl Default for SlideDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience entry point: one run with the given configuration.
pub fn detect_slides<S: VideoSource>(
    source: S,
    config: &DetectionConfig,
) -> Result<DetectionReport, DetectError> {
    SlideDetector::with_config(config.clone()).detect(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::source::SyntheticVideoSource;

    const COLOR_A: [u8; 3] = [255, 0, 0];
    const COLOR_B: [u8; 3] = [0, 0, 255];

    fn static_video() -> SyntheticVideoSource {
        SyntheticVideoSource::new(64, 48, 10.0, vec![(10.0, COLOR_A)])
    }

    fn two_slide_video() -> SyntheticVideoSource {
        SyntheticVideoSource::new(64, 48, 10.0, vec![(5.0, COLOR_A), (5.0, COLOR_B)])
    }

    fn config(frame_gap: u32, transition_limit: u32) -> DetectionConfig {
        DetectionConfig {
            scan_rate_fps: 10.0,
            frame_gap,
            transition_limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_static_video_yields_single_keyframe() {
        let report = detect_slides(static_video(), &DetectionConfig::default()).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.keyframes.len(), 1);
        assert_eq!(report.keyframes[0].frame_index, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_abrupt_change_yields_second_keyframe() {
        let report = detect_slides(two_slide_video(), &config(5, 3)).unwrap();

        assert_eq!(report.keyframes.len(), 2);
        assert_eq!(report.keyframes[0].frame_index, 0);

        // Confirmation takes transition_limit consecutive dissimilar
        // samples, so the event lands just after the 5-second cut.
        let second = &report.keyframes[1];
        assert!(second.timestamp_seconds >= 5.0);
        assert!(second.timestamp_seconds <= 5.0 + 3.0 * 0.1 + 1e-9);
    }

    #[test]
    fn test_gap_larger_than_video_suppresses_change() {
        let report = detect_slides(two_slide_video(), &config(100, 3)).unwrap();

        assert_eq!(report.keyframes.len(), 1);
        assert_eq!(report.keyframes[0].frame_index, 0);
    }

    #[test]
    fn test_debounce_invariant_on_output() {
        let source = SyntheticVideoSource::new(
            64,
            48,
            10.0,
            vec![(2.0, COLOR_A), (2.0, COLOR_B), (2.0, COLOR_A), (2.0, COLOR_B)],
        );
        let report = detect_slides(source, &config(5, 2)).unwrap();

        assert!(report.keyframes.len() >= 2);
        for pair in report.keyframes.windows(2) {
            assert!(pair[1].frame_index - pair[0].frame_index >= 5);
            assert!(pair[1].timestamp_seconds > pair[0].timestamp_seconds);
        }
    }

    #[test]
    fn test_dual_resolution_output_is_native_size() {
        let detector_config = DetectionConfig {
            processing_scale_percent: 25.0,
            target_resolution_percent: 100.0,
            ..config(5, 3)
        };
        let report = detect_slides(two_slide_video(), &detector_config).unwrap();

        assert_eq!(report.keyframes.len(), 2);
        for record in &report.keyframes {
            assert_eq!(record.image.width, 64);
            assert_eq!(record.image.height, 48);
        }
    }

    #[test]
    fn test_unreadable_source_reports_empty_partial() {
        let source = SyntheticVideoSource::unreadable(64, 48, 10.0);
        let report = detect_slides(source, &DetectionConfig::default()).unwrap();

        assert_eq!(report.status, RunStatus::SourceLost);
        assert!(report.keyframes.is_empty());
        assert!(matches!(
            report.warnings.as_slice(),
            [DetectionWarning::DecodeStopped { .. }]
        ));
    }

    #[test]
    fn test_mid_stream_decode_loss_keeps_partial_output() {
        let source = SyntheticVideoSource::new(
            64,
            48,
            10.0,
            vec![(3.0, COLOR_A), (7.0, COLOR_B)],
        )
        .fail_decode_at(60);
        let report = detect_slides(source, &config(5, 3)).unwrap();

        assert_eq!(report.status, RunStatus::SourceLost);
        // Both the initial slide and the confirmed change at ~3s were
        // produced before the stream died at frame 60.
        assert_eq!(report.keyframes.len(), 2);
    }

    #[test]
    fn test_seek_failures_are_recoverable_warnings() {
        let source =
            SyntheticVideoSource::new(64, 48, 10.0, vec![(10.0, COLOR_A)]).fail_seeks();
        let report = detect_slides(source, &DetectionConfig::default()).unwrap();

        assert!(report.is_complete());
        assert!(report.keyframes.is_empty());
        assert_eq!(
            report.warnings,
            vec![DetectionWarning::CaptureSkipped {
                frame_index: 0,
                timestamp_seconds: 0.0
            }]
        );
    }

    #[test]
    fn test_detection_is_idempotent() {
        let cfg = config(5, 3);
        let a = detect_slides(two_slide_video(), &cfg).unwrap();
        let b = detect_slides(two_slide_video(), &cfg).unwrap();

        let key = |report: &DetectionReport| -> Vec<(u64, f64)> {
            report
                .keyframes
                .iter()
                .map(|r| (r.frame_index, r.timestamp_seconds))
                .collect()
        };
        assert_eq!(key(&a), key(&b));
        assert_eq!(
            a.keyframes[1].image.data,
            b.keyframes[1].image.data
        );
    }

    #[test]
    fn test_cancellation_before_start_yields_empty_cancelled_run() {
        let detector = SlideDetector::with_config(DetectionConfig::default());
        detector.cancel_token().cancel();

        let report = detector.detect(static_video()).unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.keyframes.is_empty());
        assert_eq!(report.frames_scanned, 0);
    }

    #[test]
    fn test_invalid_configuration_rejected_before_decoding() {
        let bad = DetectionConfig {
            processing_scale_percent: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            detect_slides(static_video(), &bad),
            Err(DetectError::ConfigurationInvalid {
                field: "processing_scale_percent",
                ..
            })
        ));

        let bad = DetectionConfig {
            frame_gap: 0,
            ..Default::default()
        };
        assert!(matches!(
            detect_slides(static_video(), &bad),
            Err(DetectError::ConfigurationInvalid {
                field: "frame_gap",
                ..
            })
        ));
    }

    #[test]
    fn test_batch_runs_are_isolated_and_ordered() {
        let detector = SlideDetector::with_config(config(5, 3));
        let reports = detector.detect_batch(vec![static_video(), two_slide_video()]);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].as_ref().unwrap().keyframes.len(), 1);
        assert_eq!(reports[1].as_ref().unwrap().keyframes.len(), 2);
    }

    #[test]
    fn test_streaming_sink_receives_records_in_order() {
        let detector = SlideDetector::with_config(config(5, 3));
        let mut sink = VecSink::new();
        let report = detector.detect_into(two_slide_video(), &mut sink).unwrap();

        assert!(report.keyframes.is_empty());
        let indices: Vec<u64> = sink.records.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices.len(), 2);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_fast_quality_preset_validates() {
        let cfg = DetectionConfig::fast_quality();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.processing_scale_percent, 25.0);
        assert_eq!(cfg.target_resolution_percent, 100.0);
    }
}
