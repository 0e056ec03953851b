pub mod detector;

pub use detector::{
    detect_slides, CancelToken, DetectError, DetectionConfig, DetectionObserver, DetectionReport,
    DetectionWarning, Frame, FrameInfo, KeyframeRecord, KeyframeSink, RunStatus, SlideDetector,
    SlideEvent, SyntheticVideoSource, VecSink, VideoMetadata, VideoSource,
};
