use thiserror::Error;

/// Fatal failures of a detection run.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("video source unreadable: {0}")]
    SourceUnreadable(String),
    #[error("failed to re-decode frame {frame_index} for capture")]
    SeekFailure { frame_index: u64 },
    #[error("frame dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("invalid configuration: {field}: {reason}")]
    ConfigurationInvalid {
        field: &'static str,
        reason: String,
    },
}

/// Recoverable conditions surfaced on the run report instead of
/// aborting. Nothing is silently swallowed.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionWarning {
    /// A confirmed slide could not be re-decoded at target resolution
    /// and was dropped from the output.
    CaptureSkipped {
        frame_index: u64,
        timestamp_seconds: f64,
    },
    /// The decode loop stopped before the end of the stream; output up
    /// to `last_frame_index` is still valid.
    DecodeStopped {
        last_frame_index: u64,
        message: String,
    },
}
