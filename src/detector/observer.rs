//! Progress callbacks for long-running scans.
//!
//! A detection pass over a long video can take minutes. Hosts that need
//! responsiveness run the pass on a worker and install an observer to
//! surface progress; the core itself never blocks on reporting. All
//! methods default to no-ops so callers only override what they need.

use super::source::VideoMetadata;
use super::state_machine::SlideEvent;

/// Receives run lifecycle events. Implementations must be `Send + Sync`
/// because batch runs report from rayon worker threads.
pub trait DetectionObserver: Send + Sync {
    /// Called once after metadata is read, before any frame is scored.
    fn on_started(&self, _metadata: &VideoMetadata) {}

    /// Called every `progress_interval` sampled frames.
    fn on_progress(&self, _frames_scanned: u64, _total_frames: u64) {}

    /// Called for each confirmed slide change, in stream order.
    fn on_slide(&self, _event: &SlideEvent) {}

    /// Called once when the scan pass ends, on every exit path.
    fn on_finished(&self, _frames_scanned: u64) {}
}

/// Default observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl DetectionObserver for NullObserver {}
