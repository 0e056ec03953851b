//! Slide-change detection over a decoded video stream.
//!
//! Pipeline, strictly ordered and single-pass per video:
//! 1. Sampler - decodes at a fixed scan rate, pre-scaled to a small
//!    processing resolution for cheap scoring
//! 2. Scorer - histogram correlation + structural similarity per pair
//! 3. State machine - confirmation streak + frame-gap debounce against
//!    the last confirmed reference frame
//! 4. Mapper - re-decodes confirmed frames at an independent target
//!    resolution
//! 5. Emitter - ordered hand-off to the persistence collaborator

pub mod emitter;
pub mod error;
pub mod frame;
pub mod mapper;
pub mod observer;
pub mod pipeline;
pub mod sampler;
pub mod scorer;
pub mod source;
pub mod state_machine;

pub use emitter::{KeyframeEmitter, KeyframeSink, VecSink};
pub use error::{DetectError, DetectionWarning};
pub use frame::{Frame, FrameInfo, SampledFrame};
pub use mapper::{KeyframeRecord, ResolutionMapper};
pub use observer::{DetectionObserver, NullObserver};
pub use pipeline::{detect_slides, DetectionConfig, DetectionReport, RunStatus, SlideDetector};
pub use sampler::{CancelToken, FrameSampler};
pub use scorer::{PairScore, SimilarityScorer};
pub use source::{SyntheticVideoSource, VideoMetadata, VideoSource};
pub use state_machine::{SlideEvent, TransitionConfig, TransitionStateMachine};
