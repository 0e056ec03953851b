use super::error::DetectError;
use super::frame::SampledFrame;
use super::scorer::{PairScore, SimilarityScorer};

/// Thresholds and debounce settings for slide-change confirmation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionConfig {
    /// A pair is "dissimilar" only when the structural score is below
    /// this bound...
    pub similarity_threshold: f64,
    /// ...and the histogram score is below this one. Requiring both
    /// keeps recolored-but-identical layouts and global color washes
    /// from confirming on a single metric.
    pub histogram_threshold: f64,
    /// Minimum sampled frames between two confirmed changes.
    pub frame_gap: u32,
    /// Consecutive dissimilar pairs required to confirm a change.
    pub transition_limit: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            histogram_threshold: 0.9,
            frame_gap: 10,
            transition_limit: 3,
        }
    }
}

/// A confirmed transition to a new visually distinct frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideEvent {
    pub frame_index: u64,
    pub timestamp_seconds: f64,
}

/// Rolling confirmation state while comparing against a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionCandidate {
    /// Consecutive pairs scored below both thresholds.
    pub below_streak: u32,
    /// Sampled frames consumed since the last confirmed event.
    pub frames_since_change: u32,
}

impl TransitionCandidate {
    fn fresh() -> Self {
        Self {
            below_streak: 0,
            frames_since_change: 0,
        }
    }
}

#[derive(Debug)]
enum MachineState {
    /// No frame seen yet; the next frame becomes the reference and the
    /// initial event.
    AwaitingReference,
    /// Normal operation: every incoming frame is scored against the
    /// last confirmed slide, not its immediate predecessor.
    Comparing {
        reference: SampledFrame,
        candidate: TransitionCandidate,
    },
}

/// Decides which sampled frames are slide changes.
///
/// Emits at most one event per `frame_gap` window of sampled frames. A
/// streak that completes while the gap is still closed is suppressed
/// and reset without moving the reference, so rapid true changes
/// collapse onto the first one. That is a tunable tradeoff, not a
/// defect.
pub struct TransitionStateMachine {
    state: MachineState,
    config: TransitionConfig,
}

impl TransitionStateMachine {
    pub fn new() -> Self {
        Self::with_config(TransitionConfig::default())
    }

    pub fn with_config(config: TransitionConfig) -> Self {
        Self {
            state: MachineState::AwaitingReference,
            config,
        }
    }

    /// Feed the next sampled frame in stream order. Returns the
    /// confirmed event, if any, together with the pair score that was
    /// computed for it (the initial frame has no pair to score).
    pub fn advance(
        &mut self,
        frame: SampledFrame,
        scorer: &SimilarityScorer,
    ) -> Result<(Option<SlideEvent>, Option<PairScore>), DetectError> {
        match &mut self.state {
            MachineState::AwaitingReference => {
                let event = SlideEvent {
                    frame_index: frame.frame_index,
                    timestamp_seconds: frame.timestamp_seconds,
                };
                self.state = MachineState::Comparing {
                    reference: frame,
                    candidate: TransitionCandidate::fresh(),
                };
                Ok((Some(event), None))
            }
            MachineState::Comparing {
                reference,
                candidate,
            } => {
                let score =
                    scorer.score_pair(&reference.image, &frame.image, frame.frame_index)?;

                candidate.frames_since_change += 1;

                let dissimilar = score.histogram_score < self.config.histogram_threshold
                    && score.structural_score < self.config.similarity_threshold;
                if dissimilar {
                    candidate.below_streak += 1;
                } else {
                    candidate.below_streak = 0;
                }

                if candidate.below_streak < self.config.transition_limit {
                    return Ok((None, Some(score)));
                }

                // Streak complete. The gap decides whether this becomes
                // an event or is collapsed into the previous one.
                candidate.below_streak = 0;
                if candidate.frames_since_change < self.config.frame_gap {
                    return Ok((None, Some(score)));
                }

                let event = SlideEvent {
                    frame_index: frame.frame_index,
                    timestamp_seconds: frame.timestamp_seconds,
                };
                *reference = frame;
                *candidate = TransitionCandidate::fresh();
                Ok((Some(event), Some(score)))
            }
        }
    }

    /// Rolling counters, for inspection in tests and diagnostics.
    pub fn candidate(&self) -> Option<TransitionCandidate> {
        match &self.state {
            MachineState::AwaitingReference => None,
            MachineState::Comparing { candidate, .. } => Some(*candidate),
        }
    }

    /// Index of the frame currently used as the comparison reference.
    pub fn reference_index(&self) -> Option<u64> {
        match &self.state {
            MachineState::AwaitingReference => None,
            MachineState::Comparing { reference, .. } => Some(reference.frame_index),
        }
    }
}

impl Default for TransitionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
