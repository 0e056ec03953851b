use super::error::DetectError;
use super::frame::Frame;

/// Similarity of one sampled frame against the current reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    /// Correlation of joint color-channel histograms, in [0,1].
    pub histogram_score: f64,
    /// Windowed structural similarity, in [0,1].
    pub structural_score: f64,
    pub frame_index: u64,
}

/// Computes the two independent similarity measures used by the
/// transition state machine. Both are symmetric, and a frame scored
/// against itself yields exactly (1.0, 1.0).
pub struct SimilarityScorer {
    bins_per_channel: usize,
}

// SSIM stabilizers for 8-bit dynamic range: (0.01 * 255)^2, (0.03 * 255)^2.
const SSIM_C1: f64 = 6.5025;
const SSIM_C2: f64 = 58.5225;
const SSIM_WINDOW: usize = 8;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self {
            bins_per_channel: 256,
        }
    }

    pub fn with_bins(bins_per_channel: usize) -> Self {
        Self { bins_per_channel }
    }

    /// Score `current` against `reference`. Both frames must share the
    /// processing dimensions; a mismatch is a pipeline bug.
    pub fn score_pair(
        &self,
        reference: &Frame,
        current: &Frame,
        frame_index: u64,
    ) -> Result<PairScore, DetectError> {
        if reference.width != current.width || reference.height != current.height {
            return Err(DetectError::DimensionMismatch {
                expected_width: reference.width,
                expected_height: reference.height,
                actual_width: current.width,
                actual_height: current.height,
            });
        }

        let hist_a = self.color_histogram(reference);
        let hist_b = self.color_histogram(current);
        let histogram_score = Self::correlation(&hist_a, &hist_b);

        let gray_a = reference.to_grayscale();
        let gray_b = current.to_grayscale();
        let structural_score = Self::ssim(
            &gray_a,
            &gray_b,
            reference.width as usize,
            reference.height as usize,
        );

        Ok(PairScore {
            histogram_score,
            structural_score,
            frame_index,
        })
    }

    /// Joint per-channel histogram: R, G and B bins concatenated into
    /// one vector so a change in any channel's distribution lowers the
    /// correlation.
    fn color_histogram(&self, frame: &Frame) -> Vec<f64> {
        let bins = self.bins_per_channel;
        let mut hist = vec![0.0f64; bins * 3];
        for rgba in frame.data.chunks_exact(4) {
            for channel in 0..3 {
                let bin = rgba[channel] as usize * bins / 256;
                hist[channel * bins + bin.min(bins - 1)] += 1.0;
            }
        }
        hist
    }

    /// Pearson correlation clamped to [0,1]. Equal histograms short-cut
    /// to exactly 1.0 so reflexivity is not subject to rounding.
    fn correlation(a: &[f64], b: &[f64]) -> f64 {
        if a == b {
            return 1.0;
        }
        let n = a.len() as f64;
        let mean_a = a.iter().sum::<f64>() / n;
        let mean_b = b.iter().sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (&x, &y) in a.iter().zip(b.iter()) {
            let dx = x - mean_a;
            let dy = y - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }

        if var_a == 0.0 || var_b == 0.0 {
            return 0.0;
        }
        (cov / (var_a.sqrt() * var_b.sqrt())).clamp(0.0, 1.0)
    }

    /// Mean SSIM over non-overlapping windows of the grayscale planes,
    /// clamped to [0,1]. Images smaller than the window size use a
    /// single window covering the whole frame.
    fn ssim(a: &[u8], b: &[u8], width: usize, height: usize) -> f64 {
        if width == 0 || height == 0 {
            return 1.0;
        }
        let win = SSIM_WINDOW.min(width).min(height);

        let mut total = 0.0;
        let mut windows = 0u64;

        let mut y0 = 0;
        while y0 + win <= height {
            let mut x0 = 0;
            while x0 + win <= width {
                total += Self::ssim_window(a, b, width, x0, y0, win);
                windows += 1;
                x0 += win;
            }
            y0 += win;
        }

        if windows == 0 {
            return 1.0;
        }
        (total / windows as f64).clamp(0.0, 1.0)
    }

    fn ssim_window(a: &[u8], b: &[u8], stride: usize, x0: usize, y0: usize, win: usize) -> f64 {
        let n = (win * win) as f64;

        let mut sum_a = 0.0;
        let mut sum_b = 0.0;
        for y in y0..y0 + win {
            let row = y * stride;
            for x in x0..x0 + win {
                sum_a += a[row + x] as f64;
                sum_b += b[row + x] as f64;
            }
        }
        let mu_a = sum_a / n;
        let mu_b = sum_b / n;

        let mut var_a = 0.0;
        let mut var_b = 0.0;
        let mut cov = 0.0;
        for y in y0..y0 + win {
            let row = y * stride;
            for x in x0..x0 + win {
                let da = a[row + x] as f64 - mu_a;
                let db = b[row + x] as f64 - mu_b;
                var_a += da * da;
                var_b += db * db;
                cov += da * db;
            }
        }
        var_a /= n;
        var_b /= n;
        cov /= n;

        ((2.0 * mu_a * mu_b + SSIM_C1) * (2.0 * cov + SSIM_C2))
            / ((mu_a * mu_a + mu_b * mu_b + SSIM_C1) * (var_a + var_b + SSIM_C2))
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkered(width: u32, height: u32, a: [u8; 3], b: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let rgb = if (x + y) % 2 == 0 { a } else { b };
                data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        }
        Frame::new(width, height, data)
    }

    #[test]
    fn test_reflexive_scores_are_exact() {
        let scorer = SimilarityScorer::new();
        let frame = checkered(32, 32, [200, 40, 10], [10, 40, 200]);

        let score = scorer.score_pair(&frame, &frame, 7).unwrap();
        assert_eq!(score.histogram_score, 1.0);
        assert_eq!(score.structural_score, 1.0);
        assert_eq!(score.frame_index, 7);
    }

    #[test]
    fn test_scores_are_symmetric() {
        let scorer = SimilarityScorer::new();
        let a = checkered(32, 32, [200, 40, 10], [10, 40, 200]);
        let b = Frame::filled(32, 32, [128, 128, 128]);

        let ab = scorer.score_pair(&a, &b, 0).unwrap();
        let ba = scorer.score_pair(&b, &a, 0).unwrap();
        assert_eq!(ab.histogram_score, ba.histogram_score);
        assert_eq!(ab.structural_score, ba.structural_score);
    }

    #[test]
    fn test_distinct_colors_score_low_on_both() {
        let scorer = SimilarityScorer::new();
        let red = Frame::filled(32, 32, [255, 0, 0]);
        let blue = Frame::filled(32, 32, [0, 0, 255]);

        let score = scorer.score_pair(&red, &blue, 0).unwrap();
        assert!(score.histogram_score < 0.9, "{}", score.histogram_score);
        assert!(score.structural_score < 0.9, "{}", score.structural_score);
    }

    #[test]
    fn test_rearranged_layout_fools_histogram_but_not_ssim() {
        // Same pixel population, different spatial arrangement: the
        // histogram metric alone would miss this change.
        let scorer = SimilarityScorer::new();
        let mut left_red = Vec::new();
        let mut left_blue = Vec::new();
        for _y in 0..32u32 {
            for x in 0..32u32 {
                let (a, b) = if x < 16 {
                    ([255u8, 0, 0], [0u8, 0, 255])
                } else {
                    ([0u8, 0, 255], [255u8, 0, 0])
                };
                left_red.extend_from_slice(&[a[0], a[1], a[2], 255]);
                left_blue.extend_from_slice(&[b[0], b[1], b[2], 255]);
            }
        }
        let a = Frame::new(32, 32, left_red);
        let b = Frame::new(32, 32, left_blue);

        let score = scorer.score_pair(&a, &b, 0).unwrap();
        assert_eq!(score.histogram_score, 1.0);
        assert!(score.structural_score < 0.9, "{}", score.structural_score);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let scorer = SimilarityScorer::new();
        let a = checkered(17, 13, [0, 0, 0], [255, 255, 255]);
        let b = Frame::filled(17, 13, [255, 255, 255]);

        let score = scorer.score_pair(&a, &b, 0).unwrap();
        assert!((0.0..=1.0).contains(&score.histogram_score));
        assert!((0.0..=1.0).contains(&score.structural_score));
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let scorer = SimilarityScorer::new();
        let a = Frame::filled(32, 32, [0, 0, 0]);
        let b = Frame::filled(16, 16, [0, 0, 0]);

        assert!(matches!(
            scorer.score_pair(&a, &b, 0),
            Err(DetectError::DimensionMismatch {
                expected_width: 32,
                actual_width: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_tiny_frames_use_single_window() {
        let scorer = SimilarityScorer::new();
        let a = Frame::filled(3, 3, [10, 10, 10]);
        let b = Frame::filled(3, 3, [240, 240, 240]);

        let score = scorer.score_pair(&a, &b, 0).unwrap();
        assert!(score.structural_score < 1.0);
    }
}
