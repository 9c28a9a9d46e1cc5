use rayon::prelude::*;

use super::frame::Frame;

/// Number of intensity bins per colour channel.
pub const HISTOGRAM_BINS: usize = 256;

/// Score of two frames whose three channel histograms are identical.
pub const MAX_SIMILARITY: f64 = 3.0;

pub type ChannelHistograms = [[u32; HISTOGRAM_BINS]; 3];

/// Compares two frames and returns a similarity score; lower means more change.
pub trait SimilarityEstimator: Send + Sync {
    fn score(&self, previous: &Frame, current: &Frame) -> f64;
}

/// Sum over the R, G and B channels of the correlation between the two
/// frames' 256-bin histograms. Range is [-3, 3].
///
/// Both frames must have the same dimensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramCorrelation;

impl HistogramCorrelation {
    pub fn new() -> Self {
        Self
    }

    pub fn channel_histograms(frame: &Frame) -> ChannelHistograms {
        frame
            .data
            .par_chunks_exact(3)
            .fold(
                || [[0u32; HISTOGRAM_BINS]; 3],
                |mut hist, rgb| {
                    hist[0][rgb[0] as usize] += 1;
                    hist[1][rgb[1] as usize] += 1;
                    hist[2][rgb[2] as usize] += 1;
                    hist
                },
            )
            .reduce(
                || [[0u32; HISTOGRAM_BINS]; 3],
                |mut a, b| {
                    for (ca, cb) in a.iter_mut().zip(b.iter()) {
                        for (x, y) in ca.iter_mut().zip(cb.iter()) {
                            *x += y;
                        }
                    }
                    a
                },
            )
    }

    /// Pearson correlation of two histograms.
    ///
    /// Returns 1.0 when either histogram has no variance, matching the
    /// usual histogram-comparison convention.
    pub fn correlation(h1: &[u32; HISTOGRAM_BINS], h2: &[u32; HISTOGRAM_BINS]) -> f64 {
        let n = HISTOGRAM_BINS as f64;
        let (mut s1, mut s2, mut s11, mut s22, mut s12) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&a, &b) in h1.iter().zip(h2.iter()) {
            let (a, b) = (a as f64, b as f64);
            s1 += a;
            s2 += b;
            s11 += a * a;
            s22 += b * b;
            s12 += a * b;
        }

        let num = s12 - s1 * s2 / n;
        let denom2 = (s11 - s1 * s1 / n) * (s22 - s2 * s2 / n);
        if denom2.abs() > f64::EPSILON {
            num / denom2.sqrt()
        } else {
            1.0
        }
    }

    pub fn compare_histograms(a: &ChannelHistograms, b: &ChannelHistograms) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ha, hb)| Self::correlation(ha, hb))
            .sum()
    }
}

impl SimilarityEstimator for HistogramCorrelation {
    fn score(&self, previous: &Frame, current: &Frame) -> f64 {
        debug_assert_eq!(
            (previous.width, previous.height),
            (current.width, current.height),
            "frames must share dimensions"
        );
        let (prev, curr) = rayon::join(
            || Self::channel_histograms(previous),
            || Self::channel_histograms(current),
        );
        Self::compare_histograms(&prev, &curr)
    }
}
