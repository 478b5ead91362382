//! Engagement estimation
//!
//! Approximates time spent per item from the gaps between consecutive
//! activity timestamps. Gaps longer than the session-gap ceiling are treated
//! as breaks and left out of the mean.

use crate::config::PipelineConfig;
use crate::types::{EngagementEstimate, NormalizedDataset};

/// Estimator for the average per-item watch time
#[derive(Debug, Clone, Copy)]
pub struct EngagementEstimator {
    ceiling_sec: f64,
}

impl EngagementEstimator {
    /// Create an estimator that excludes gaps above `ceiling_sec`
    pub fn new(ceiling_sec: f64) -> Self {
        Self { ceiling_sec }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.session_gap_ceiling_sec)
    }

    pub fn ceiling_sec(&self) -> f64 {
        self.ceiling_sec
    }

    /// Mean of the `TimeDiff` values at or below the ceiling
    pub fn estimate(&self, dataset: &NormalizedDataset) -> EngagementEstimate {
        self.estimate_from_gaps(dataset.rows.iter().filter_map(|row| row.time_diff_sec))
    }

    fn estimate_from_gaps(&self, gaps: impl Iterator<Item = f64>) -> EngagementEstimate {
        let mut sum = 0.0;
        let mut sample_count = 0;
        let mut excluded_count = 0;

        for gap in gaps {
            if gap <= self.ceiling_sec {
                sum += gap;
                sample_count += 1;
            } else {
                excluded_count += 1;
            }
        }

        let average_seconds = if sample_count > 0 {
            Some(sum / sample_count as f64)
        } else {
            None
        };

        EngagementEstimate {
            average_seconds,
            sample_count,
            excluded_count,
            ceiling_sec: self.ceiling_sec,
        }
    }
}

/// Human-readable status line for an estimate
pub fn status_line(estimate: &EngagementEstimate) -> String {
    let ceiling = describe_ceiling(estimate.ceiling_sec);
    match estimate.average_seconds {
        Some(avg) => format!(
            "Average time spent per video (excluding breaks > {}): {:.2} seconds",
            ceiling, avg
        ),
        None => format!(
            "Average time spent per video (excluding breaks > {}): not available",
            ceiling
        ),
    }
}

/// "10 mins" for whole minutes, "90 secs" otherwise
fn describe_ceiling(ceiling_sec: f64) -> String {
    if ceiling_sec >= 60.0 && ceiling_sec % 60.0 == 0.0 {
        let minutes = (ceiling_sec / 60.0) as u64;
        if minutes == 1 {
            "1 min".to_string()
        } else {
            format!("{} mins", minutes)
        }
    } else {
        format!("{} secs", ceiling_sec)
    }
}
