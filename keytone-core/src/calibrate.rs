//! Threshold calibration helpers for the external tuning UI.
//!
//! Pure math over recorded level histories — deliberately outside the
//! decision path; the core never adapts its own threshold.

use serde::Serialize;

/// Summary of a recorded level history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    /// Most recent reading.
    pub current: f32,
}

impl LevelStats {
    /// `None` for an empty history.
    pub fn from_history(levels: &[f32]) -> Option<Self> {
        let last = *levels.last()?;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f32;
        for &level in levels {
            min = min.min(level);
            max = max.max(level);
            sum += level;
        }
        Some(Self {
            min,
            max,
            avg: sum / levels.len() as f32,
            current: last,
        })
    }
}

/// Recommended threshold from ambient-level samples:
/// `max(avg + 10, max * 0.3)`, clamped into 0–100.
pub fn recommend_threshold(levels: &[f32]) -> Option<f32> {
    let stats = LevelStats::from_history(levels)?;
    Some((stats.avg + 10.0).max(stats.max * 0.3).clamp(0.0, 100.0))
}
