//! Decoder timing configuration.
//!
//! Two independent groups: `ThresholdConfig` drives the signal segmenter,
//! `GapConfig` drives the Morse assembler. Both are re-read on every
//! evaluation, so runtime updates take effect on the next sample — never
//! retroactively (an already-armed auto-commit deadline keeps the window it
//! was armed with).

use serde::{Deserialize, Serialize};

use crate::error::{KeytoneError, Result};

/// Segmenter tuning: when the line counts as keyed, and how long a dash is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    /// Normalized loudness (0–100) above which the line counts as keyed.
    /// Equality counts as below threshold.
    pub threshold: f32,
    /// Nominal dot duration in milliseconds.
    pub dot_length_ms: u64,
    /// Dash cutoff as a multiple of the dot length: a signal lasting at
    /// least `dot_length_ms * dash_multiplier` classifies as a dash.
    pub dash_multiplier: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            dot_length_ms: 120,
            dash_multiplier: 1.6,
        }
    }
}

impl ThresholdConfig {
    /// Signal durations at or above this cutoff (ms) classify as dashes.
    pub fn dash_cutoff_ms(&self) -> f64 {
        self.dot_length_ms as f64 * self.dash_multiplier
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(KeytoneError::InvalidThreshold(self.threshold));
        }
        if self.dot_length_ms == 0 {
            return Err(KeytoneError::InvalidDotLength(self.dot_length_ms));
        }
        if !self.dash_multiplier.is_finite() || self.dash_multiplier <= 0.0 {
            return Err(KeytoneError::InvalidDashMultiplier(self.dash_multiplier));
        }
        Ok(())
    }
}

/// Assembler tuning: silence bands and the inactivity auto-commit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapConfig {
    /// Minimum silence (ms) that ends a letter without ending a word.
    pub letter_gap_ms: u64,
    /// Minimum silence (ms) that ends both a letter and the current word.
    pub word_gap_ms: u64,
    /// Inactivity window (ms) after which an in-progress letter is
    /// force-committed. `0` disables the auto-commit entirely.
    pub auto_commit_ms: u64,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            letter_gap_ms: 650,
            word_gap_ms: 1500,
            auto_commit_ms: 3000,
        }
    }
}

impl GapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.letter_gap_ms == 0 {
            return Err(KeytoneError::InvalidLetterGap(self.letter_gap_ms));
        }
        if self.word_gap_ms == 0 {
            return Err(KeytoneError::InvalidWordGap(self.word_gap_ms));
        }
        if self.letter_gap_ms > self.word_gap_ms {
            return Err(KeytoneError::GapBandOrder {
                letter_ms: self.letter_gap_ms,
                word_ms: self.word_gap_ms,
            });
        }
        Ok(())
    }
}

/// Partial settings update: only the fields present are applied, and the
/// merged result is validated as a whole before anything is committed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub threshold: Option<f32>,
    pub dot_length_ms: Option<u64>,
    pub dash_multiplier: Option<f64>,
    pub letter_gap_ms: Option<u64>,
    pub word_gap_ms: Option<u64>,
    pub auto_commit_ms: Option<u64>,
}

impl SettingsUpdate {
    /// Merge into `(thresholds, gaps)`. On rejection nothing is modified and
    /// the prior configuration stays in force.
    pub fn apply_to(&self, thresholds: &mut ThresholdConfig, gaps: &mut GapConfig) -> Result<()> {
        let mut next_thresholds = *thresholds;
        let mut next_gaps = *gaps;

        if let Some(v) = self.threshold {
            next_thresholds.threshold = v;
        }
        if let Some(v) = self.dot_length_ms {
            next_thresholds.dot_length_ms = v;
        }
        if let Some(v) = self.dash_multiplier {
            next_thresholds.dash_multiplier = v;
        }
        if let Some(v) = self.letter_gap_ms {
            next_gaps.letter_gap_ms = v;
        }
        if let Some(v) = self.word_gap_ms {
            next_gaps.word_gap_ms = v;
        }
        if let Some(v) = self.auto_commit_ms {
            next_gaps.auto_commit_ms = v;
        }

        next_thresholds.validate()?;
        next_gaps.validate()?;

        *thresholds = next_thresholds;
        *gaps = next_gaps;
        Ok(())
    }
}
