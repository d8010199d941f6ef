//! Signal segmentation: amplitude stream → classified symbols and gaps.
//!
//! ## Algorithm (per sample)
//!
//! 1. `above = level > threshold` (equality counts as below).
//! 2. Rising edge while idle or in a gap: close the gap window (its duration
//!    is reported now, at the moment the next signal begins) and open an
//!    active window.
//! 3. Falling edge while active: close the active window, classify it
//!    against `dot_length_ms * dash_multiplier` (boundary inclusive toward
//!    dash), emit the symbol, open a gap window.
//! 4. No edge: nothing to report.

use std::time::{Duration, Instant};

use crate::{alphabet::Symbol, buffering::sample::AmplitudeSample, config::ThresholdConfig};

/// Exclusive window state; the initial state is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalState {
    /// No signal seen yet (or state was cleared).
    #[default]
    Idle,
    /// The line is keyed; the active window opened at this instant.
    Active(Instant),
    /// The line is silent after at least one signal; the gap opened here.
    Gap(Instant),
}

/// Emitted when a sample closes a window. A sample closes at most one
/// window, so `ingest` returns at most one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEvent {
    /// A completed active-signal interval, classified.
    Symbol { symbol: Symbol, duration: Duration },
    /// A completed low-amplitude interval.
    Gap { duration: Duration },
}

/// Stateful classifier over the amplitude stream.
///
/// Owns nothing but its window state; the threshold configuration is passed
/// in on each call so runtime updates apply to the next sample.
#[derive(Debug, Clone, Default)]
pub struct SignalSegmenter {
    state: SignalState,
}

impl SignalSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current window state.
    pub fn state(&self) -> SignalState {
        self.state
    }

    /// True while an active-signal window is open.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), SignalState::Active(_))
    }

    /// Advance the state machine by one sample.
    pub fn ingest(
        &mut self,
        sample: AmplitudeSample,
        config: &ThresholdConfig,
    ) -> Option<SegmentEvent> {
        let above = sample.normalized_level() > config.threshold;
        let now = sample.at;

        match self.state() {
            SignalState::Idle if above => {
                self.state = SignalState::Active(now);
                None
            }
            SignalState::Gap(gap_start) if above => {
                let duration = now.duration_since(gap_start);
                self.state = SignalState::Active(now);
                Some(SegmentEvent::Gap { duration })
            }
            SignalState::Active(active_start) if !above => {
                let duration = now.duration_since(active_start);
                self.state = SignalState::Gap(now);
                Some(SegmentEvent::Symbol {
                    symbol: classify(duration, config),
                    duration,
                })
            }
            _ => None,
        }
    }

    /// Finalize an in-flight active window at stream termination so no
    /// trailing signal is silently lost. A pending gap window is discarded.
    pub fn finalize(&mut self, now: Instant, config: &ThresholdConfig) -> Option<SegmentEvent> {
        let event = match self.state() {
            SignalState::Active(active_start) => {
                let duration = now.duration_since(active_start);
                Some(SegmentEvent::Symbol {
                    symbol: classify(duration, config),
                    duration,
                })
            }
            _ => None,
        };
        self.state = SignalState::Idle;
        event
    }

    /// Drop all pending window state without emitting.
    pub fn reset(&mut self) {
        self.state = SignalState::Idle;
    }
}

/// Dash if the interval reaches the cutoff, dot otherwise (the boundary
/// itself counts as dash).
fn classify(duration: Duration, config: &ThresholdConfig) -> Symbol {
    if duration.as_secs_f64() * 1000.0 >= config.dash_cutoff_ms() {
        Symbol::Dash
    } else {
        Symbol::Dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(level: f32, base: Instant, offset_ms: u64) -> AmplitudeSample {
        AmplitudeSample::new(level, base + Duration::from_millis(offset_ms))
    }

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::default() // threshold 30, dot 120 ms, dash ×1.6
    }

    #[test]
    fn first_signal_opens_active_without_a_gap_event() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        assert_eq!(seg.ingest(sample(80.0, base, 0), &cfg()), None);
        assert!(seg.is_active());
    }

    #[test]
    fn level_equal_to_threshold_counts_as_below() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        assert_eq!(seg.ingest(sample(30.0, base, 0), &cfg()), None);
        assert_eq!(seg.state(), SignalState::Idle);
    }

    #[test]
    fn short_signal_classifies_as_dot() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        let event = seg.ingest(sample(0.0, base, 100), &cfg());
        assert_eq!(
            event,
            Some(SegmentEvent::Symbol {
                symbol: Symbol::Dot,
                duration: Duration::from_millis(100)
            })
        );
        assert_eq!(seg.state(), SignalState::Gap(base + Duration::from_millis(100)));
    }

    #[test]
    fn dash_boundary_is_inclusive() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        // Exactly dot_length * multiplier = 192 ms → dash, not dot.
        let event = seg.ingest(sample(0.0, base, 192), &cfg());
        assert_eq!(
            event,
            Some(SegmentEvent::Symbol {
                symbol: Symbol::Dash,
                duration: Duration::from_millis(192)
            })
        );
    }

    #[test]
    fn just_under_the_cutoff_is_a_dot() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        let event = seg.ingest(sample(0.0, base, 191), &cfg());
        assert!(matches!(
            event,
            Some(SegmentEvent::Symbol {
                symbol: Symbol::Dot,
                ..
            })
        ));
    }

    #[test]
    fn gap_is_reported_when_the_next_signal_begins() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        seg.ingest(sample(0.0, base, 100), &cfg());

        // Silence persists — no event until the line is keyed again.
        assert_eq!(seg.ingest(sample(0.0, base, 500), &cfg()), None);

        let event = seg.ingest(sample(80.0, base, 800), &cfg());
        assert_eq!(
            event,
            Some(SegmentEvent::Gap {
                duration: Duration::from_millis(700)
            })
        );
        assert!(seg.is_active());
    }

    #[test]
    fn nan_level_counts_as_silence() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        let event = seg.ingest(sample(f32::NAN, base, 100), &cfg());
        assert!(matches!(event, Some(SegmentEvent::Symbol { .. })));
    }

    #[test]
    fn over_range_level_clamps_and_still_keys() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        assert_eq!(seg.ingest(sample(250.0, base, 0), &cfg()), None);
        assert!(seg.is_active());
    }

    #[test]
    fn finalize_flushes_the_open_active_window() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        let event = seg.finalize(base + Duration::from_millis(250), &cfg());
        assert_eq!(
            event,
            Some(SegmentEvent::Symbol {
                symbol: Symbol::Dash,
                duration: Duration::from_millis(250)
            })
        );
        assert_eq!(seg.state(), SignalState::Idle);
    }

    #[test]
    fn finalize_during_a_gap_emits_nothing() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        seg.ingest(sample(0.0, base, 100), &cfg());
        assert_eq!(seg.finalize(base + Duration::from_millis(900), &cfg()), None);
    }

    #[test]
    fn reset_drops_window_state_without_emitting() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        seg.ingest(sample(80.0, base, 0), &cfg());
        seg.reset();
        assert_eq!(seg.state(), SignalState::Idle);
        // The next falling sample has no window to close.
        assert_eq!(seg.ingest(sample(0.0, base, 100), &cfg()), None);
    }

    #[test]
    fn config_update_applies_to_the_next_classification() {
        let mut seg = SignalSegmenter::new();
        let base = Instant::now();
        let mut config = cfg();

        seg.ingest(sample(80.0, base, 0), &config);
        // Lengthen the dot before the window closes: 250 ms is now below
        // the 300 * 1.6 cutoff and classifies as a dot.
        config.dot_length_ms = 300;
        let event = seg.ingest(sample(0.0, base, 250), &config);
        assert!(matches!(
            event,
            Some(SegmentEvent::Symbol {
                symbol: Symbol::Dot,
                ..
            })
        ));
    }
}
