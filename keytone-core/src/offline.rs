//! Synchronous decode of an already-captured sample slice.
//!
//! Drives a fresh segmenter/assembler pair over the slice in timestamp
//! order, simulating the inactivity auto-commit from the samples' own
//! timestamps, then finalizes the last window and flushes the buffer. This
//! is the deterministic harness behind the `decode_wav` tool and the
//! integration tests.

use std::time::{Duration, Instant};

use crate::{
    alphabet::SymbolTables,
    assembler::{AssemblerEvent, CommittedLetter, MorseAssembler},
    buffering::sample::AmplitudeSample,
    config::{GapConfig, ThresholdConfig},
    events::DecodeEventKind,
    segmenter::{SegmentEvent, SignalSegmenter},
};

/// Result of an offline decode pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineDecode {
    /// Committed letters joined into space-separated words.
    pub text: String,
    /// The full ordered event log.
    pub events: Vec<DecodeEventKind>,
}

/// Decode a complete sample slice. Samples must be in non-decreasing
/// timestamp order.
pub fn decode_samples(
    samples: &[AmplitudeSample],
    thresholds: &ThresholdConfig,
    gaps: &GapConfig,
    tables: &SymbolTables,
) -> OfflineDecode {
    let mut segmenter = SignalSegmenter::new();
    let mut assembler = MorseAssembler::new();
    let mut events = Vec::new();

    for sample in samples {
        // The timer would have fired before this sample in real time.
        if let Some(letter) = assembler.poll_auto_commit(sample.at, tables) {
            events.push(letter_event(letter));
        }

        match segmenter.ingest(*sample, thresholds) {
            Some(SegmentEvent::Symbol { symbol, duration }) => {
                events.push(DecodeEventKind::Symbol {
                    symbol,
                    duration_ms: duration.as_millis() as u64,
                });
                assembler.on_symbol(symbol, sample.at, gaps);
            }
            Some(SegmentEvent::Gap { duration }) => {
                events.push(DecodeEventKind::Gap {
                    duration_ms: duration.as_millis() as u64,
                });
                for event in assembler.on_gap(duration, gaps, tables) {
                    events.push(assembler_event(event));
                }
            }
            None => {}
        }
    }

    // Stream end: finalize an open signal window, then flush the buffer —
    // in that order.
    if let Some(last) = samples.last() {
        if let Some(SegmentEvent::Symbol { symbol, duration }) =
            segmenter.finalize(last.at, thresholds)
        {
            events.push(DecodeEventKind::Symbol {
                symbol,
                duration_ms: duration.as_millis() as u64,
            });
            assembler.on_symbol(symbol, last.at, gaps);
        }
    }
    for event in assembler.end_of_input(tables) {
        events.push(assembler_event(event));
    }

    OfflineDecode {
        text: render_text(&events),
        events,
    }
}

/// Build an evenly-ticked sample slice from a level envelope.
pub fn samples_from_envelope(
    levels: &[f32],
    tick: Duration,
    start: Instant,
) -> Vec<AmplitudeSample> {
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| AmplitudeSample::new(level, start + tick * i as u32))
        .collect()
}

fn letter_event(letter: CommittedLetter) -> DecodeEventKind {
    DecodeEventKind::Letter {
        text: letter.text,
        is_shortcut: letter.is_shortcut,
        was_forced: letter.was_forced,
    }
}

fn assembler_event(event: AssemblerEvent) -> DecodeEventKind {
    match event {
        AssemblerEvent::Letter(letter) => letter_event(letter),
        AssemblerEvent::WordBoundary => DecodeEventKind::WordBoundary,
    }
}

fn render_text(events: &[DecodeEventKind]) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for event in events {
        match event {
            DecodeEventKind::Letter { text, .. } => current.push_str(text),
            DecodeEventKind::WordBoundary => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Symbol;

    const TICK_MS: u64 = 10;

    /// Envelope builder: `keyed(ms)` / `silent(ms)` appended at a 10 ms tick.
    struct Envelope {
        levels: Vec<f32>,
    }

    impl Envelope {
        fn new() -> Self {
            Self { levels: Vec::new() }
        }

        fn keyed(mut self, ms: u64) -> Self {
            self.levels
                .extend(std::iter::repeat(80.0).take((ms / TICK_MS) as usize));
            self
        }

        fn silent(mut self, ms: u64) -> Self {
            self.levels
                .extend(std::iter::repeat(0.0).take((ms / TICK_MS) as usize));
            self
        }

        fn samples(self) -> Vec<AmplitudeSample> {
            samples_from_envelope(
                &self.levels,
                Duration::from_millis(TICK_MS),
                Instant::now(),
            )
        }
    }

    fn decode(samples: &[AmplitudeSample]) -> OfflineDecode {
        decode_samples(
            samples,
            &ThresholdConfig::default(),
            &GapConfig::default(),
            &SymbolTables::default(),
        )
    }

    fn letters(decode: &OfflineDecode) -> Vec<(&str, bool, bool)> {
        decode
            .events
            .iter()
            .filter_map(|event| match event {
                DecodeEventKind::Letter {
                    text,
                    is_shortcut,
                    was_forced,
                } => Some((text.as_str(), *is_shortcut, *was_forced)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_dot_decodes_to_e() {
        // The trailing 700 ms gap is closed by the next keying, which
        // commits the pending dot before the second letter begins.
        let samples = Envelope::new()
            .keyed(100)
            .silent(700)
            .keyed(100)
            .samples();
        let result = decode(&samples);

        assert_eq!(result.text, "EE");
        assert_eq!(
            letters(&result),
            vec![("E", false, false), ("E", false, false)]
        );
        // No word boundary from the 700 ms gap (700 < 1500), only the
        // end-of-input flush.
        let words = result
            .events
            .iter()
            .filter(|e| matches!(e, DecodeEventKind::WordBoundary))
            .count();
        assert_eq!(words, 1);
    }

    #[test]
    fn dot_dash_with_word_gap_decodes_to_a() {
        let samples = Envelope::new()
            .keyed(100) // dot
            .silent(200) // intra-letter, ignored
            .keyed(250) // dash (250 ≥ 192)
            .silent(1600) // ≥ word gap
            .keyed(100) // closes the gap, then a trailing E
            .samples();
        let result = decode(&samples);

        assert_eq!(result.text, "A E");
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e, DecodeEventKind::Gap { duration_ms } if *duration_ms >= 1500)));
    }

    #[test]
    fn sos_shortcut_resolves_as_one_word() {
        let mut envelope = Envelope::new();
        for _ in 0..3 {
            envelope = envelope.keyed(100).silent(200); // dots
        }
        for _ in 0..3 {
            envelope = envelope.keyed(300).silent(200); // dashes
        }
        for _ in 0..2 {
            envelope = envelope.keyed(100).silent(200);
        }
        envelope = envelope.keyed(100); // last dot, flushed at end of input

        let result = decode(&envelope.samples());
        assert_eq!(result.text, "SOS");
        assert_eq!(letters(&result), vec![("SOS", true, false)]);
    }

    #[test]
    fn inactivity_forces_a_commit_without_a_word_boundary() {
        let samples = Envelope::new()
            .keyed(100)
            .silent(5000) // auto-commit (3000 ms) elapses inside this gap
            .samples();
        let result = decode(&samples);

        assert_eq!(letters(&result), vec![("E", false, true)]);
        // The forced commit itself implies no word boundary; the only one
        // comes from the end-of-input flush.
        let boundary_index = result
            .events
            .iter()
            .position(|e| matches!(e, DecodeEventKind::WordBoundary))
            .expect("end-of-input boundary");
        assert_eq!(boundary_index, result.events.len() - 1);
    }

    #[test]
    fn symbols_carry_measured_durations() {
        let samples = Envelope::new().keyed(300).silent(700).samples();
        let result = decode(&samples);

        let symbol = result
            .events
            .iter()
            .find_map(|event| match event {
                DecodeEventKind::Symbol { symbol, duration_ms } => Some((*symbol, *duration_ms)),
                _ => None,
            })
            .expect("one symbol");
        assert_eq!(symbol.0, Symbol::Dash);
        assert_eq!(symbol.1, 300);
    }

    #[test]
    fn empty_input_decodes_to_an_empty_word_flush() {
        let result = decode(&[]);
        assert_eq!(result.text, "");
        assert_eq!(result.events, vec![DecodeEventKind::WordBoundary]);
    }
}
