//! Morse assembly: symbol/gap stream → committed letters and word breaks.
//!
//! Gap bands are evaluated high-band-first (word, then letter, then ignore),
//! so equal letter/word gaps degenerate safely to word boundaries.
//!
//! The auto-commit timer is an explicit deadline owned by this struct. The
//! single consumer driving the assembler polls it — against each event's
//! timestamp, or against the wall clock while idle — which makes cancel and
//! re-arm race-free by construction: no commit can fire after cancellation.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{
    alphabet::{sequence_key, Symbol, SymbolTables, UNKNOWN_MARKER},
    config::GapConfig,
};

/// One resolved commit, emitted at most once per buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedLetter {
    pub text: String,
    /// True when the whole buffer matched a shortcut sequence.
    pub is_shortcut: bool,
    /// True when the commit was forced by the inactivity timer rather than
    /// a gap. Forced commits imply no word boundary; consumers may treat
    /// them differently (e.g. suppress speech).
    pub was_forced: bool,
}

/// Assembler output. A single gap can produce up to two events, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerEvent {
    Letter(CommittedLetter),
    WordBoundary,
}

/// At most one pending deadline; re-arming supersedes, cancelling clears.
#[derive(Debug, Clone, Copy, Default)]
struct AutoCommitTimer {
    deadline: Option<Instant>,
}

impl AutoCommitTimer {
    /// Arm (or re-arm) for `window_ms` from `now`. A zero window disables
    /// the auto-commit and clears any pending deadline.
    fn arm(&mut self, now: Instant, window_ms: u64) {
        self.deadline = if window_ms == 0 {
            None
        } else {
            Some(now + Duration::from_millis(window_ms))
        };
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Stateful accumulator for the letter currently being spelled.
///
/// Gap and table configuration are passed in on each call, so runtime
/// updates apply to the next evaluation — an already-armed deadline keeps
/// the window it was armed with.
#[derive(Debug, Clone, Default)]
pub struct MorseAssembler {
    buffer: Vec<Symbol>,
    timer: AutoCommitTimer,
}

impl MorseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols accumulated toward the current letter.
    pub fn buffer(&self) -> &[Symbol] {
        &self.buffer
    }

    /// Deadline of the armed auto-commit timer, if any. The driving loop
    /// bounds its idle sleep with this.
    pub fn auto_commit_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Append a symbol and re-arm the auto-commit window from `now`,
    /// superseding any previously armed deadline.
    pub fn on_symbol(&mut self, symbol: Symbol, now: Instant, gaps: &GapConfig) {
        self.buffer.push(symbol);
        self.timer.arm(now, gaps.auto_commit_ms);
    }

    /// Classify a completed gap. Cancels the auto-commit timer
    /// unconditionally, then commits per the gap bands. Returns the
    /// resulting events in emission order.
    pub fn on_gap(
        &mut self,
        duration: Duration,
        gaps: &GapConfig,
        tables: &SymbolTables,
    ) -> Vec<AssemblerEvent> {
        self.timer.cancel();

        let gap_ms = duration.as_millis() as u64;
        let mut events = Vec::new();
        if gap_ms >= gaps.word_gap_ms {
            if let Some(letter) = self.commit(false, tables) {
                events.push(AssemblerEvent::Letter(letter));
            }
            // The word boundary is emitted even when no letter was pending.
            events.push(AssemblerEvent::WordBoundary);
        } else if gap_ms >= gaps.letter_gap_ms {
            if let Some(letter) = self.commit(false, tables) {
                events.push(AssemblerEvent::Letter(letter));
            }
        }
        // Shorter gaps are intra-letter silence; the buffer keeps accumulating.
        events
    }

    /// Fire the auto-commit if its deadline has passed. Call with the
    /// timestamp of the event about to be processed, or the wall clock when
    /// idle.
    pub fn poll_auto_commit(
        &mut self,
        now: Instant,
        tables: &SymbolTables,
    ) -> Option<CommittedLetter> {
        if !self.timer.is_due(now) {
            return None;
        }
        self.timer.cancel();
        self.commit(true, tables)
    }

    /// Flush at stream end: commit a pending letter, then always mark a
    /// word boundary.
    pub fn end_of_input(&mut self, tables: &SymbolTables) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();
        if let Some(letter) = self.commit(false, tables) {
            events.push(AssemblerEvent::Letter(letter));
        }
        events.push(AssemblerEvent::WordBoundary);
        events
    }

    /// Hard-clear buffer and timer without emitting.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.timer.cancel();
    }

    /// Resolve and clear the buffer. An empty buffer is a no-op. Clearing
    /// the buffer and cancelling the timer happen in the same step.
    fn commit(&mut self, forced: bool, tables: &SymbolTables) -> Option<CommittedLetter> {
        if self.buffer.is_empty() {
            return None;
        }
        let resolution = tables.resolve(&self.buffer);
        if !resolution.is_shortcut && resolution.text == UNKNOWN_MARKER {
            warn!(sequence = %sequence_key(&self.buffer), "unrecognized sequence");
        }
        debug!(
            sequence = %sequence_key(&self.buffer),
            text = %resolution.text,
            forced,
            "letter committed"
        );
        self.buffer.clear();
        self.timer.cancel();
        Some(CommittedLetter {
            text: resolution.text,
            is_shortcut: resolution.is_shortcut,
            was_forced: forced,
        })
    }
}
