//! Blocking consumer loop.
//!
//! ## Per-iteration stages
//!
//! ```text
//! 1. Drain control commands (reset / end-of-input)
//! 2. Pop samples from the ring, in push order
//! 3. Per sample: fire a due auto-commit, step the segmenter, feed
//!    symbol/gap events into the assembler, broadcast decode events
//! 4. Ring empty: poll the auto-commit against the wall clock, then sleep
//!    (bounded by the armed deadline)
//! ```
//!
//! The whole loop runs under `spawn_blocking`, keeping the async executor
//! free for subscribers. On exit (stop requested) the remaining queued
//! samples are drained, an open signal window is finalized, then the letter
//! buffer is flushed — in that order.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, OnceLock,
};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    alphabet::SymbolTables,
    assembler::{AssemblerEvent, CommittedLetter, MorseAssembler},
    buffering::{sample::AmplitudeSample, Consumer, SampleConsumer},
    config::{GapConfig, ThresholdConfig},
    engine::Command,
    events::{DecodeEvent, DecodeEventKind, EngineStatusEvent, LevelEvent},
    segmenter::{SegmentEvent, SignalSegmenter},
};

pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub symbols_emitted: AtomicUsize,
    pub gaps_emitted: AtomicUsize,
    pub letters_committed: AtomicUsize,
    pub forced_commits: AtomicUsize,
    pub word_boundaries: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            samples_in: AtomicUsize::new(0),
            symbols_emitted: AtomicUsize::new(0),
            gaps_emitted: AtomicUsize::new(0),
            letters_committed: AtomicUsize::new(0),
            forced_commits: AtomicUsize::new(0),
            word_boundaries: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.symbols_emitted.store(0, Ordering::Relaxed);
        self.gaps_emitted.store(0, Ordering::Relaxed);
        self.letters_committed.store(0, Ordering::Relaxed);
        self.forced_commits.store(0, Ordering::Relaxed);
        self.word_boundaries.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            symbols_emitted: self.symbols_emitted.load(Ordering::Relaxed),
            gaps_emitted: self.gaps_emitted.load(Ordering::Relaxed),
            letters_committed: self.letters_committed.load(Ordering::Relaxed),
            forced_commits: self.forced_commits.load(Ordering::Relaxed),
            word_boundaries: self.word_boundaries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub symbols_emitted: usize,
    pub gaps_emitted: usize,
    pub letters_committed: usize,
    pub forced_commits: usize,
    pub word_boundaries: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub thresholds: Arc<Mutex<ThresholdConfig>>,
    pub gaps: Arc<Mutex<GapConfig>>,
    pub tables: Arc<Mutex<SymbolTables>>,
    pub consumer: SampleConsumer,
    pub control_rx: Receiver<Command>,
    pub running: Arc<AtomicBool>,
    pub decode_tx: broadcast::Sender<DecodeEvent>,
    pub level_tx: broadcast::Sender<LevelEvent>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Samples popped from the ring per iteration before re-checking control.
const DRAIN_BATCH: usize = 256;

/// Minimum sleep when the ring is empty (avoids busy-wait burning a core).
const DEFAULT_SLEEP_EMPTY_MS: u64 = 2;

/// Decode state owned by the loop: the two fused state machines plus the
/// level-event counter.
struct DecodeState {
    segmenter: SignalSegmenter,
    assembler: MorseAssembler,
    level_seq: u64,
}

/// Run the blocking pipeline until `ctx.running` becomes false.
pub fn run(mut ctx: PipelineContext) {
    info!("pipeline started");

    let mut state = DecodeState {
        segmenter: SignalSegmenter::new(),
        assembler: MorseAssembler::new(),
        level_seq: 0,
    };

    loop {
        // ── 0. Check running flag ─────────────────────────────────────────
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── 1. Control commands, ordered against queued samples ──────────
        drain_control(&mut ctx, &mut state);

        // ── 2. Drain the sample ring ──────────────────────────────────────
        let mut processed = 0usize;
        while processed < DRAIN_BATCH {
            let Some(sample) = ctx.consumer.try_pop() else {
                break;
            };
            process_sample(&ctx, &mut state, sample);
            processed += 1;
        }

        // ── 3. Idle: wall-clock auto-commit, then yield ───────────────────
        if processed == 0 {
            let now = Instant::now();
            fire_due_auto_commit(&ctx, &mut state, now);
            std::thread::sleep(idle_sleep(&state, now));
        }
    }

    // Stop requested: drain what is queued, finalize the open window, then
    // flush the letter buffer. The order matters.
    while let Some(sample) = ctx.consumer.try_pop() {
        process_sample(&ctx, &mut state, sample);
    }
    flush_at_end(&ctx, &mut state, Instant::now());

    let snap = ctx.diagnostics.snapshot();
    info!(
        samples_in = snap.samples_in,
        symbols = snap.symbols_emitted,
        gaps = snap.gaps_emitted,
        letters = snap.letters_committed,
        forced = snap.forced_commits,
        words = snap.word_boundaries,
        "pipeline stopped — diagnostics"
    );
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("KEYTONE_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}

fn idle_sleep(state: &DecodeState, now: Instant) -> Duration {
    let empty = Duration::from_millis(empty_sleep_ms());
    match state.assembler.auto_commit_deadline() {
        Some(deadline) => empty.min(deadline.saturating_duration_since(now)),
        None => empty,
    }
}

fn drain_control(ctx: &mut PipelineContext, state: &mut DecodeState) {
    while let Ok(command) = ctx.control_rx.try_recv() {
        match command {
            Command::Reset => {
                debug!("reset — dropping queued samples, window and buffer state");
                while ctx.consumer.try_pop().is_some() {}
                state.segmenter.reset();
                state.assembler.clear();
            }
            Command::EndOfInput => {
                // Queued samples come first so the flush observes them.
                while let Some(sample) = ctx.consumer.try_pop() {
                    process_sample(ctx, state, sample);
                }
                flush_at_end(ctx, state, Instant::now());
            }
        }
    }
}

fn process_sample(ctx: &PipelineContext, state: &mut DecodeState, sample: AmplitudeSample) {
    ctx.diagnostics.samples_in.fetch_add(1, Ordering::Relaxed);

    // The timer would have fired before this sample in real time.
    fire_due_auto_commit(ctx, state, sample.at);

    let thresholds = *ctx.thresholds.lock();
    match state.segmenter.ingest(sample, &thresholds) {
        Some(SegmentEvent::Symbol { symbol, duration }) => {
            ctx.diagnostics
                .symbols_emitted
                .fetch_add(1, Ordering::Relaxed);
            emit_decode(
                ctx,
                DecodeEventKind::Symbol {
                    symbol,
                    duration_ms: duration.as_millis() as u64,
                },
            );
            let gaps = *ctx.gaps.lock();
            state.assembler.on_symbol(symbol, sample.at, &gaps);
        }
        Some(SegmentEvent::Gap { duration }) => {
            ctx.diagnostics.gaps_emitted.fetch_add(1, Ordering::Relaxed);
            emit_decode(
                ctx,
                DecodeEventKind::Gap {
                    duration_ms: duration.as_millis() as u64,
                },
            );
            let gaps = *ctx.gaps.lock();
            let tables = ctx.tables.lock();
            for event in state.assembler.on_gap(duration, &gaps, &tables) {
                emit_assembler_event(ctx, event);
            }
        }
        None => {}
    }

    let level = LevelEvent {
        seq: state.level_seq,
        level: sample.normalized_level(),
        is_active: state.segmenter.is_active(),
    };
    state.level_seq = state.level_seq.saturating_add(1);
    let _ = ctx.level_tx.send(level);

    // Log the level periodically for diagnostics
    if state.level_seq % 256 == 0 {
        debug!(
            level = format_args!("{:.1}", sample.normalized_level()),
            is_active = state.segmenter.is_active(),
            buffered_symbols = state.assembler.buffer().len(),
            "level check"
        );
    }
}

fn fire_due_auto_commit(ctx: &PipelineContext, state: &mut DecodeState, now: Instant) {
    let letter = {
        let tables = ctx.tables.lock();
        state.assembler.poll_auto_commit(now, &tables)
    };
    if let Some(letter) = letter {
        emit_letter(ctx, letter);
    }
}

/// Finalize the open signal window, then flush the assembler — the
/// stop/end-of-input ordering required for deterministic teardown.
fn flush_at_end(ctx: &PipelineContext, state: &mut DecodeState, now: Instant) {
    let thresholds = *ctx.thresholds.lock();
    if let Some(SegmentEvent::Symbol { symbol, duration }) =
        state.segmenter.finalize(now, &thresholds)
    {
        ctx.diagnostics
            .symbols_emitted
            .fetch_add(1, Ordering::Relaxed);
        emit_decode(
            ctx,
            DecodeEventKind::Symbol {
                symbol,
                duration_ms: duration.as_millis() as u64,
            },
        );
        let gaps = *ctx.gaps.lock();
        state.assembler.on_symbol(symbol, now, &gaps);
    }

    let events = {
        let tables = ctx.tables.lock();
        state.assembler.end_of_input(&tables)
    };
    for event in events {
        emit_assembler_event(ctx, event);
    }
}

fn emit_assembler_event(ctx: &PipelineContext, event: AssemblerEvent) {
    match event {
        AssemblerEvent::Letter(letter) => emit_letter(ctx, letter),
        AssemblerEvent::WordBoundary => {
            ctx.diagnostics
                .word_boundaries
                .fetch_add(1, Ordering::Relaxed);
            emit_decode(ctx, DecodeEventKind::WordBoundary);
        }
    }
}

fn emit_letter(ctx: &PipelineContext, letter: CommittedLetter) {
    ctx.diagnostics
        .letters_committed
        .fetch_add(1, Ordering::Relaxed);
    if letter.was_forced {
        ctx.diagnostics
            .forced_commits
            .fetch_add(1, Ordering::Relaxed);
        warn!(text = %letter.text, "inactivity auto-commit");
    }
    emit_decode(
        ctx,
        DecodeEventKind::Letter {
            text: letter.text,
            is_shortcut: letter.is_shortcut,
            was_forced: letter.was_forced,
        },
    );
}

fn emit_decode(ctx: &PipelineContext, kind: DecodeEventKind) {
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let _ = ctx.decode_tx.send(DecodeEvent { seq, kind });
}
