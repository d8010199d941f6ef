//! `KeytoneEngine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! KeytoneEngine::new()
//!     └─► start()      → ring created, pipeline spawned, status = Listening
//!         └─► stop()   → running=false; the pipeline drains, finalizes any
//!                        open signal window, flushes the letter buffer,
//!                        status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state
//! returns an error rather than panicking.
//!
//! ## Threading
//!
//! The engine is `Send + Sync` — all fields use interior mutability. Wrap in
//! `Arc<KeytoneEngine>` to share between the feeding side and
//! event-forwarding async tasks. Configuration and tables live behind
//! mutexes shared with the pipeline, which re-reads them on every
//! evaluation; `reset`/`end_of_input` travel over a control channel so they
//! are ordered against queued samples.

pub mod pipeline;

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    alphabet::SymbolTables,
    buffering::{create_sample_ring, sample::AmplitudeSample, Producer, SampleProducer},
    config::{GapConfig, SettingsUpdate, ThresholdConfig},
    error::{KeytoneError, Result},
    events::{DecodeEvent, EngineStatus, EngineStatusEvent, LevelEvent},
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `KeytoneEngine`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Segmenter tuning (threshold + dot/dash cutoff).
    pub thresholds: ThresholdConfig,
    /// Assembler tuning (gap bands + auto-commit window).
    pub gaps: GapConfig,
}

/// Control messages processed by the pipeline in order with queued samples.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Command {
    /// Hard-clear segmenter and assembler state without emitting.
    Reset,
    /// Finalize an open window and flush the letter buffer.
    EndOfInput,
}

/// Producer handle given to the amplitude-source collaborator.
///
/// `push` is wait-free and safe to call from a capture callback. A full
/// ring is reported as `SampleOverflow` rather than dropping the sample —
/// dropping inside an active window would corrupt duration measurement.
pub struct SampleFeed {
    producer: SampleProducer,
}

impl SampleFeed {
    /// Push one loudness reading stamped with the current instant.
    pub fn push(&mut self, level: f32) -> Result<()> {
        self.push_at(level, Instant::now())
    }

    /// Push a reading with an explicit timestamp. Timestamps must be
    /// non-decreasing across calls.
    pub fn push_at(&mut self, level: f32, at: Instant) -> Result<()> {
        self.producer
            .try_push(AmplitudeSample::new(level, at))
            .map_err(|_| KeytoneError::SampleOverflow)
    }
}

/// The top-level engine handle.
pub struct KeytoneEngine {
    thresholds: Arc<Mutex<ThresholdConfig>>,
    gaps: Arc<Mutex<GapConfig>>,
    tables: Arc<Mutex<SymbolTables>>,
    /// `true` while the pipeline is active.
    running: Arc<AtomicBool>,
    /// Canonical status (written atomically via Mutex, read from callers).
    status: Arc<Mutex<EngineStatus>>,
    /// Control channel into the running pipeline; `None` while stopped.
    control_tx: Mutex<Option<Sender<Command>>>,
    decode_tx: broadcast::Sender<DecodeEvent>,
    level_tx: broadcast::Sender<LevelEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    /// Monotonically increasing decode-event sequence counter.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl KeytoneEngine {
    /// Create a new engine. Rejects invalid configuration. Does not start
    /// consuming — call `start()`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.thresholds.validate()?;
        config.gaps.validate()?;

        let (decode_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (level_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            thresholds: Arc::new(Mutex::new(config.thresholds)),
            gaps: Arc::new(Mutex::new(config.gaps)),
            tables: Arc::new(Mutex::new(SymbolTables::default())),
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            control_tx: Mutex::new(None),
            decode_tx,
            level_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        })
    }

    /// Start the consumer pipeline and hand back the producer half of the
    /// sample ring.
    ///
    /// # Errors
    /// - `KeytoneError::AlreadyRunning` if already started.
    pub fn start(&self) -> Result<SampleFeed> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(KeytoneError::AlreadyRunning);
        }

        self.diagnostics.reset();
        self.set_status(EngineStatus::Listening, None);

        let (producer, consumer) = create_sample_ring();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        *self.control_tx.lock() = Some(control_tx);

        let ctx = pipeline::PipelineContext {
            thresholds: Arc::clone(&self.thresholds),
            gaps: Arc::clone(&self.gaps),
            tables: Arc::clone(&self.tables),
            consumer,
            control_rx,
            running: Arc::clone(&self.running),
            decode_tx: self.decode_tx.clone(),
            level_tx: self.level_tx.clone(),
            status_tx: self.status_tx.clone(),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        tokio::task::spawn_blocking(move || pipeline::run(ctx));

        info!("engine started — listening");
        Ok(SampleFeed { producer })
    }

    /// Stop the pipeline. Queued samples are drained, an open signal window
    /// is finalized and the letter buffer flushed before teardown.
    ///
    /// # Errors
    /// - `KeytoneError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(KeytoneError::NotRunning);
        }

        *self.control_tx.lock() = None;
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    /// Hard-clear all decode state without emitting trailing events.
    /// Pending unprocessed samples are discarded with it.
    pub fn reset(&self) -> Result<()> {
        self.send_command(Command::Reset)
    }

    /// Force-flush: process queued samples, finalize an open window, commit
    /// the pending letter and mark a word boundary.
    pub fn end_of_input(&self) -> Result<()> {
        self.send_command(Command::EndOfInput)
    }

    /// Replace the segmenter thresholds. A rejected update leaves the prior
    /// configuration in force. Takes effect on the next sample.
    pub fn set_threshold_config(&self, config: ThresholdConfig) -> Result<()> {
        config.validate()?;
        *self.thresholds.lock() = config;
        Ok(())
    }

    /// Replace the gap bands. Never applies retroactively to an
    /// already-armed auto-commit deadline.
    pub fn set_gap_config(&self, config: GapConfig) -> Result<()> {
        config.validate()?;
        *self.gaps.lock() = config;
        Ok(())
    }

    /// Apply a partial settings update, validated as a whole before commit.
    pub fn apply_settings(&self, update: SettingsUpdate) -> Result<()> {
        let mut thresholds = self.thresholds.lock();
        let mut gaps = self.gaps.lock();
        update.apply_to(&mut thresholds, &mut gaps)
    }

    /// Replace the shortcut table. Keys are validated glyph sequences.
    pub fn set_shortcut_table(&self, shortcuts: HashMap<String, String>) -> Result<()> {
        self.tables.lock().set_shortcuts(shortcuts)
    }

    /// Replace the single-letter table (pluggable for alternate alphabets).
    pub fn set_morse_table(&self, morse: HashMap<String, char>) -> Result<()> {
        self.tables.lock().set_morse(morse)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to the ordered decode event log.
    pub fn subscribe_decode(&self) -> broadcast::Receiver<DecodeEvent> {
        self.decode_tx.subscribe()
    }

    /// Subscribe to live level events (loudness + keying state).
    pub fn subscribe_levels(&self) -> broadcast::Receiver<LevelEvent> {
        self.level_tx.subscribe()
    }

    /// Subscribe to engine status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn send_command(&self, command: Command) -> Result<()> {
        let guard = self.control_tx.lock();
        let tx = guard.as_ref().ok_or(KeytoneError::NotRunning)?;
        tx.send(command).map_err(|_| KeytoneError::NotRunning)
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_configuration() {
        let config = EngineConfig {
            gaps: GapConfig {
                letter_gap_ms: 2000,
                word_gap_ms: 1500,
                auto_commit_ms: 0,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            KeytoneEngine::new(config),
            Err(KeytoneError::GapBandOrder { .. })
        ));
    }

    #[test]
    fn commands_require_a_running_pipeline() {
        let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
        assert!(matches!(engine.reset(), Err(KeytoneError::NotRunning)));
        assert!(matches!(
            engine.end_of_input(),
            Err(KeytoneError::NotRunning)
        ));
        assert!(matches!(engine.stop(), Err(KeytoneError::NotRunning)));
    }

    #[test]
    fn rejected_runtime_update_keeps_prior_configuration() {
        let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
        let bad = ThresholdConfig {
            dot_length_ms: 0,
            ..ThresholdConfig::default()
        };
        assert!(engine.set_threshold_config(bad).is_err());
        assert_eq!(engine.thresholds.lock().dot_length_ms, 120);
    }

    #[test]
    fn starts_idle() {
        let engine = KeytoneEngine::new(EngineConfig::default()).expect("engine");
        assert_eq!(engine.status(), EngineStatus::Idle);
    }
}
