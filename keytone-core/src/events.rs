//! Event types broadcast to external consumers.
//!
//! ## Channels
//!
//! | Event | Channel |
//! |-------|---------|
//! | `DecodeEvent` | `KeytoneEngine::subscribe_decode` |
//! | `LevelEvent` | `KeytoneEngine::subscribe_levels` |
//! | `EngineStatusEvent` | `KeytoneEngine::subscribe_status` |
//!
//! Consumers treat the decode channel as an ordered event log: `seq` is
//! monotonically increasing and no event is re-delivered.

use serde::{Deserialize, Serialize};

use crate::alphabet::Symbol;

// ---------------------------------------------------------------------------
// Decode events
// ---------------------------------------------------------------------------

/// One entry of the ordered decode log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    #[serde(flatten)]
    pub kind: DecodeEventKind,
}

/// Payload of a decode event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DecodeEventKind {
    /// A classified active-signal interval.
    #[serde(rename_all = "camelCase")]
    Symbol { symbol: Symbol, duration_ms: u64 },
    /// A completed low-amplitude interval.
    #[serde(rename_all = "camelCase")]
    Gap { duration_ms: u64 },
    /// A committed letter — or a whole shortcut word.
    #[serde(rename_all = "camelCase")]
    Letter {
        text: String,
        is_shortcut: bool,
        /// True when the commit came from the inactivity timer. Consumers
        /// may apply different downstream treatment (e.g. suppress speech).
        was_forced: bool,
    },
    /// End of the current word.
    WordBoundary,
}

// ---------------------------------------------------------------------------
// Level events
// ---------------------------------------------------------------------------

/// Emitted for each processed sample: live loudness + keying state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEvent {
    /// Monotonically increasing event sequence number (independent of the
    /// decode log).
    pub seq: u64,
    /// Normalized loudness in 0–100.
    pub level: f32,
    /// Whether an active-signal window is open after this sample.
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the Keytone engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Actively consuming samples and decoding.
    Listening,
    /// Pipeline stopped; the engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}
