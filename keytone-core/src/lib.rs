//! # keytone-core
//!
//! Reusable Morse audio-to-text decoding engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Amplitude source → SampleFeed → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                                        │
//!                                                 SignalSegmenter
//!                                                 (Dot / Dash / Gap)
//!                                                        │
//!                                                  MorseAssembler
//!                                              (letters, word breaks)
//!                                                        │
//!                                        broadcast::Sender<DecodeEvent>
//! ```
//!
//! The sample push is zero-alloc. All heap work happens in the pipeline thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod alphabet;
pub mod assembler;
pub mod buffering;
pub mod calibrate;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod offline;
pub mod segmenter;

// Convenience re-exports for downstream crates
pub use alphabet::{Symbol, SymbolTables};
pub use assembler::{AssemblerEvent, CommittedLetter, MorseAssembler};
pub use buffering::sample::AmplitudeSample;
pub use config::{GapConfig, SettingsUpdate, ThresholdConfig};
pub use engine::{EngineConfig, KeytoneEngine, SampleFeed};
pub use error::KeytoneError;
pub use events::{DecodeEvent, DecodeEventKind, EngineStatus, EngineStatusEvent, LevelEvent};
pub use segmenter::{SegmentEvent, SignalSegmenter};
