use thiserror::Error;

/// All errors produced by keytone-core.
#[derive(Debug, Error)]
pub enum KeytoneError {
    #[error("threshold must be finite and within 0–100, got {0}")]
    InvalidThreshold(f32),

    #[error("dot length must be positive, got {0} ms")]
    InvalidDotLength(u64),

    #[error("dash multiplier must be positive and finite, got {0}")]
    InvalidDashMultiplier(f64),

    #[error("letter gap must be positive, got {0} ms")]
    InvalidLetterGap(u64),

    #[error("word gap must be positive, got {0} ms")]
    InvalidWordGap(u64),

    #[error("letter gap ({letter_ms} ms) must not exceed word gap ({word_ms} ms)")]
    GapBandOrder { letter_ms: u64, word_ms: u64 },

    #[error("sequence {0:?} contains characters other than the dot/dash glyphs")]
    InvalidSequence(String),

    #[error("sample ring is full — decoder cannot keep up")]
    SampleOverflow,

    #[error("decoder is already running")]
    AlreadyRunning,

    #[error("decoder is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KeytoneError>;
