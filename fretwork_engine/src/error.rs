use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Seek target outside `[0, length)`. The sequencer is left untouched.
    #[error("Position {position} is outside the track (length {length} samples)")]
    OutOfRange { position: u64, length: u64 },

    /// Sound bank directory missing or empty.
    #[error("Missing sound bank: {0}")]
    MissingResource(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resampling failed: {0}")]
    Resample(String),
}
