pub mod assets;
pub mod commands;
pub mod engine; // NoteEngine lives here
pub mod error;
pub mod export;
pub mod mixer;
pub mod nodes;
pub mod output;
pub mod resampler;
pub mod scheduler;
pub mod sequencer;
pub mod stepper;

// Re-exports
pub use assets::{BankLayout, MediaBank};
pub use engine::{NoteEngine, NoteEngineConfig, NoteState, StopOptions};
pub use error::EngineError;
pub use mixer::{Mixer, OutputMixer, VoiceId};
pub use sequencer::{PhraseStarted, SequencerSource, TrackSequencer};

#[cfg(test)]
mod tests_playback;
