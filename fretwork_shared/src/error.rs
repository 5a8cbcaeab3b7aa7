//! Errors raised while turning score text or MIDI data into tracks.
//!
//! All of them are fatal to the current parse. Parse errors carry the
//! offending token so the player can show it verbatim.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// A token of the text score could not be understood.
    #[error("Unable to parse phrase '{token}': {reason}")]
    Parse { token: String, reason: String },

    /// The song file does not have the `<tempo>\n<score>` layout.
    #[error("Song file invalid: {0}")]
    InvalidSongFile(String),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(String),

    /// Malformed Standard MIDI File data.
    #[error("MIDI error: {0}")]
    Midi(String),
}
