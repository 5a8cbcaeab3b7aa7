//! Score model shared by the engine and the player: note identities, phrases,
//! tracks, the duration model and the score/MIDI importers.

pub mod duration;
pub mod error;
pub mod midi;
pub mod note;
pub mod phrase;
pub mod score;
pub mod smf;
pub mod track;

pub use error::ScoreError;
pub use note::{Note, Tone};
pub use phrase::{Phrase, PlayingCommand};
pub use track::{MediaPatch, Track};
