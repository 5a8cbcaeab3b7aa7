use serde::{Deserialize, Serialize};
use std::fmt;

use crate::duration;
use crate::note::Note;

/// Sustain directives carried by a phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlayingCommand {
    #[default]
    None,
    /// Sticky: every following note phrase lets its notes ring.
    SustainOn,
    SustainOff,
    /// Lets only the phrase carrying it ring.
    SustainThisPhrase,
    SustainLenWhole,
    SustainLenHalf,
    SustainLenQuarter,
}

impl PlayingCommand {
    /// The score token that produces this command.
    pub fn token(self) -> &'static str {
        match self {
            PlayingCommand::None => "",
            PlayingCommand::SustainOn => "=LROn=",
            PlayingCommand::SustainOff => "=LROff=",
            PlayingCommand::SustainThisPhrase => "=LR=",
            PlayingCommand::SustainLenWhole => "=LRw=",
            PlayingCommand::SustainLenHalf => "=LRh=",
            PlayingCommand::SustainLenQuarter => "=LRq=",
        }
    }
}

impl fmt::Display for PlayingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayingCommand::None => "None",
            PlayingCommand::SustainOn => "SustainOn",
            PlayingCommand::SustainOff => "SustainOff",
            PlayingCommand::SustainThisPhrase => "SustainThisPhrase",
            PlayingCommand::SustainLenWhole => "SustainLenWhole",
            PlayingCommand::SustainLenHalf => "SustainLenHalf",
            PlayingCommand::SustainLenQuarter => "SustainLenQuarter",
        };
        f.write_str(name)
    }
}

/// One timed event of a track: a chord, a rest or a control command.
///
/// Phrases are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    notes: Vec<Note>,
    duration: f64,
    command: PlayingCommand,
    channel: u32,
}

impl Phrase {
    /// Simultaneous notes lasting `duration` whole notes. Duplicates are dropped.
    pub fn chord(duration: f64, notes: impl IntoIterator<Item = Note>) -> Self {
        let mut unique: Vec<Note> = Vec::new();
        for note in notes {
            if !unique.contains(&note) {
                unique.push(note);
            }
        }
        Self {
            notes: unique,
            duration,
            command: PlayingCommand::None,
            channel: 0,
        }
    }

    pub fn rest(duration: f64) -> Self {
        Self::chord(duration, [])
    }

    /// A zero-length control phrase.
    pub fn command(command: PlayingCommand) -> Self {
        Self {
            notes: Vec::new(),
            duration: 0.0,
            command,
            channel: 0,
        }
    }

    pub fn with_command(mut self, command: PlayingCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn playing_command(&self) -> PlayingCommand {
        self.command
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn has_notes(&self) -> bool {
        !self.notes.is_empty()
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty() && self.command == PlayingCommand::None
    }

    pub fn seconds(&self, tempo: u32) -> f64 {
        duration::phrase_seconds(self.duration, tempo)
    }

    pub fn samples(&self, tempo: u32, sample_rate: u32) -> u64 {
        duration::phrase_samples(self.duration, tempo, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Tone;

    #[test]
    fn test_chord_deduplicates() {
        let c5 = Note::new(5, Tone::C);
        let e5 = Note::new(5, Tone::E);
        let phrase = Phrase::chord(0.25, [c5, e5, c5]);
        assert_eq!(phrase.notes(), &[c5, e5]);
        assert!(phrase.has_notes());
        assert!(!phrase.is_rest());
    }

    #[test]
    fn test_rest_and_command() {
        assert!(Phrase::rest(0.5).is_rest());

        let cmd = Phrase::command(PlayingCommand::SustainOn);
        assert!(!cmd.is_rest());
        assert_eq!(cmd.duration(), 0.0);
        assert_eq!(cmd.samples(120, 48_000), 0);
    }

    #[test]
    fn test_samples_at_tempo() {
        let phrase = Phrase::chord(0.25, [Note::new(5, Tone::C)]);
        assert_eq!(phrase.seconds(120), 0.125);
        assert_eq!(phrase.samples(120, 8_000), 1_000);
    }

    #[test]
    fn test_serde_round_trip() {
        let phrase = Phrase::chord(0.375, [Note::new(3, Tone::G)])
            .with_command(PlayingCommand::SustainThisPhrase)
            .with_channel(2);
        let json = serde_json::to_string(&phrase).unwrap();
        let back: Phrase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, phrase);
    }
}
