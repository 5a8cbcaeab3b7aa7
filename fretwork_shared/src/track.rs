use serde::{Deserialize, Serialize};

use crate::duration;
use crate::error::ScoreError;
use crate::phrase::Phrase;

/// Which sample bank a track is played with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MediaPatch {
    #[default]
    CleanGuitar,
    Bass,
    Drums,
}

impl MediaPatch {
    pub fn iter() -> impl Iterator<Item = MediaPatch> {
        [MediaPatch::CleanGuitar, MediaPatch::Bass, MediaPatch::Drums].into_iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            MediaPatch::CleanGuitar => "Clean Guitar",
            MediaPatch::Bass => "Bass",
            MediaPatch::Drums => "Drums",
        }
    }
}

pub const DEFAULT_TEMPO: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub phrases: Vec<Phrase>,
    /// Beats per minute, where one whole note lasts `60 / tempo` seconds.
    pub tempo: u32,
    pub channel: u32,
    pub patch: MediaPatch,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            phrases: Vec::new(),
            tempo: DEFAULT_TEMPO,
            channel: 0,
            patch: MediaPatch::CleanGuitar,
        }
    }
}

impl Track {
    pub fn new(phrases: Vec<Phrase>, tempo: u32) -> Self {
        Self {
            phrases,
            tempo,
            ..Default::default()
        }
    }

    pub fn total_seconds(&self) -> f64 {
        self.phrases.iter().map(|p| p.seconds(self.tempo)).sum()
    }

    /// Sum of per-phrase sample counts. Each phrase is rounded on its own, which
    /// is how the sequencer advances, so this is the sequencer's timeline length.
    pub fn total_samples(&self, sample_rate: u32) -> u64 {
        self.phrases
            .iter()
            .map(|p| p.samples(self.tempo, sample_rate))
            .fold(0u64, u64::saturating_add)
    }

    /// Checks what the parsers guarantee but deserialized tracks may lack: a
    /// positive tempo and finite, non-negative phrase durations.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.tempo == 0 {
            return Err(ScoreError::InvalidTempo("tempo must be positive".to_string()));
        }
        if let Some(phrase) = self
            .phrases
            .iter()
            .find(|p| !p.duration().is_finite() || p.duration() < 0.0)
        {
            return Err(ScoreError::InvalidSongFile(format!(
                "phrase duration {} is out of range",
                phrase.duration()
            )));
        }
        Ok(())
    }

    pub fn whole_note_seconds(&self) -> f64 {
        duration::whole_note_seconds(self.tempo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::{Note, Tone};
    use crate::phrase::PlayingCommand;

    #[test]
    fn test_totals() {
        let c5 = Note::new(5, Tone::C);
        let track = Track::new(
            vec![
                Phrase::chord(0.25, [c5]),
                Phrase::command(PlayingCommand::SustainOn),
                Phrase::rest(0.5),
            ],
            120,
        );
        assert!((track.total_seconds() - 0.375).abs() < 1e-12);
        assert_eq!(track.total_samples(8_000), 3_000);
        assert_eq!(track.whole_note_seconds(), 0.5);
    }

    #[test]
    fn test_validate() {
        let c5 = Note::new(5, Tone::C);
        let good = Track::new(vec![Phrase::chord(0.25, [c5]), Phrase::rest(0.25)], 90);
        assert_eq!(good.validate(), Ok(()));

        let stalled = Track::new(good.phrases.clone(), 0);
        assert!(matches!(stalled.validate(), Err(ScoreError::InvalidTempo(_))));
        // no overflow even though every phrase is endless
        assert_eq!(stalled.total_samples(8_000), u64::MAX);

        let endless = Track::new(vec![Phrase::rest(f64::INFINITY)], 90);
        assert!(matches!(endless.validate(), Err(ScoreError::InvalidSongFile(_))));
    }
}
