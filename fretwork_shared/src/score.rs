//! Text score parser.
//!
//! Format:
//! ```text
//! <tempo>
//! <token> <token> ...
//! ```
//!
//! Tokens:
//! - Phrase: `[note_note_...]<duration><dots>`, e.g. `G3_D5_F5q`, `C4e.`, `q.`
//!   (no notes = rest). Duration letters: `w h q e s t l`.
//! - Commands: `=LROn=`, `=LROff=`, `=LRw=`, `=LRh=`, `=LRq=`.
//! - `=LR=` lets the next phrase ring without touching the sticky flag.

use log::{debug, warn};

use crate::duration::{dotted, duration_for_letter};
use crate::error::ScoreError;
use crate::note::Note;
use crate::phrase::{Phrase, PlayingCommand};
use crate::track::{MediaPatch, Track};

/// Played when no song file is given.
pub const DEFAULT_SONG: &str = "C5s C#5s D5h q. G3_G4_B4q D5_F5q q G3_D5_F5q G3_D5_F5e e. \
A3_C5_E5e. e B3_B4_D5e. e. C4_G4_C5q E4q G3q E4q C3_C4w";

pub const DEFAULT_SONG_TEMPO: u32 = 400;

fn parse_command(token: &str) -> Result<PlayingCommand, ScoreError> {
    match token {
        "=LROn=" => Ok(PlayingCommand::SustainOn),
        "=LROff=" => Ok(PlayingCommand::SustainOff),
        "=LR=" => Ok(PlayingCommand::SustainThisPhrase),
        "=LRw=" => Ok(PlayingCommand::SustainLenWhole),
        "=LRh=" => Ok(PlayingCommand::SustainLenHalf),
        "=LRq=" => Ok(PlayingCommand::SustainLenQuarter),
        _ => Err(ScoreError::Parse {
            token: token.to_string(),
            reason: "unknown command".to_string(),
        }),
    }
}

/// Parses one note/rest token such as `A3_C5_E5e.`.
pub fn parse_phrase(token: &str) -> Result<Phrase, ScoreError> {
    let invalid = |reason: String| ScoreError::Parse {
        token: token.to_string(),
        reason,
    };

    let body = token.trim_end_matches('.');
    let dots = token.len() - body.len();

    let letter = body
        .chars()
        .last()
        .ok_or_else(|| invalid("missing duration".to_string()))?;
    let base = duration_for_letter(letter)
        .ok_or_else(|| invalid(format!("unknown duration '{letter}'")))?;

    let notes_part = &body[..body.len() - letter.len_utf8()];
    let notes = notes_part
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Note>().map_err(|_| invalid(format!("bad note '{s}'"))))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Phrase::chord(dotted(base, dots), notes))
}

/// Parses a whitespace separated score into phrases.
pub fn parse_score(score: &str) -> Result<Vec<Phrase>, ScoreError> {
    let mut phrases = Vec::new();
    let mut modifier = PlayingCommand::None;

    for token in score.split_whitespace() {
        if token.starts_with('=') {
            match parse_command(token)? {
                PlayingCommand::SustainThisPhrase => modifier = PlayingCommand::SustainThisPhrase,
                command => phrases.push(Phrase::command(command)),
            }
            continue;
        }

        let phrase = parse_phrase(token)?.with_command(modifier);
        modifier = PlayingCommand::None;
        phrases.push(phrase);
    }

    if modifier == PlayingCommand::SustainThisPhrase {
        warn!("'{}' at the end of the score has no phrase to ring", PlayingCommand::SustainThisPhrase.token());
    }

    debug!("parsed {} phrases", phrases.len());
    Ok(phrases)
}

/// Parses a score string into a clean guitar track.
pub fn parse_track(score: &str, tempo: u32) -> Result<Track, ScoreError> {
    if tempo == 0 {
        return Err(ScoreError::InvalidTempo("tempo must be positive".to_string()));
    }
    Ok(Track {
        phrases: parse_score(score)?,
        tempo,
        channel: 0,
        patch: MediaPatch::CleanGuitar,
    })
}

/// Parses a song file: the first line is the tempo, the rest is the score.
pub fn parse_song_file(content: &str) -> Result<Track, ScoreError> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let tempo_line = lines
        .next()
        .ok_or_else(|| ScoreError::InvalidSongFile("file is empty".to_string()))?;
    let tempo: u32 = tempo_line
        .trim()
        .parse()
        .map_err(|_| ScoreError::InvalidTempo(tempo_line.trim().to_string()))?;

    let score: Vec<&str> = lines.collect();
    if score.is_empty() {
        return Err(ScoreError::InvalidSongFile(
            "expected a tempo line followed by a score line".to_string(),
        ));
    }

    parse_track(&score.join(" "), tempo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Tone;

    #[test]
    fn test_two_quarters() {
        let phrases = parse_score("C5q C5q").unwrap();
        assert_eq!(phrases.len(), 2);
        for p in &phrases {
            assert_eq!(p.duration(), 0.25);
            assert_eq!(p.notes(), &[Note::new(5, Tone::C)]);
        }
    }

    #[test]
    fn test_dotted_rest() {
        let phrases = parse_score("q.").unwrap();
        assert_eq!(phrases.len(), 1);
        assert!(phrases[0].is_rest());
        assert_eq!(phrases[0].duration(), 0.375);

        let double = parse_phrase("C4q..").unwrap();
        assert_eq!(double.duration(), 0.4375);
    }

    #[test]
    fn test_chord_token() {
        let p = parse_phrase("G3_D5_F5e").unwrap();
        assert_eq!(p.notes().len(), 3);
        assert_eq!(p.notes()[0], Note::new(3, Tone::G));
        assert_eq!(p.duration(), 0.125);
    }

    #[test]
    fn test_let_ring_marks_only_next_phrase() {
        let phrases = parse_score("=LR= C5q D5q").unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].playing_command(), PlayingCommand::SustainThisPhrase);
        assert_eq!(phrases[1].playing_command(), PlayingCommand::None);
    }

    #[test]
    fn test_trailing_let_ring_is_dropped() {
        let phrases = parse_score("C5q =LR=").unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].playing_command(), PlayingCommand::None);
        assert!(parse_score("=LR=").unwrap().is_empty());
    }

    #[test]
    fn test_sticky_commands_become_phrases() {
        let phrases = parse_score("=LROn= =LRw= C5q =LROff= =LRh= =LRq=").unwrap();
        let commands: Vec<_> = phrases.iter().map(|p| p.playing_command()).collect();
        assert_eq!(
            commands,
            vec![
                PlayingCommand::SustainOn,
                PlayingCommand::SustainLenWhole,
                PlayingCommand::None,
                PlayingCommand::SustainOff,
                PlayingCommand::SustainLenHalf,
                PlayingCommand::SustainLenQuarter,
            ]
        );
    }

    #[test]
    fn test_unknown_command_names_token() {
        let err = parse_score("C5q =LRx=").unwrap_err();
        assert_eq!(
            err,
            ScoreError::Parse {
                token: "=LRx=".to_string(),
                reason: "unknown command".to_string()
            }
        );
    }

    #[test]
    fn test_bad_note_names_token() {
        let err = parse_score("C5q X9q").unwrap_err();
        match err {
            ScoreError::Parse { token, .. } => assert_eq!(token, "X9q"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(parse_score("C5"), Err(ScoreError::Parse { .. })));
        assert!(matches!(parse_score("C5x"), Err(ScoreError::Parse { .. })));
    }

    #[test]
    fn test_song_file() {
        let track = parse_song_file("120\nC5q E5q\n").unwrap();
        assert_eq!(track.tempo, 120);
        assert_eq!(track.phrases.len(), 2);

        assert!(matches!(parse_song_file("120\n"), Err(ScoreError::InvalidSongFile(_))));
        assert!(matches!(parse_song_file("fast\nC5q"), Err(ScoreError::InvalidTempo(_))));
    }

    #[test]
    fn test_default_song_parses() {
        let track = parse_track(DEFAULT_SONG, DEFAULT_SONG_TEMPO).unwrap();
        assert_eq!(track.phrases.len(), 19);
    }
}
