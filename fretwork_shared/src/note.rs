use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::ScoreError;

/// The twelve pitch classes, numbered from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tone {
    C = 0,
    CSharp = 1,
    D = 2,
    DSharp = 3,
    E = 4,
    F = 5,
    FSharp = 6,
    G = 7,
    GSharp = 8,
    A = 9,
    ASharp = 10,
    B = 11,
}

impl Tone {
    /// All tones in semitone order, so `ALL[n]` has value `n`.
    const ALL: [Tone; 12] = [
        Tone::C, Tone::CSharp, Tone::D, Tone::DSharp, Tone::E, Tone::F,
        Tone::FSharp, Tone::G, Tone::GSharp, Tone::A, Tone::ASharp, Tone::B,
    ];

    pub fn from_index(idx: usize) -> Option<Tone> {
        Self::ALL.get(idx).copied()
    }

    pub const fn value(self) -> i32 {
        self as i32
    }

    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            Tone::CSharp | Tone::DSharp | Tone::FSharp | Tone::GSharp | Tone::ASharp
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Tone::C => "C",
            Tone::CSharp => "C#",
            Tone::D => "D",
            Tone::DSharp => "D#",
            Tone::E => "E",
            Tone::F => "F",
            Tone::FSharp => "F#",
            Tone::G => "G",
            Tone::GSharp => "G#",
            Tone::A => "A",
            Tone::ASharp => "A#",
            Tone::B => "B",
        }
    }

    fn from_letter(letter: char, sharp: bool) -> Option<Tone> {
        let natural = match letter.to_ascii_uppercase() {
            'C' => Tone::C,
            'D' => Tone::D,
            'E' => Tone::E,
            'F' => Tone::F,
            'G' => Tone::G,
            'A' => Tone::A,
            'B' => Tone::B,
            _ => return None,
        };
        if !sharp {
            return Some(natural);
        }
        // E# and B# have no sharp of their own
        match natural {
            Tone::E | Tone::B => None,
            other => Self::from_index(other as usize + 1),
        }
    }
}

/// A pitch identity. Two notes are equal iff their ids are equal.
///
/// `id = 12 + octave * 12 + tone`, which makes the id line up with MIDI key
/// numbers (`C4` = 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Note {
    id: i32,
}

impl Note {
    pub const fn new(octave: i32, tone: Tone) -> Self {
        Self {
            id: 12 + octave * 12 + tone.value(),
        }
    }

    pub const fn from_id(id: i32) -> Self {
        Self { id }
    }

    pub const fn id(self) -> i32 {
        self.id
    }

    pub fn octave(self) -> i32 {
        self.id.div_euclid(12) - 1
    }

    pub fn tone(self) -> Tone {
        // rem_euclid keeps the index in 0..12
        Tone::ALL[self.id.rem_euclid(12) as usize]
    }

    pub fn is_sharp(self) -> bool {
        self.tone().is_sharp()
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self {
            id: self.id + semitones,
        }
    }

    /// Absolute distance in semitones.
    pub fn distance(self, other: Note) -> u32 {
        self.id.abs_diff(other.id)
    }
}

impl Add<i32> for Note {
    type Output = Note;

    fn add(self, semitones: i32) -> Note {
        self.transpose(semitones)
    }
}

impl Sub for Note {
    type Output = u32;

    fn sub(self, other: Note) -> u32 {
        self.distance(other)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tone().name(), self.octave())
    }
}

impl FromStr for Note {
    type Err = ScoreError;

    /// Parses `<A-G>[#]<octave digit>`, e.g. `E2`, `c#5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ScoreError::Parse {
            token: s.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(|| invalid("empty note"))?;
        let rest: Vec<char> = chars.collect();

        let (sharp, octave_char) = match rest.as_slice() {
            [digit] => (false, *digit),
            ['#', digit] => (true, *digit),
            _ => return Err(invalid("expected <letter>[#]<octave>")),
        };

        let octave = octave_char
            .to_digit(10)
            .ok_or_else(|| invalid("octave must be a single digit"))?;
        let tone = Tone::from_letter(letter, sharp).ok_or_else(|| invalid("unknown tone"))?;

        Ok(Note::new(octave as i32, tone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_layout() {
        assert_eq!(Note::new(4, Tone::C).id(), 60);
        assert_eq!(Note::new(0, Tone::C).id(), 12);
        assert_eq!(Note::new(2, Tone::E).id(), 40);
    }

    #[test]
    fn test_octave_up_is_twelve_semitones() {
        for octave in 0..9 {
            for idx in 0..12 {
                let tone = Tone::from_index(idx).unwrap();
                assert_eq!(Note::new(octave, tone) + 12, Note::new(octave + 1, tone));
            }
        }
    }

    #[test]
    fn test_from_id_round_trip() {
        for id in -24..200 {
            let note = Note::from_id(id);
            assert_eq!(note.id(), id);
            assert_eq!(Note::new(note.octave(), note.tone()), note);
        }
    }

    #[test]
    fn test_transpose_carries_octave() {
        let b3 = Note::new(3, Tone::B);
        let c4 = b3 + 1;
        assert_eq!(c4.octave(), 4);
        assert_eq!(c4.tone(), Tone::C);

        let e2 = Note::new(2, Tone::E);
        assert_eq!((e2 + 25).to_string(), "F4");
    }

    #[test]
    fn test_ordering_and_distance() {
        let a = Note::new(3, Tone::A);
        let c = Note::new(4, Tone::C);
        assert!(a < c);
        assert_eq!(c - a, 3);
        assert_eq!(a - c, 3);
    }

    #[test]
    fn test_parse_and_display() {
        let note: Note = "C#5".parse().unwrap();
        assert_eq!(note, Note::new(5, Tone::CSharp));
        assert!(note.is_sharp());
        assert_eq!(note.to_string(), "C#5");

        let lower: Note = "g3".parse().unwrap();
        assert_eq!(lower, Note::new(3, Tone::G));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "H3", "C", "C10", "E#2", "C#", "Cb4"] {
            let err = bad.parse::<Note>().unwrap_err();
            match err {
                ScoreError::Parse { token, .. } => assert_eq!(token, bad),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }
}
