//! Duration model: symbolic phrase lengths to seconds and sample counts.
//!
//! A duration is a fraction of a whole note. One whole note lasts
//! `BASE_TEMPO / tempo` seconds, so at tempo 60 a whole note is one second.

/// Reference tempo at which a whole note lasts exactly one second.
pub const BASE_TEMPO: f64 = 60.0;

pub const WHOLE: f64 = 1.0;
pub const HALF: f64 = 1.0 / 2.0;
pub const QUARTER: f64 = 1.0 / 4.0;
pub const EIGHTH: f64 = 1.0 / 8.0;
pub const SIXTEENTH: f64 = 1.0 / 16.0;
pub const THIRTY_SECOND: f64 = 1.0 / 32.0;
pub const SIXTY_FOURTH: f64 = 1.0 / 64.0;

/// Length of one whole note in seconds at `tempo`.
pub fn whole_note_seconds(tempo: u32) -> f64 {
    BASE_TEMPO / tempo as f64
}

pub fn phrase_seconds(duration: f64, tempo: u32) -> f64 {
    whole_note_seconds(tempo) * duration
}

pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round().max(0.0) as u64
}

pub fn phrase_samples(duration: f64, tempo: u32, sample_rate: u32) -> u64 {
    seconds_to_samples(phrase_seconds(duration, tempo), sample_rate)
}

/// Extends `base` by `dots` dots. Each dot adds half of the previous increment.
///
/// ```
/// use fretwork_shared::duration::{dotted, QUARTER};
/// assert_eq!(dotted(QUARTER, 1), 0.375);
/// assert_eq!(dotted(QUARTER, 2), 0.4375);
/// ```
pub fn dotted(base: f64, dots: usize) -> f64 {
    let mut increment = base;
    let mut total = base;
    for _ in 0..dots {
        increment /= 2.0;
        total += increment;
    }
    total
}

/// Maps a score duration letter to its fraction of a whole note.
pub fn duration_for_letter(letter: char) -> Option<f64> {
    match letter {
        'w' => Some(WHOLE),
        'h' => Some(HALF),
        'q' => Some(QUARTER),
        'e' => Some(EIGHTH),
        's' => Some(SIXTEENTH),
        't' => Some(THIRTY_SECOND),
        'l' => Some(SIXTY_FOURTH),
        _ => None,
    }
}
