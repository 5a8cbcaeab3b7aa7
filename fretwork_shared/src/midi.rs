//! MIDI import: decoded SMF tracks to phrase tracks.
//!
//! Notes that start on the same tick form one chord phrase lasting as long as
//! its longest note; gaps between chords become rests.

use log::{debug, info};

use crate::error::ScoreError;
use crate::note::Note;
use crate::phrase::Phrase;
use crate::smf::{read_smf, SmfFile, SmfTrack};
use crate::track::{MediaPatch, Track, DEFAULT_TEMPO};

/// General MIDI program names, indexed by program number.
pub const GM_PROGRAM_NAMES: [&str; 128] = [
    "Acoustic Grand", "Bright Acoustic", "Electric Grand", "Honky-Tonk",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clav",
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accoridan", "Harmonica", "Tango Accordian",
    "Acoustic Guitar(nylon)", "Acoustic Guitar(steel)", "Electric Guitar(jazz)", "Electric Guitar(clean)",
    "Electric Guitar(muted)", "Overdriven Guitar", "Distortion Guitar", "Guitar Harmonics",
    "Acoustic Bass", "Electric Bass(finger)", "Electric Bass(pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Strings", "Timpani",
    "String Ensemble 1", "String Ensemble 2", "SynthStrings 1", "SynthStrings 2",
    "Choir Aahs", "Voice Oohs", "Synth Voice", "Orchestra Hit",
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "SynthBrass 1", "SynthBrass 2",
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown Bottle", "Skakuhachi", "Whistle", "Ocarina",
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass+lead)",
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

/// Tracks using this program are not imported.
pub const DROPPED_PROGRAM: &str = "Steel Drums";

pub fn program_name(program: u8) -> &'static str {
    GM_PROGRAM_NAMES[(program & 0x7F) as usize]
}

/// Picks the sample bank for a track's first program change.
///
/// Returns `None` for tracks that should be dropped.
pub fn patch_for_program(program: Option<u8>) -> Option<MediaPatch> {
    match program {
        None => Some(MediaPatch::CleanGuitar),
        Some(p) if program_name(p) == DROPPED_PROGRAM => None,
        Some(0) => Some(MediaPatch::Drums),
        Some(p) if program_name(p).to_ascii_lowercase().contains("bass") => Some(MediaPatch::Bass),
        Some(_) => Some(MediaPatch::CleanGuitar),
    }
}

fn phrases_for_track(track: &SmfTrack, whole_note_ticks: f64, channel: u32) -> Vec<Phrase> {
    let mut phrases = Vec::new();
    let mut last_tick: u64 = 0;

    let mut i = 0;
    while i < track.notes.len() {
        let start = track.notes[i].tick;
        let group_end = track.notes[i..]
            .iter()
            .position(|n| n.tick != start)
            .map_or(track.notes.len(), |offset| i + offset);
        let group = &track.notes[i..group_end];

        if start > last_tick {
            let pause = (start - last_tick) as f64 / whole_note_ticks;
            phrases.push(Phrase::rest(pause).with_channel(channel));
        }

        let length = group.iter().map(|n| n.length).max().unwrap_or(0);
        let notes = group.iter().map(|n| Note::from_id(n.key as i32));
        phrases.push(Phrase::chord(length as f64 / whole_note_ticks, notes).with_channel(channel));

        last_tick = start + length;
        i = group_end;
    }

    phrases
}

/// Converts decoded SMF data into tracks.
///
/// Tempo is the track's first tempo event, falling back to the first tempo
/// event anywhere in the file (normally the conductor track), then 120.
pub fn tracks_from_smf(smf: &SmfFile) -> Vec<Track> {
    let whole_note_ticks = smf.ticks_per_quarter.max(1) as f64 * 4.0;
    let file_tempo = smf.tracks.iter().find_map(|t| t.tempo_bpm);

    let mut tracks = Vec::new();
    for (index, smf_track) in smf.tracks.iter().enumerate() {
        let channel = index as u32;

        let Some(patch) = patch_for_program(smf_track.program) else {
            debug!("dropping track {index} ({DROPPED_PROGRAM})");
            continue;
        };
        if smf_track.notes.is_empty() {
            continue;
        }

        let tempo = smf_track
            .tempo_bpm
            .or(file_tempo)
            .filter(|&t| t > 0)
            .unwrap_or(DEFAULT_TEMPO);

        tracks.push(Track {
            phrases: phrases_for_track(smf_track, whole_note_ticks, channel),
            tempo,
            channel,
            patch,
        });
    }

    info!("imported {} MIDI tracks", tracks.len());
    tracks
}

pub fn read_midi_tracks(bytes: &[u8]) -> Result<Vec<Track>, ScoreError> {
    let smf = read_smf(bytes)?;
    Ok(tracks_from_smf(&smf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smf::SmfNote;

    fn note(tick: u64, length: u64, key: u8) -> SmfNote {
        SmfNote { tick, length, key, channel: 0 }
    }

    #[test]
    fn test_patch_mapping() {
        assert_eq!(patch_for_program(None), Some(MediaPatch::CleanGuitar));
        assert_eq!(patch_for_program(Some(0)), Some(MediaPatch::Drums));
        assert_eq!(patch_for_program(Some(33)), Some(MediaPatch::Bass));
        assert_eq!(patch_for_program(Some(43)), Some(MediaPatch::Bass));
        assert_eq!(patch_for_program(Some(27)), Some(MediaPatch::CleanGuitar));
        assert_eq!(patch_for_program(Some(114)), None);
    }

    #[test]
    fn test_grouping_and_rests() {
        let smf = SmfFile {
            format: 1,
            ticks_per_quarter: 480,
            tracks: vec![SmfTrack {
                tempo_bpm: Some(90),
                program: Some(25),
                notes: vec![
                    note(0, 480, 48),
                    note(0, 960, 52),
                    note(1920, 480, 55),
                ],
            }],
        };

        let tracks = tracks_from_smf(&smf);
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.tempo, 90);
        assert_eq!(track.patch, MediaPatch::CleanGuitar);

        let phrases = &track.phrases;
        assert_eq!(phrases.len(), 3);
        assert_eq!(phrases[0].notes(), &[Note::from_id(48), Note::from_id(52)]);
        assert_eq!(phrases[0].duration(), 0.5);
        // chord ends at 960, next starts at 1920
        assert!(phrases[1].is_rest());
        assert_eq!(phrases[1].duration(), 0.5);
        assert_eq!(phrases[2].duration(), 0.25);
    }

    #[test]
    fn test_tempo_fallbacks_and_dropped_tracks() {
        let conductor = SmfTrack { tempo_bpm: Some(100), program: None, notes: vec![] };
        let steel = SmfTrack { tempo_bpm: None, program: Some(114), notes: vec![note(0, 10, 60)] };
        let bass = SmfTrack { tempo_bpm: None, program: Some(34), notes: vec![note(0, 10, 40)] };
        let smf = SmfFile { format: 1, ticks_per_quarter: 96, tracks: vec![conductor, steel, bass] };

        let tracks = tracks_from_smf(&smf);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].patch, MediaPatch::Bass);
        assert_eq!(tracks[0].tempo, 100);
        assert_eq!(tracks[0].channel, 2);

        let lonely = SmfFile {
            format: 0,
            ticks_per_quarter: 96,
            tracks: vec![SmfTrack { tempo_bpm: None, program: None, notes: vec![note(0, 96, 60)] }],
        };
        assert_eq!(tracks_from_smf(&lonely)[0].tempo, DEFAULT_TEMPO);
    }

    #[test]
    fn test_read_midi_tracks_end_to_end() {
        use crate::smf::tests::{build_smf, vlq};

        let mut body = vec![0x00, 0xC0, 0x00, 0x00, 0x99, 36, 90];
        body.extend(vlq(240));
        body.extend_from_slice(&[0x89, 36, 0]);
        let bytes = build_smf(480, &[body]);

        let tracks = read_midi_tracks(&bytes).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].patch, MediaPatch::Drums);
        assert_eq!(tracks[0].phrases[0].duration(), 0.125);
    }
}
