use std::sync::Arc;

use fretwork_shared::midi::read_midi_tracks;
use fretwork_shared::note::{Note, Tone};
use fretwork_shared::score::parse_track;
use fretwork_shared::track::MediaPatch;

use crate::assets::MediaBank;
use crate::engine::{NoteEngine, NoteEngineConfig, NoteState};
use crate::export::{ExportConfig, render_tracks, write_wav};
use crate::mixer::OutputMixer;
use crate::sequencer::{SequencerSource, TrackSequencer};

const RATE: u32 = 8_000;

fn flat_bank(level: f32) -> Arc<MediaBank> {
    let mut bank = MediaBank::with_seed("flat", RATE, 5);
    for id in 0..128 {
        bank.insert(Note::from_id(id), vec![level; RATE as usize]);
    }
    Arc::new(bank)
}

#[test]
fn test_device_sized_buffers_keep_phrase_timing() {
    let track = parse_track("C5q C5q", 120).unwrap();
    let seq = Arc::new(TrackSequencer::new(&track, flat_bank(0.5)));
    let rx = seq.subscribe();

    let output = OutputMixer::new(true);
    output.add_input(Box::new(SequencerSource(Arc::clone(&seq))));

    let mut buf = vec![0.0; 441];
    let mut pulled = 0;
    while pulled < 3_000 {
        pulled += output.read(&mut buf);
    }

    let starts: Vec<u64> = rx.try_iter().map(|e| e.at_sample).collect();
    assert_eq!(starts, vec![0, 1_000]);
}

#[test]
fn test_sequencer_and_live_notes_share_output() {
    let output = Arc::new(OutputMixer::new(true));
    let track = parse_track("E5w", 60).unwrap();
    let seq = Arc::new(TrackSequencer::new(&track, flat_bank(0.25)));
    output.add_input(Box::new(SequencerSource(seq)));

    let engine = NoteEngine::new(
        Arc::clone(&output),
        NoteEngineConfig {
            sample_rate: RATE,
            seed: Some(9),
            ..Default::default()
        },
    );
    engine.set_media_bank(flat_bank(1.0));
    let a4 = Note::new(4, Tone::A);
    engine.note_on(a4);
    assert_eq!(engine.note_state(a4), NoteState::Sounding);
    assert_eq!(output.len(), 2);

    let mut buf = vec![0.0; 200];
    output.read(&mut buf);
    // sequencer voice (0.25) plus the live voice at its random gain
    let live = buf[150] - 0.25;
    assert!((0.55..0.70).contains(&live), "live level {live}");
}

#[test]
fn test_midi_to_wav() {
    // one track, program 33 (bass), a quarter note then an eighth after a quarter rest
    let body: Vec<u8> = vec![
        0x00, 0xC0, 33,
        0x00, 0x90, 40, 100,
        0x83, 0x60, 0x80, 40, 0,
        0x83, 0x60, 0x90, 43, 100,
        0x81, 0x70, 0x80, 43, 0,
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let mut smf = Vec::new();
    smf.extend_from_slice(b"MThd");
    smf.extend_from_slice(&[0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0]);
    smf.extend_from_slice(b"MTrk");
    smf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    smf.extend_from_slice(&body);

    let tracks = read_midi_tracks(&smf).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].patch, MediaPatch::Bass);
    assert_eq!(tracks[0].tempo, 120);
    assert_eq!(tracks[0].phrases.len(), 3);

    let seq = Arc::new(TrackSequencer::new(&tracks[0], flat_bank(0.5)));
    let expected = seq.total_samples() + RATE as u64 / 2;
    let mixed = render_tracks(&[seq], 0.7);
    assert_eq!(mixed.len() as u64, expected);

    let path = std::env::temp_dir().join(format!("fretwork_midi_{}.wav", std::process::id()));
    let config = ExportConfig {
        sample_rate: RATE,
        ..Default::default()
    };
    write_wav(&path, &mixed, &config).unwrap();
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.len() as usize, mixed.len());
    std::fs::remove_file(&path).unwrap();
}
