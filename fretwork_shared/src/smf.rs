//! Standard MIDI File events reduced to what the importer needs.
//!
//! Decoding is done by `midly`; this module pairs note on/off events into
//! notes (start tick + length) and keeps the first tempo and the first program
//! change of every track.

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::ScoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmfNote {
    pub tick: u64,
    pub length: u64,
    pub key: u8,
    pub channel: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmfTrack {
    /// First tempo meta event, in beats per minute.
    pub tempo_bpm: Option<u32>,
    /// First program change.
    pub program: Option<u8>,
    /// Notes ordered by start tick.
    pub notes: Vec<SmfNote>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmfFile {
    pub format: u16,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<SmfTrack>,
}

pub fn read_smf(bytes: &[u8]) -> Result<SmfFile, ScoreError> {
    let smf = Smf::parse(bytes).map_err(|e| ScoreError::Midi(e.to_string()))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => {
            return Err(ScoreError::Midi("SMPTE time division is not supported".to_string()));
        }
    };
    let format = match smf.header.format {
        midly::Format::SingleTrack => 0,
        midly::Format::Parallel => 1,
        midly::Format::Sequential => 2,
    };

    Ok(SmfFile {
        format,
        ticks_per_quarter,
        tracks: smf.tracks.iter().map(|events| collect_track(events)).collect(),
    })
}

fn collect_track(events: &[TrackEvent<'_>]) -> SmfTrack {
    let mut track = SmfTrack::default();

    let mut tick: u64 = 0;
    // (channel, key) -> open notes as (start tick, note-on order), oldest first
    let mut open: HashMap<(u8, u8), Vec<(u64, usize)>> = HashMap::new();
    let mut finished: Vec<(usize, SmfNote)> = Vec::new();
    let mut order = 0usize;

    for event in events {
        tick += event.delta.as_int() as u64;

        match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                let micros = micros.as_int();
                if micros > 0 && track.tempo_bpm.is_none() {
                    track.tempo_bpm = Some((60_000_000.0 / micros as f64).round() as u32);
                }
            }
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry((channel, key.as_int())).or_default().push((tick, order));
                        order += 1;
                    }
                    // note-on with velocity 0 is a note-off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let key = key.as_int();
                        if let Some(stack) = open.get_mut(&(channel, key)) {
                            if !stack.is_empty() {
                                let (start, idx) = stack.remove(0);
                                finished.push((
                                    idx,
                                    SmfNote { tick: start, length: tick - start, key, channel },
                                ));
                            }
                        }
                    }
                    MidiMessage::ProgramChange { program } => {
                        track.program.get_or_insert(program.as_int());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Notes still held at the end of the track last until the end.
    for ((channel, key), stack) in open {
        for (start, idx) in stack {
            finished.push((idx, SmfNote { tick: start, length: tick - start, key, channel }));
        }
    }

    finished.sort_by_key(|(idx, note)| (note.tick, *idx));
    track.notes = finished.into_iter().map(|(_, note)| note).collect();
    track
}
