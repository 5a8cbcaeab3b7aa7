//! Pull-driven playback of one track.
//!
//! The audio side calls `render` with whatever buffer size it likes; phrase
//! boundaries falling inside a buffer are honoured by delaying the phrase's
//! voice inside the mixer by the number of samples already produced.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, unbounded};
use fretwork_shared::duration::{seconds_to_samples, whole_note_seconds};
use fretwork_shared::phrase::{Phrase, PlayingCommand};
use fretwork_shared::track::Track;
use log::debug;

use crate::assets::MediaBank;
use crate::error::EngineError;
use crate::mixer::Mixer;
use crate::nodes::{FadeOut, Offset, SampleSource, SumSource};

/// Fade applied when a phrase (plus any sustain) runs out, in seconds.
pub const DEFAULT_FADE_OUT: f64 = 0.01;

/// Sent when a phrase is dequeued, or becomes current through a seek.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseStarted {
    pub index: usize,
    pub phrase: Phrase,
    /// Timeline position of the phrase start.
    pub at_sample: u64,
}

/// Sustain lengths derived from the track tempo.
#[derive(Debug, Clone, Copy)]
struct SustainLengths {
    whole: f64,
    half: f64,
    quarter: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerSnapshot {
    pub position: u64,
    /// Samples left of the current phrase.
    pub remaining: u64,
    /// Indices of phrases not yet started.
    pub queued: Vec<usize>,
    pub active_voices: usize,
    pub let_ring: bool,
    pub let_ring_seconds: f64,
    /// Silence still to be produced after the last phrase.
    pub tail_remaining: u64,
}

struct SequencerState {
    queue: VecDeque<usize>,
    mixer: Mixer,
    position: u64,
    remaining: u64,
    tail_remaining: u64,
    let_ring: bool,
    let_ring_seconds: f64,
    subscribers: Vec<Sender<PhraseStarted>>,
}

pub struct TrackSequencer {
    phrases: Vec<Phrase>,
    tempo: u32,
    bank: Arc<MediaBank>,
    sample_rate: u32,
    sustain: SustainLengths,
    total_samples: u64,
    tail_samples: u64,
    state: Mutex<SequencerState>,
}

impl TrackSequencer {
    pub fn new(track: &Track, bank: Arc<MediaBank>) -> Self {
        let sample_rate = bank.sample_rate();
        let whole = whole_note_seconds(track.tempo);
        let sustain = SustainLengths {
            whole,
            half: whole / 2.0,
            quarter: whole / 4.0,
        };
        let tail_samples = seconds_to_samples(whole, sample_rate);

        Self {
            phrases: track.phrases.clone(),
            tempo: track.tempo,
            total_samples: track.total_samples(sample_rate),
            bank,
            sample_rate,
            sustain,
            tail_samples,
            state: Mutex::new(SequencerState {
                queue: (0..track.phrases.len()).collect(),
                mixer: Mixer::new(true),
                position: 0,
                remaining: 0,
                tail_remaining: tail_samples,
                let_ring: false,
                let_ring_seconds: sustain.quarter,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SequencerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    /// Length of the phrase timeline, excluding the finishing tail.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn position(&self) -> u64 {
        self.lock().position
    }

    /// Receives a `PhraseStarted` for every phrase from now on.
    pub fn subscribe(&self) -> Receiver<PhraseStarted> {
        let (tx, rx) = unbounded();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn snapshot(&self) -> SequencerSnapshot {
        let state = self.lock();
        SequencerSnapshot {
            position: state.position,
            remaining: state.remaining,
            queued: state.queue.iter().copied().collect(),
            active_voices: state.mixer.len(),
            let_ring: state.let_ring,
            let_ring_seconds: state.let_ring_seconds,
            tail_remaining: state.tail_remaining,
        }
    }

    /// Fills `out` and returns how many samples are valid. A short count means
    /// the track and its tail are over.
    pub fn render(&self, out: &mut [f32]) -> usize {
        let mut state = self.lock();
        let count = out.len() as u64;
        let mut written: u64 = 0;

        if state.remaining > 0 {
            let consumed = state.remaining.min(count);
            state.remaining -= consumed;
            written += consumed;
        }

        while written < count {
            let Some(index) = state.queue.pop_front() else {
                break;
            };
            let phrase = &self.phrases[index];
            let at_sample = state.position + written;
            notify(&mut state, index, phrase, at_sample);

            let ring_this = self.apply_command(&mut state, phrase.playing_command());
            state.remaining = phrase.samples(self.tempo, self.sample_rate);
            if let Some(voice) = self.phrase_voice(&state, phrase, ring_this) {
                state.mixer.add_input(Box::new(Offset::new(voice).delay_by(written)));
            }

            let consumed = state.remaining.min(count - written);
            written += consumed;
            state.remaining -= consumed;
        }

        if state.tail_remaining == 0 {
            out.fill(0.0);
            return 0;
        }

        let to_read = if state.queue.is_empty() {
            (written + state.tail_remaining).min(count)
        } else {
            count
        };
        let to_read = to_read as usize;
        let got = state.mixer.read(&mut out[..to_read]) as u64;
        out[to_read..].fill(0.0);

        if state.remaining == 0 && state.queue.is_empty() {
            state.tail_remaining = state.tail_remaining.saturating_sub(got - written);
        }
        state.position += got;
        got as usize
    }

    /// Moves playback to `position` (in samples on the phrase timeline).
    pub fn seek(&self, position: u64) -> Result<(), EngineError> {
        if position >= self.total_samples {
            return Err(EngineError::OutOfRange {
                position,
                length: self.total_samples,
            });
        }

        let mut state = self.lock();
        state.mixer.clear();
        state.queue = (0..self.phrases.len()).collect();
        state.position = position;
        state.remaining = 0;
        state.tail_remaining = self.tail_samples;
        state.let_ring = false;
        state.let_ring_seconds = self.sustain.quarter;

        if position == 0 {
            return Ok(());
        }

        let mut start: u64 = 0;
        while let Some(index) = state.queue.pop_front() {
            let phrase = &self.phrases[index];
            let ring_this = self.apply_command(&mut state, phrase.playing_command());
            let len = phrase.samples(self.tempo, self.sample_rate);

            if start + len > position {
                let offset = position - start;
                notify(&mut state, index, phrase, start);
                state.remaining = len - offset;
                if let Some(voice) = self.phrase_voice(&state, phrase, ring_this) {
                    state.mixer.add_input(Box::new(Offset::new(voice).skip_over(offset)));
                }
                debug!("seek to {position}: phrase {index} at offset {offset}");
                break;
            }
            start += len;
        }

        Ok(())
    }

    /// Applies a phrase's command. Returns true when only this phrase rings.
    fn apply_command(&self, state: &mut SequencerState, command: PlayingCommand) -> bool {
        match command {
            PlayingCommand::None => {}
            PlayingCommand::SustainOn => state.let_ring = true,
            PlayingCommand::SustainOff => state.let_ring = false,
            PlayingCommand::SustainThisPhrase => return true,
            PlayingCommand::SustainLenWhole => state.let_ring_seconds = self.sustain.whole,
            PlayingCommand::SustainLenHalf => state.let_ring_seconds = self.sustain.half,
            PlayingCommand::SustainLenQuarter => state.let_ring_seconds = self.sustain.quarter,
        }
        false
    }

    /// All notes of the phrase summed, cut with a short fade after the phrase
    /// (plus sustain) has elapsed. `None` for rests, commands and phrases
    /// whose notes the bank does not have.
    fn phrase_voice(
        &self,
        state: &SequencerState,
        phrase: &Phrase,
        ring_this: bool,
    ) -> Option<FadeOut<SumSource>> {
        if !phrase.has_notes() {
            return None;
        }
        let sum = SumSource::new(phrase.notes().iter().filter_map(|&n| self.bank.pick(n)));
        if sum.is_empty() {
            return None;
        }

        let extra = if state.let_ring || ring_this {
            state.let_ring_seconds
        } else {
            0.0
        };
        let fade_after = seconds_to_samples(phrase.seconds(self.tempo) + extra, self.sample_rate);
        let fade_len = seconds_to_samples(DEFAULT_FADE_OUT, self.sample_rate);
        Some(FadeOut::new(sum, fade_after, fade_len))
    }
}

fn notify(state: &mut SequencerState, index: usize, phrase: &Phrase, at_sample: u64) {
    state.subscribers.retain(|tx| {
        tx.send(PhraseStarted {
            index,
            phrase: phrase.clone(),
            at_sample,
        })
        .is_ok()
    });
}

/// Lets a shared sequencer feed an `OutputMixer`.
pub struct SequencerSource(pub Arc<TrackSequencer>);

impl SampleSource for SequencerSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        self.0.render(out)
    }
}
