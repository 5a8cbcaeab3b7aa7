//! Live note triggering with "let it ring" sustain.
//!
//! Every public call and every timer expiry takes the same state lock, so a
//! sustain fade that was cancelled or replaced can never stop a newer voice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use fretwork_shared::duration::seconds_to_samples;
use fretwork_shared::note::Note;
use log::{debug, warn};

use crate::assets::MediaBank;
use crate::commands::TimerAction;
use crate::mixer::{OutputMixer, VoiceId};
use crate::nodes::{BufferSource, Envelope, EnvelopeHandle, Gain};
use crate::scheduler::TimerScheduler;

pub const DEFAULT_LET_RING_TIME: Duration = Duration::from_millis(600);
const ATTACK_SECONDS: f64 = 0.01;
const RELEASE_SECONDS: f64 = 0.06;

#[derive(Debug, Clone)]
pub struct NoteEngineConfig {
    /// Rate of the mixer the engine feeds.
    pub sample_rate: u32,
    pub let_ring_time: Duration,
    /// Fixed seed for gain and release variation.
    pub seed: Option<u64>,
}

impl Default for NoteEngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            let_ring_time: DEFAULT_LET_RING_TIME,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopOptions {
    /// Stop now even while let-it-ring is on.
    pub force: bool,
    /// Fade out after the let-ring time regardless of let-it-ring.
    pub fade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    Idle,
    Sounding,
    /// Released by the player, waiting for its sustain fade.
    Ringing,
    /// Envelope released, voice about to be removed.
    Releasing,
}

struct ActiveNote {
    voice: VoiceId,
    envelope: EnvelopeHandle,
    release: Duration,
}

struct EngineState {
    playing: HashMap<Note, ActiveNote>,
    /// Pending sustain fade per note.
    ringing: HashMap<Note, u64>,
    releasing: HashMap<VoiceId, Note>,
    let_it_ring: bool,
    let_ring_time: Duration,
    next_ticket: u64,
    rng: fastrand::Rng,
}

struct EngineShared {
    state: Mutex<EngineState>,
    mixer: Arc<OutputMixer>,
    bank: ArcSwapOption<MediaBank>,
    sample_rate: u32,
    timers: TimerScheduler,
}

pub struct NoteEngine {
    shared: Arc<EngineShared>,
}

impl NoteEngine {
    pub fn new(mixer: Arc<OutputMixer>, config: NoteEngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        let shared = Arc::new_cyclic(|weak: &Weak<EngineShared>| {
            let weak = weak.clone();
            let timers = TimerScheduler::spawn(move |action| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer(action);
                }
            });
            EngineShared {
                state: Mutex::new(EngineState {
                    playing: HashMap::new(),
                    ringing: HashMap::new(),
                    releasing: HashMap::new(),
                    let_it_ring: false,
                    let_ring_time: config.let_ring_time,
                    next_ticket: 1,
                    rng,
                }),
                mixer,
                bank: ArcSwapOption::empty(),
                sample_rate: config.sample_rate,
                timers,
            }
        });

        Self { shared }
    }

    pub fn mixer(&self) -> &Arc<OutputMixer> {
        &self.shared.mixer
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn set_media_bank(&self, bank: Arc<MediaBank>) {
        if bank.sample_rate() != self.shared.sample_rate {
            warn!(
                "bank '{}' is at {} Hz, engine runs at {} Hz",
                bank.name(),
                bank.sample_rate(),
                self.shared.sample_rate
            );
        }
        self.shared.bank.store(Some(bank));
    }

    pub fn media_bank(&self) -> Option<Arc<MediaBank>> {
        self.shared.bank.load_full()
    }

    pub fn set_let_it_ring(&self, enabled: bool) {
        self.shared.lock().let_it_ring = enabled;
    }

    pub fn let_it_ring(&self) -> bool {
        self.shared.lock().let_it_ring
    }

    pub fn set_let_ring_time(&self, time: Duration) {
        self.shared.lock().let_ring_time = time;
    }

    pub fn let_ring_time(&self) -> Duration {
        self.shared.lock().let_ring_time
    }

    /// Starts `note`, cutting an instance that is still sounding. Notes the
    /// bank has no sample for are ignored.
    pub fn note_on(&self, note: Note) {
        let bank = self.shared.bank.load_full();
        let Some(buffer) = bank.as_ref().and_then(|b| b.pick(note)) else {
            debug!("note_on {note}: nothing to play");
            return;
        };

        let shared = &self.shared;
        let mut state = shared.lock();
        if state.playing.contains_key(&note) {
            shared.stop_now(&mut state, note);
        }

        // 85-100 % of full level, then 30 % headroom
        let gain = state.rng.u32(85..100) as f32 / 100.0 - 0.3;
        let release_secs = RELEASE_SECONDS + (state.rng.i32(0..20) - 10) as f64 / 1000.0;

        let envelope = Envelope::new(
            Gain::new(BufferSource::new(buffer), gain),
            seconds_to_samples(ATTACK_SECONDS, shared.sample_rate),
            seconds_to_samples(release_secs, shared.sample_rate),
        );
        let handle = envelope.handle();
        let voice = shared.mixer.add_input(Box::new(envelope));

        state.playing.insert(
            note,
            ActiveNote {
                voice,
                envelope: handle,
                release: Duration::from_secs_f64(release_secs),
            },
        );
    }

    /// Stops `note`, or lets it ring when let-it-ring is on.
    pub fn note_off(&self, note: Note) {
        self.note_off_with(note, StopOptions::default());
    }

    /// Lets `note` ring for the let-ring time, whatever the let-it-ring flag says.
    pub fn stop_faded(&self, note: Note) {
        self.note_off_with(note, StopOptions { force: false, fade: true });
    }

    pub fn note_off_with(&self, note: Note, options: StopOptions) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if !state.playing.contains_key(&note) {
            return;
        }

        if (!state.let_it_ring || options.force) && !options.fade {
            shared.stop_now(&mut state, note);
            return;
        }

        // A newer ring replaces the pending one; the old timer finds a
        // different ticket and does nothing.
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.ringing.insert(note, ticket);
        let delay = state.let_ring_time;
        shared.timers.schedule(delay, TimerAction::SustainFade { note, ticket });
    }

    /// Releases every sounding note immediately.
    pub fn stop_all(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();
        let notes: Vec<Note> = state.playing.keys().copied().collect();
        for note in notes {
            shared.stop_now(&mut state, note);
        }
    }

    pub fn note_state(&self, note: Note) -> NoteState {
        let state = self.shared.lock();
        if let Some(active) = state.playing.get(&note) {
            if !self.shared.mixer.contains(active.voice) {
                // sample ran out on its own
                return NoteState::Idle;
            }
            return if state.ringing.contains_key(&note) {
                NoteState::Ringing
            } else {
                NoteState::Sounding
            };
        }
        if state.releasing.values().any(|n| *n == note) {
            NoteState::Releasing
        } else {
            NoteState::Idle
        }
    }

    pub fn playing_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.shared.lock().playing.keys().copied().collect();
        notes.sort();
        notes
    }
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Cancels any pending fade, releases the envelope and schedules the
    /// voice's removal once the release has played.
    fn stop_now(&self, state: &mut EngineState, note: Note) {
        state.ringing.remove(&note);
        if let Some(active) = state.playing.remove(&note) {
            active.envelope.release();
            state.releasing.insert(active.voice, note);
            self.timers
                .schedule(active.release, TimerAction::RetireVoice { voice: active.voice });
        }
    }

    fn on_timer(&self, action: TimerAction) {
        let mut state = self.lock();
        match action {
            TimerAction::SustainFade { note, ticket } => {
                if state.ringing.get(&note) == Some(&ticket) {
                    self.stop_now(&mut state, note);
                }
            }
            TimerAction::RetireVoice { voice } => {
                state.releasing.remove(&voice);
                self.mixer.remove_input(voice);
            }
        }
    }
}
