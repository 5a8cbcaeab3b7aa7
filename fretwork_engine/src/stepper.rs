//! Plays a track by driving a `NoteEngine` in wall-clock time, the way a
//! player would: note on at the phrase start, note off at its end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use fretwork_shared::duration::whole_note_seconds;
use fretwork_shared::note::Note;
use fretwork_shared::phrase::PlayingCommand;
use fretwork_shared::track::Track;
use log::debug;

use crate::engine::NoteEngine;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    SetLetItRing(bool),
    SetLetRingTime(Duration),
    /// Strike `notes`, hold for `hold`, then release them. `faded` notes ring
    /// out regardless of the let-it-ring flag.
    Play {
        notes: Vec<Note>,
        hold: Duration,
        faded: bool,
    },
}

pub fn plan_steps(track: &Track) -> Vec<Step> {
    let whole = whole_note_seconds(track.tempo);
    let mut steps = Vec::with_capacity(track.phrases.len());

    for phrase in &track.phrases {
        let mut faded = false;
        match phrase.playing_command() {
            PlayingCommand::None => {}
            PlayingCommand::SustainOn => steps.push(Step::SetLetItRing(true)),
            PlayingCommand::SustainOff => steps.push(Step::SetLetItRing(false)),
            PlayingCommand::SustainThisPhrase => faded = true,
            PlayingCommand::SustainLenWhole => {
                steps.push(Step::SetLetRingTime(Duration::from_secs_f64(whole)))
            }
            PlayingCommand::SustainLenHalf => {
                steps.push(Step::SetLetRingTime(Duration::from_secs_f64(whole / 2.0)))
            }
            PlayingCommand::SustainLenQuarter => {
                steps.push(Step::SetLetRingTime(Duration::from_secs_f64(whole / 4.0)))
            }
        }

        if phrase.duration() > 0.0 {
            steps.push(Step::Play {
                notes: phrase.notes().to_vec(),
                hold: Duration::from_secs_f64(phrase.seconds(track.tempo)),
                faded,
            });
        }
    }

    steps
}

/// Executes `steps` on `engine`. Returns false when `stop` was raised, in
/// which case every note has been cut.
pub fn run_steps(engine: &NoteEngine, steps: &[Step], stop: &AtomicBool) -> bool {
    let mut deadline = Instant::now();

    for step in steps {
        match step {
            Step::SetLetItRing(enabled) => engine.set_let_it_ring(*enabled),
            Step::SetLetRingTime(time) => engine.set_let_ring_time(*time),
            Step::Play { notes, hold, faded } => {
                debug!("step {:?} for {:?}", notes, hold);
                for &note in notes {
                    engine.note_on(note);
                }

                // Deadlines accumulate so sleep jitter does not drift the tempo.
                deadline += *hold;
                if !wait_until(deadline, stop) {
                    engine.stop_all();
                    return false;
                }

                for &note in notes {
                    if *faded {
                        engine.stop_faded(note);
                    } else {
                        engine.note_off(note);
                    }
                }
            }
        }
    }
    true
}

fn wait_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MediaBank;
    use crate::engine::{NoteEngineConfig, NoteState};
    use crate::mixer::OutputMixer;
    use fretwork_shared::note::Tone;
    use fretwork_shared::score::parse_track;
    use std::sync::Arc;

    #[test]
    fn test_plan_maps_sustain_commands() {
        let track = parse_track("=LROn= =LRh= C5q =LR= D5e q =LROff=", 120).unwrap();
        let steps = plan_steps(&track);
        assert_eq!(
            steps,
            vec![
                Step::SetLetItRing(true),
                Step::SetLetRingTime(Duration::from_millis(250)),
                Step::Play {
                    notes: vec![Note::new(5, Tone::C)],
                    hold: Duration::from_millis(125),
                    faded: false
                },
                Step::Play {
                    notes: vec![Note::new(5, Tone::D)],
                    hold: Duration::from_secs_f64(0.0625),
                    faded: true
                },
                Step::Play {
                    notes: vec![],
                    hold: Duration::from_millis(125),
                    faded: false
                },
                Step::SetLetItRing(false),
            ]
        );
    }

    #[test]
    fn test_run_drives_engine() {
        let c5 = Note::new(5, Tone::C);
        let mut bank = MediaBank::with_seed("test", 8_000, 1);
        bank.insert(c5, vec![0.5; 80_000]);
        let engine = NoteEngine::new(
            Arc::new(OutputMixer::default()),
            NoteEngineConfig {
                sample_rate: 8_000,
                seed: Some(1),
                ..Default::default()
            },
        );
        engine.set_media_bank(Arc::new(bank));

        let track = parse_track("=LROn= C5t", 120).unwrap();
        let stop = AtomicBool::new(false);
        assert!(run_steps(&engine, &plan_steps(&track), &stop));
        assert!(engine.let_it_ring());
        assert_eq!(engine.note_state(c5), NoteState::Ringing);
    }

    #[test]
    fn test_stop_flag_cuts_notes() {
        let c5 = Note::new(5, Tone::C);
        let mut bank = MediaBank::with_seed("test", 8_000, 1);
        bank.insert(c5, vec![0.5; 80_000]);
        let engine = NoteEngine::new(
            Arc::new(OutputMixer::default()),
            NoteEngineConfig { sample_rate: 8_000, ..Default::default() },
        );
        engine.set_media_bank(Arc::new(bank));

        let stop = AtomicBool::new(true);
        let steps = vec![Step::Play { notes: vec![c5], hold: Duration::from_secs(10), faded: false }];
        assert!(!run_steps(&engine, &steps, &stop));
        assert_eq!(engine.note_state(c5), NoteState::Releasing);
    }
}
