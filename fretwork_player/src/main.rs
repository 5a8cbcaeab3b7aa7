mod cli;
mod config;
mod score_io;
mod table;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Receiver;
use fretwork_engine::export::{render_tracks, write_stems, write_wav};
use fretwork_engine::output::DeviceOutput;
use fretwork_engine::stepper::{plan_steps, run_steps};
use fretwork_engine::{
    BankLayout, MediaBank, NoteEngine, NoteEngineConfig, OutputMixer, PhraseStarted, SequencerSource,
    TrackSequencer,
};
use fretwork_shared::score::{parse_track, DEFAULT_SONG, DEFAULT_SONG_TEMPO};
use fretwork_shared::track::{MediaPatch, Track};
use log::info;

use crate::cli::{parse_args, Args, USAGE};
use crate::config::PlayerConfig;
use crate::table::PhraseTable;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

fn main() {
    env_logger::init();

    if let Err(e) = run(std::env::args().skip(1)) {
        eprintln!("Error happened: {}", e);
        std::process::exit(1);
    }
}

fn run(raw_args: impl Iterator<Item = String>) -> Result<()> {
    let args = parse_args(raw_args)?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    let tracks = match &args.input {
        Some(path) => score_io::load_tracks(path)?,
        None => {
            println!("{}", USAGE);
            println!("No song given, playing the demo song.");
            vec![parse_track(DEFAULT_SONG, DEFAULT_SONG_TEMPO)?]
        }
    };

    match &args.export {
        Some(path) => export(&args, &config, &tracks, path),
        None if args.stepped => play_stepped(&config, &tracks),
        None => play(&config, &tracks),
    }
}

/// Loads one bank per patch used by `tracks`.
fn load_banks(config: &PlayerConfig, tracks: &[Track], sample_rate: u32) -> Result<HashMap<MediaPatch, Arc<MediaBank>>> {
    let mut banks = HashMap::new();
    for track in tracks {
        if banks.contains_key(&track.patch) {
            continue;
        }
        let layout = BankLayout::for_patch(track.patch);
        let bank = MediaBank::load(&layout, &config.media_root, sample_rate)?;
        banks.insert(track.patch, Arc::new(bank));
    }
    Ok(banks)
}

fn build_sequencers(config: &PlayerConfig, tracks: &[Track], sample_rate: u32) -> Result<Vec<Arc<TrackSequencer>>> {
    let banks = load_banks(config, tracks, sample_rate)?;
    let mut sequencers = Vec::with_capacity(tracks.len());
    for track in tracks {
        let bank = banks
            .get(&track.patch)
            .ok_or_else(|| anyhow::anyhow!("No media bank for {}", track.patch.name()))?;
        sequencers.push(Arc::new(TrackSequencer::new(track, Arc::clone(bank))));
    }
    Ok(sequencers)
}

fn export(args: &Args, config: &PlayerConfig, tracks: &[Track], path: &Path) -> Result<()> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        score_io::save_tracks(tracks, path)?;
        println!("Saved {} track(s) to {}", tracks.len(), path.display());
        return Ok(());
    }

    let export_config = config.export_config();
    let sequencers = build_sequencers(config, tracks, export_config.sample_rate)?;

    if args.separated {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("track")
            .to_string();
        let stems: Vec<(String, Vec<f32>)> = sequencers
            .iter()
            .zip(tracks)
            .map(|(seq, track)| {
                let data = render_tracks(std::slice::from_ref(seq), export_config.track_gain);
                (format!("{} {}", stem, track.patch.name()), data)
            })
            .collect();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for written in write_stems(dir, &stems, &export_config)? {
            info!("Wrote {}", written.display());
        }
    } else {
        let data = render_tracks(&sequencers, export_config.track_gain);
        write_wav(path, &data, &export_config)?;
    }

    println!("Export finished");
    Ok(())
}

fn play(config: &PlayerConfig, tracks: &[Track]) -> Result<()> {
    let sample_rate = DeviceOutput::default_sample_rate()?;
    let sequencers = build_sequencers(config, tracks, sample_rate)?;

    let mixer = Arc::new(OutputMixer::default());
    let receivers: Vec<Receiver<PhraseStarted>> = sequencers.iter().map(|seq| seq.subscribe()).collect();
    for seq in &sequencers {
        mixer.add_input(Box::new(SequencerSource(Arc::clone(seq))));
    }

    let table = PhraseTable::new(sequencers.len());
    println!("{}", table.header());

    let output = DeviceOutput::start(Arc::clone(&mixer), config.track_gain)?;
    info!("Playing {} track(s) at {} Hz", sequencers.len(), output.sample_rate());

    while !mixer.is_empty() {
        print_started(&table, &sequencers, &receivers);
        thread::sleep(POLL_INTERVAL);
    }
    print_started(&table, &sequencers, &receivers);
    println!("{}", table.footer());

    drop(output);
    Ok(())
}

fn print_started(table: &PhraseTable, sequencers: &[Arc<TrackSequencer>], receivers: &[Receiver<PhraseStarted>]) {
    for (column, (seq, rx)) in sequencers.iter().zip(receivers).enumerate() {
        for started in rx.try_iter() {
            println!("{}", table.row(column, &started.phrase, seq.tempo()));
        }
    }
}

/// Plays the track with the most phrases through the live note engine.
fn play_stepped(config: &PlayerConfig, tracks: &[Track]) -> Result<()> {
    let track = tracks
        .iter()
        .max_by_key(|t| t.phrases.len())
        .ok_or_else(|| anyhow::anyhow!("Nothing to play"))?;

    let sample_rate = DeviceOutput::default_sample_rate()?;
    let layout = BankLayout::for_patch(track.patch);
    let bank = Arc::new(MediaBank::load(&layout, &config.media_root, sample_rate)?);

    let mixer = Arc::new(OutputMixer::default());
    let engine = NoteEngine::new(
        Arc::clone(&mixer),
        NoteEngineConfig {
            sample_rate,
            let_ring_time: config.let_ring_time(),
            seed: config.seed,
        },
    );
    engine.set_media_bank(bank);

    let output = DeviceOutput::start(mixer, config.track_gain)?;
    let steps = plan_steps(track);
    info!("Stepping through {} steps", steps.len());

    let stop = AtomicBool::new(false);
    run_steps(&engine, &steps, &stop);
    thread::sleep(engine.let_ring_time() + Duration::from_millis(100));
    engine.stop_all();
    thread::sleep(Duration::from_millis(100));

    drop(output);
    Ok(())
}
