//! Sample banks: note -> recorded variants, decoded once at load time.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use fretwork_shared::note::{Note, Tone};
use fretwork_shared::track::MediaPatch;
use log::{debug, info};

use crate::error::EngineError;
use crate::resampler::RateConverter;

/// Where a bank lives under the media root and which note its `0_*.wav` file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankLayout {
    pub name: &'static str,
    pub directory: &'static str,
    pub start_note: Note,
}

impl BankLayout {
    pub const CLEAN_GUITAR: BankLayout = BankLayout {
        name: "Clean Guitar",
        directory: "FenderStratCleanB",
        start_note: Note::new(2, Tone::E),
    };

    pub const BASS: BankLayout = BankLayout {
        name: "Bass",
        directory: "Rockdale_Bass_Bridge",
        start_note: Note::new(1, Tone::E),
    };

    pub const DRUMS: BankLayout = BankLayout {
        name: "Drums",
        directory: "Drumkit",
        start_note: Note::new(0, Tone::F),
    };

    pub fn for_patch(patch: MediaPatch) -> BankLayout {
        match patch {
            MediaPatch::CleanGuitar => Self::CLEAN_GUITAR,
            MediaPatch::Bass => Self::BASS,
            MediaPatch::Drums => Self::DRUMS,
        }
    }

    /// Maps `"<offset>_<anything>.wav"` to its note. Other names are ignored.
    pub fn note_for_file(&self, file_name: &str) -> Option<Note> {
        let stem = file_name.strip_suffix(".wav").or_else(|| file_name.strip_suffix(".WAV"))?;
        let offset: i32 = stem.split('_').find(|part| !part.is_empty())?.parse().ok()?;
        Some(self.start_note + offset)
    }
}

/// Mono PCM variants per note at one fixed sample rate.
///
/// Buffers are shared with playing voices through `Arc`, so a bank can be
/// swapped while its samples are still sounding.
pub struct MediaBank {
    name: String,
    sample_rate: u32,
    media: HashMap<Note, Vec<Arc<[f32]>>>,
    rng: Mutex<fastrand::Rng>,
}

impl MediaBank {
    pub fn new(name: impl Into<String>, sample_rate: u32) -> Self {
        Self::with_rng(name, sample_rate, fastrand::Rng::new())
    }

    pub fn with_seed(name: impl Into<String>, sample_rate: u32, seed: u64) -> Self {
        Self::with_rng(name, sample_rate, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(name: impl Into<String>, sample_rate: u32, rng: fastrand::Rng) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            media: HashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Adds one more variant for `note`.
    pub fn insert(&mut self, note: Note, samples: impl Into<Arc<[f32]>>) {
        self.media.entry(note).or_default().push(samples.into());
    }

    pub fn contains(&self, note: Note) -> bool {
        self.media.contains_key(&note)
    }

    pub fn notes(&self) -> impl Iterator<Item = Note> + '_ {
        self.media.keys().copied()
    }

    pub fn variant_count(&self, note: Note) -> usize {
        self.media.get(&note).map_or(0, Vec::len)
    }

    /// One variant for `note`, chosen uniformly at random. `None` when the
    /// bank has no recording of it.
    pub fn pick(&self, note: Note) -> Option<Arc<[f32]>> {
        let Some(variants) = self.media.get(&note).filter(|v| !v.is_empty()) else {
            debug!("{}: no sample for {}", self.name, note);
            return None;
        };
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            rng.usize(..variants.len())
        };
        Some(Arc::clone(&variants[index]))
    }

    /// Loads every WAV file of `layout` below `media_root`, converted to mono
    /// at `sample_rate`.
    pub fn load(layout: &BankLayout, media_root: &Path, sample_rate: u32) -> Result<Self, EngineError> {
        let dir = media_root.join(layout.directory);
        if !dir.is_dir() {
            return Err(EngineError::MissingResource(format!(
                "sound bank directory {} not found",
                dir.display()
            )));
        }

        let mut bank = MediaBank::new(layout.name, sample_rate);
        let mut files = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(note) = layout.note_for_file(file_name) else {
                continue;
            };
            files += 1;
            bank.insert(note, load_mono(&path, sample_rate)?);
        }

        if files == 0 {
            return Err(EngineError::MissingResource(format!(
                "no files in sound bank {}",
                dir.display()
            )));
        }

        info!(
            "Loaded bank '{}': {} files, {} notes at {} Hz",
            layout.name,
            files,
            bank.media.len(),
            sample_rate
        );
        Ok(bank)
    }
}

/// Reads a WAV file as mono f32 at `target_rate`.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>, EngineError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if spec.sample_rate == target_rate {
        return Ok(mono);
    }
    debug!("resampling {} from {} Hz", path.display(), spec.sample_rate);
    RateConverter::convert(&mono, spec.sample_rate, target_rate)
}
