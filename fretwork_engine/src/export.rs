//! Offline bounce of tracks to WAV files.
//! Renders as fast as the sequencers allow, without a device.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;

use crate::mixer::Mixer;
use crate::nodes::{Gain, SampleSource};
use crate::sequencer::{SequencerSource, TrackSequencer};

/// Gain applied to every track before summing.
pub const DEFAULT_TRACK_GAIN: f32 = 0.7;
pub const DEFAULT_EXPORT_RATE: u32 = 48_000;

const RENDER_BLOCK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportBitDepth {
    Int16,
    Int24,
    Float32,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub sample_rate: u32,
    pub bit_depth: ExportBitDepth,
    pub normalize: bool,
    /// TPDF dither when converting to int.
    pub dither: bool,
    /// Fixed dither seed for reproducible files.
    pub dither_seed: Option<u64>,
    pub track_gain: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_EXPORT_RATE,
            bit_depth: ExportBitDepth::Float32,
            normalize: false,
            dither: true,
            dither_seed: None,
            track_gain: DEFAULT_TRACK_GAIN,
        }
    }
}

/// Mixes the sequencers to one mono buffer, each scaled by `gain`.
/// Runs until the longest track (including its tail) has finished.
pub fn render_tracks(sequencers: &[Arc<TrackSequencer>], gain: f32) -> Vec<f32> {
    let mut mixer = Mixer::new(false);
    for seq in sequencers {
        mixer.add_input(Box::new(Gain::new(SequencerSource(Arc::clone(seq)), gain)));
    }

    let mut out = Vec::new();
    let mut block = vec![0.0; RENDER_BLOCK];
    loop {
        let n = mixer.read(&mut block);
        out.extend_from_slice(&block[..n]);
        if n < RENDER_BLOCK {
            break;
        }
    }
    out
}

impl ExportBitDepth {
    fn wav_spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            ExportBitDepth::Int16 => (16, SampleFormat::Int),
            ExportBitDepth::Int24 => (24, SampleFormat::Int),
            ExportBitDepth::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Float to integer PCM with optional triangular dither of one LSB.
struct Quantizer {
    full_scale: f32,
    lsb: f32,
    rng: Option<fastrand::Rng>,
}

impl Quantizer {
    fn new(bits: u16, dither: bool, seed: Option<u64>) -> Self {
        let full_scale = (1u32 << (bits - 1)) as f32;
        let rng = dither.then(|| seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed));
        Self {
            full_scale,
            lsb: 1.0 / full_scale,
            rng,
        }
    }

    fn quantize(&mut self, sample: f32) -> i32 {
        let noise = match self.rng.as_mut() {
            Some(rng) => (rng.f32() - rng.f32()) * self.lsb,
            None => 0.0,
        };
        let max = self.full_scale - 1.0;
        ((sample + noise) * max).round().clamp(-self.full_scale, max) as i32
    }
}

/// Largest absolute sample, or 0 for silence.
fn peak_level(data: &[f32]) -> f32 {
    data.iter().map(|s| s.abs()).fold(0.0, f32::max)
}

/// Writes mono audio to a WAV file.
pub fn write_wav(path: &Path, data: &[f32], config: &ExportConfig) -> Result<(), anyhow::Error> {
    let spec = config.bit_depth.wav_spec(config.sample_rate);
    let mut writer = WavWriter::create(path, spec)?;

    let peak = peak_level(data);
    let gain = if config.normalize && peak > 0.0 { 1.0 / peak } else { 1.0 };
    let scaled = data.iter().map(|s| s * gain);

    if spec.sample_format == SampleFormat::Float {
        for sample in scaled {
            writer.write_sample(sample)?;
        }
    } else {
        let mut quantizer = Quantizer::new(spec.bits_per_sample, config.dither, config.dither_seed);
        for sample in scaled {
            writer.write_sample(quantizer.quantize(sample))?;
        }
    }

    writer.finalize()?;
    info!("Wrote {} ({} samples, peak {:.3})", path.display(), data.len(), peak * gain);
    Ok(())
}

/// `<name>_<NN>.wav` with anything but letters, digits, `-` and `.` turned
/// into `_`; `track_<NN>.wav` for unnamed stems.
fn stem_file_name(index: usize, name: &str) -> String {
    let number = index + 1;
    if name.is_empty() {
        return format!("track_{number:02}.wav");
    }
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{safe}_{number:02}.wav")
}

/// Writes every `(name, samples)` stem into `output_dir` and returns the
/// written paths in order.
pub fn write_stems(
    output_dir: &Path,
    stems: &[(String, Vec<f32>)],
    config: &ExportConfig,
) -> Result<Vec<PathBuf>, anyhow::Error> {
    std::fs::create_dir_all(output_dir)?;
    stems
        .iter()
        .enumerate()
        .map(|(i, (name, data))| {
            let path = output_dir.join(stem_file_name(i, name));
            write_wav(&path, data, config)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MediaBank;
    use fretwork_shared::note::{Note, Tone};
    use fretwork_shared::score::parse_track;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fretwork_export_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sequencer(score: &str) -> Arc<TrackSequencer> {
        let mut bank = MediaBank::with_seed("test", 8_000, 1);
        bank.insert(Note::new(5, Tone::C), vec![1.0; 2_000]);
        Arc::new(TrackSequencer::new(&parse_track(score, 120).unwrap(), Arc::new(bank)))
    }

    #[test]
    fn test_render_runs_to_longest_track() {
        let short = sequencer("C5q");
        let long = sequencer("C5q C5h");
        let out = render_tracks(&[short, long], 0.5);
        // 3000 samples of phrases plus a 4000 sample tail
        assert_eq!(out.len(), 7_000);
        assert!((out[10] - 1.0).abs() < 1e-6);
        assert!((out[1_500] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_float_wav_round_trip() {
        let dir = temp_dir("float");
        let path = dir.join("mix.wav");
        let data = vec![0.0, 0.25, -0.5, 1.0];
        write_wav(&path, &data, &ExportConfig::default()).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        let read: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(read, data);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_int16_clamps_and_normalizes() {
        let dir = temp_dir("int16");
        let path = dir.join("mix.wav");
        let config = ExportConfig {
            bit_depth: ExportBitDepth::Int16,
            dither: false,
            normalize: true,
            ..Default::default()
        };
        write_wav(&path, &[0.25, -0.5], &config).unwrap();
        let read: Vec<i16> = hound::WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(read, vec![16384, -32767]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_dither_stays_within_one_step_and_is_seeded() {
        let dir = temp_dir("dither");
        let config = ExportConfig {
            bit_depth: ExportBitDepth::Int16,
            dither_seed: Some(7),
            ..Default::default()
        };
        let read = |name: &str| -> Vec<i16> {
            let path = dir.join(name);
            write_wav(&path, &[0.0; 512], &config).unwrap();
            hound::WavReader::open(&path)
                .unwrap()
                .into_samples::<i16>()
                .map(|s| s.unwrap())
                .collect()
        };

        let first = read("a.wav");
        assert!(first.iter().all(|s| (-1..=1).contains(s)));
        assert!(first.iter().any(|s| *s != 0));
        assert_eq!(first, read("b.wav"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_int24_full_scale() {
        let dir = temp_dir("int24");
        let path = dir.join("mix.wav");
        let config = ExportConfig {
            bit_depth: ExportBitDepth::Int24,
            dither: false,
            ..Default::default()
        };
        write_wav(&path, &[1.0, -2.0, 0.5], &config).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 24);
        let read: Vec<i32> = reader.into_samples::<i32>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![8_388_607, -8_388_608, 4_194_304]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stem_names() {
        let dir = temp_dir("stems");
        let stems = vec![
            ("song Clean Guitar".to_string(), vec![0.0; 4]),
            (String::new(), vec![0.0; 4]),
            ("a/b:c".to_string(), vec![0.0; 4]),
        ];
        let paths = write_stems(&dir, &stems, &ExportConfig::default()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["song_Clean_Guitar_01.wav", "track_02.wav", "a_b_c_03.wav"]);
        assert!(paths.iter().all(|p| p.exists()));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
