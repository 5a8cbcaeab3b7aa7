use std::path::{Path, PathBuf};
use std::time::Duration;

use fretwork_engine::export::{ExportBitDepth, ExportConfig, DEFAULT_EXPORT_RATE, DEFAULT_TRACK_GAIN};
use serde::{Deserialize, Serialize};

/// Player settings, optionally read from a JSON file. Missing keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory holding the sample bank folders.
    pub media_root: PathBuf,
    pub export_rate: u32,
    /// 16, 24 or 32 (float).
    pub export_bits: u16,
    pub normalize: bool,
    pub track_gain: f32,
    pub let_ring_ms: u64,
    pub seed: Option<u64>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            export_rate: DEFAULT_EXPORT_RATE,
            export_bits: 32,
            normalize: false,
            track_gain: DEFAULT_TRACK_GAIN,
            let_ring_ms: 600,
            seed: None,
        }
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn export_config(&self) -> ExportConfig {
        let bit_depth = match self.export_bits {
            16 => ExportBitDepth::Int16,
            24 => ExportBitDepth::Int24,
            _ => ExportBitDepth::Float32,
        };
        ExportConfig {
            sample_rate: self.export_rate,
            bit_depth,
            normalize: self.normalize,
            track_gain: self.track_gain,
            dither_seed: self.seed,
            ..Default::default()
        }
    }

    pub fn let_ring_time(&self) -> Duration {
        Duration::from_millis(self.let_ring_ms)
    }
}
