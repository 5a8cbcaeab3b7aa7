use std::fs::File;
use std::io::Write;
use std::path::Path;

use fretwork_shared::midi::read_midi_tracks;
use fretwork_shared::score::parse_song_file;
use fretwork_shared::track::Track;

/// Loads tracks by file extension: `.mid`/`.midi`, `.json` (saved tracks),
/// anything else as a text song file.
pub fn load_tracks(path: &Path) -> Result<Vec<Track>, anyhow::Error> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let tracks = match extension.as_str() {
        "mid" | "midi" => read_midi_tracks(&std::fs::read(path)?)?,
        "json" => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        _ => vec![parse_song_file(&std::fs::read_to_string(path)?)?],
    };

    if tracks.is_empty() {
        anyhow::bail!("{} contains no playable tracks", path.display());
    }
    for track in &tracks {
        track.validate()?;
    }
    log::info!("Loaded {} track(s) from {}", tracks.len(), path.display());
    Ok(tracks)
}

pub fn save_tracks(tracks: &[Track], path: &Path) -> Result<(), anyhow::Error> {
    let json = serde_json::to_string_pretty(tracks)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
