use std::path::PathBuf;

pub const USAGE: &str = "Usage: fretwork [-i] <song.txt|song.mid|song.json> [options]

Plays a song file, or exports it to WAV.

Options:
  -i, --input <file>     Song file (text score, MIDI or JSON tracks)
  -e, --export <file>    Export to a wave file (or save tracks to .json) instead of playing
  -s, --separated        With --export, write every track into its own file
  -c, --config <file>    JSON settings (media root, export format, gains)
      --stepped          Play live through the note engine instead of the sequencer
  -h, --help             Show this text

Text song format:
  <tempo>
  <token> <token> ...
  token: [note_note_...]<w|h|q|e|s|t|l>[.]  e.g. C5q  G3_D5_F5e.  q (rest)
  commands: =LROn= =LROff= =LR= =LRw= =LRh= =LRq=
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub input: Option<PathBuf>,
    pub export: Option<PathBuf>,
    pub separated: bool,
    pub config: Option<PathBuf>,
    pub stepped: bool,
    pub help: bool,
}

pub fn parse_args<I>(args: I) -> Result<Args, anyhow::Error>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("{} expects a file name", flag))
        };
        match arg.as_str() {
            "-i" | "--input" => parsed.input = Some(value(&arg)?),
            "-e" | "--export" => parsed.export = Some(value(&arg)?),
            "-c" | "--config" => parsed.config = Some(value(&arg)?),
            "-s" | "--separated" => parsed.separated = true,
            "--stepped" => parsed.stepped = true,
            "-h" | "--help" => parsed.help = true,
            other if other.starts_with('-') => anyhow::bail!("Unknown option: {}", other),
            other if parsed.input.is_none() => parsed.input = Some(PathBuf::from(other)),
            other => anyhow::bail!("Unexpected argument: {}", other),
        }
    }

    if parsed.separated && parsed.export.is_none() {
        anyhow::bail!("--separated needs --export");
    }
    Ok(parsed)
}
