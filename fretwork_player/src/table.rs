//! Box-drawn console table with one column per track.

use fretwork_shared::phrase::{Phrase, PlayingCommand};

const MIN_COLUMN_WIDTH: usize = 30;

pub struct PhraseTable {
    columns: usize,
    width: usize,
}

impl PhraseTable {
    pub fn new(columns: usize) -> Self {
        Self {
            columns: columns.max(1),
            width: MIN_COLUMN_WIDTH,
        }
    }

    fn line(&self, first: char, part: char, last: char) -> String {
        let fill = "─".repeat(self.width);
        let mut out = String::new();
        out.push(first);
        for i in 0..self.columns {
            if i > 0 {
                out.push(part);
            }
            out.push_str(&fill);
        }
        out.push(last);
        out
    }

    fn cells(&self, column: usize, text: &str) -> String {
        let mut out = String::new();
        for i in 0..self.columns {
            out.push('│');
            let cell = if i == column { text } else { "" };
            let cell: String = cell.chars().take(self.width).collect();
            out.push_str(&format!("{:<width$}", cell, width = self.width));
        }
        out.push('│');
        out
    }

    /// Top border and the `TRACK #n` captions.
    pub fn header(&self) -> String {
        let mut captions = String::new();
        for i in 0..self.columns {
            captions.push('│');
            captions.push_str(&format!("{:<width$}", format!("TRACK #{}", i + 1), width = self.width));
        }
        captions.push('│');
        format!("{}\n{}\n{}", self.line('┌', '┬', '┐'), captions, self.line('├', '┼', '┤'))
    }

    pub fn row(&self, column: usize, phrase: &Phrase, tempo: u32) -> String {
        self.cells(column, &describe(phrase, tempo))
    }

    pub fn footer(&self) -> String {
        self.line('└', '┴', '┘')
    }
}

/// `NOTES DURATION COMMAND`, e.g. `C5,E5 250ms SustainOn`.
pub fn describe(phrase: &Phrase, tempo: u32) -> String {
    let notes = if phrase.has_notes() {
        phrase
            .notes()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",")
    } else {
        "NONE".to_string()
    };
    let millis = (phrase.seconds(tempo) * 1000.0).round() as u64;
    match phrase.playing_command() {
        PlayingCommand::None => format!("{} {}ms", notes, millis),
        command => format!("{} {}ms {}", notes, millis, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fretwork_shared::note::{Note, Tone};

    #[test]
    fn test_describe() {
        let chord = Phrase::chord(0.25, [Note::new(5, Tone::C), Note::new(5, Tone::E)]);
        assert_eq!(describe(&chord, 60), "C5,E5 250ms");

        let command = Phrase::command(PlayingCommand::SustainOn);
        assert_eq!(describe(&command, 60), "NONE 0ms SustainOn");
    }

    #[test]
    fn test_rows_line_up_with_borders() {
        let table = PhraseTable::new(2);
        let row = table.row(1, &Phrase::rest(0.5), 120);
        assert_eq!(row.chars().count(), table.footer().chars().count());
        assert!(row.contains("NONE 250ms"));
        assert!(table.header().contains("TRACK #2"));
    }
}
