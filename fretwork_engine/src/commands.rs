use std::time::Instant;

use fretwork_shared::note::Note;

use crate::mixer::VoiceId;

/// Deferred note engine work.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerAction {
    /// End a sustained note, unless `ticket` was cancelled or replaced meanwhile.
    SustainFade { note: Note, ticket: u64 },
    /// Drop a voice from the output once its release has played out.
    RetireVoice { voice: VoiceId },
}

pub enum TimerCommand {
    Schedule { at: Instant, action: TimerAction },
    Shutdown,
}
