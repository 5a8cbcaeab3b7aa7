use std::sync::{Mutex, MutexGuard};

use crate::nodes::SampleSource;

pub type VoiceId = u64;

/// Sums any number of sources into one mono stream.
///
/// Inputs that return fewer samples than requested are dropped. In
/// `read_fully` mode every read reports the full request, padding with
/// silence, so the mixer never signals its own end.
pub struct Mixer {
    inputs: Vec<(VoiceId, Box<dyn SampleSource>)>,
    scratch: Vec<f32>,
    read_fully: bool,
    next_id: VoiceId,
}

impl Mixer {
    pub fn new(read_fully: bool) -> Self {
        Self {
            inputs: Vec::new(),
            scratch: Vec::new(),
            read_fully,
            next_id: 1,
        }
    }

    pub fn add_input(&mut self, source: Box<dyn SampleSource>) -> VoiceId {
        let id = self.next_id;
        self.next_id += 1;
        self.inputs.push((id, source));
        id
    }

    pub fn remove_input(&mut self, id: VoiceId) -> bool {
        let before = self.inputs.len();
        self.inputs.retain(|(voice, _)| *voice != id);
        self.inputs.len() != before
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.inputs.iter().any(|(voice, _)| *voice == id)
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl SampleSource for Mixer {
    fn read(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        if self.scratch.len() < out.len() {
            self.scratch.resize(out.len(), 0.0);
        }

        let wanted = out.len();
        let scratch = &mut self.scratch[..wanted];
        let mut longest = 0;
        self.inputs.retain_mut(|(_, source)| {
            let n = source.read(scratch);
            for (o, s) in out[..n].iter_mut().zip(&scratch[..n]) {
                *o += *s;
            }
            longest = longest.max(n);
            n == wanted
        });

        if self.read_fully { wanted } else { longest }
    }
}

/// Thread-safe front of a `Mixer`, shared by the audio callback and control
/// threads. Every method takes the lock once.
pub struct OutputMixer {
    inner: Mutex<Mixer>,
}

impl OutputMixer {
    pub fn new(read_fully: bool) -> Self {
        Self {
            inner: Mutex::new(Mixer::new(read_fully)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        // A panic inside a source must not take the output down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_input(&self, source: Box<dyn SampleSource>) -> VoiceId {
        self.lock().add_input(source)
    }

    pub fn remove_input(&self, id: VoiceId) -> bool {
        self.lock().remove_input(id)
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.lock().contains(id)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn read(&self, out: &mut [f32]) -> usize {
        self.lock().read(out)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for OutputMixer {
    fn default() -> Self {
        Self::new(true)
    }
}
