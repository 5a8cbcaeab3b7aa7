//! Pull-based mono sample sources.
//!
//! A voice is a small chain of these: PCM buffers summed by a `Mixer`, then
//! shaped by `FadeOut`, `Gain` or `Envelope`, and positioned with `Offset`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait SampleSource: Send {
    /// Writes up to `out.len()` samples into `out` and returns how many were
    /// written. Returning fewer than requested means the source is finished.
    fn read(&mut self, out: &mut [f32]) -> usize;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        (**self).read(out)
    }
}

/// Plays a shared PCM buffer once.
pub struct BufferSource {
    data: Arc<[f32]>,
    position: usize,
}

impl BufferSource {
    pub fn new(data: Arc<[f32]>) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl SampleSource for BufferSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        n
    }
}

/// Sum of several buffers started together, e.g. the notes of one chord.
/// Finished when the longest buffer is.
pub struct SumSource {
    inputs: Vec<BufferSource>,
}

impl SumSource {
    pub fn new(buffers: impl IntoIterator<Item = Arc<[f32]>>) -> Self {
        Self {
            inputs: buffers.into_iter().map(BufferSource::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl SampleSource for SumSource {
    fn read(&mut self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let mut longest = 0;
        for input in &mut self.inputs {
            let n = out.len().min(input.remaining());
            let start = input.position;
            for (o, s) in out[..n].iter_mut().zip(&input.data[start..start + n]) {
                *o += *s;
            }
            input.position += n;
            longest = longest.max(n);
        }
        self.inputs.retain(|i| i.remaining() > 0);
        longest
    }
}

/// Delays a source by leading silence and/or drops its first samples.
///
/// `skip_over` is applied to the wrapped source, so a wrapped `FadeOut` keeps
/// counting its fade position from its own start.
pub struct Offset<S> {
    source: S,
    delay_remaining: u64,
    skip_remaining: u64,
    finished: bool,
}

impl<S: SampleSource> Offset<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            delay_remaining: 0,
            skip_remaining: 0,
            finished: false,
        }
    }

    pub fn delay_by(mut self, samples: u64) -> Self {
        self.delay_remaining = samples;
        self
    }

    pub fn skip_over(mut self, samples: u64) -> Self {
        self.skip_remaining = samples;
        self
    }
}

impl<S: SampleSource> SampleSource for Offset<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        if self.finished {
            return 0;
        }

        // The output buffer doubles as scratch space for skipped samples.
        while self.skip_remaining > 0 && !out.is_empty() {
            let n = (self.skip_remaining.min(out.len() as u64)) as usize;
            let got = self.source.read(&mut out[..n]);
            self.skip_remaining -= got as u64;
            if got < n {
                self.finished = true;
                out.fill(0.0);
                return 0;
            }
        }

        let delay = (self.delay_remaining.min(out.len() as u64)) as usize;
        out[..delay].fill(0.0);
        self.delay_remaining -= delay as u64;

        let got = self.source.read(&mut out[delay..]);
        if delay + got < out.len() {
            self.finished = true;
        }
        delay + got
    }
}

/// Linear fade to silence starting `fade_after` samples into the source.
/// The source ends when the fade reaches zero.
pub struct FadeOut<S> {
    source: S,
    fade_after: u64,
    fade_len: u64,
    position: u64,
}

impl<S: SampleSource> FadeOut<S> {
    pub fn new(source: S, fade_after: u64, fade_len: u64) -> Self {
        Self {
            source,
            fade_after,
            fade_len,
            position: 0,
        }
    }

    pub fn end(&self) -> u64 {
        self.fade_after + self.fade_len
    }
}

impl<S: SampleSource> SampleSource for FadeOut<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let left = self.end().saturating_sub(self.position);
        let n = (left.min(out.len() as u64)) as usize;
        let got = self.source.read(&mut out[..n]);

        for (i, sample) in out[..got].iter_mut().enumerate() {
            let pos = self.position + i as u64;
            if pos >= self.fade_after {
                let into_fade = pos - self.fade_after;
                *sample *= (self.fade_len - into_fade) as f32 / self.fade_len as f32;
            }
        }

        self.position += got as u64;
        got
    }
}

pub struct Gain<S> {
    source: S,
    pub gain: f32,
}

impl<S: SampleSource> Gain<S> {
    pub fn new(source: S, gain: f32) -> Self {
        Self { source, gain }
    }
}

impl<S: SampleSource> SampleSource for Gain<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let got = self.source.read(out);
        for sample in out[..got].iter_mut() {
            *sample *= self.gain;
        }
        got
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Sustain,
    Release,
    Complete,
}

/// Lets another thread put an `Envelope` into its release stage.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeHandle {
    released: Arc<AtomicBool>,
}

impl EnvelopeHandle {
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Attack ramp, full sustain, then a linear release once the handle fires.
///
/// A release request is picked up at the start of the next `read`.
pub struct Envelope<S> {
    source: S,
    handle: EnvelopeHandle,
    attack_len: u64,
    release_len: u64,
    stage: EnvelopeStage,
    position: u64,
    level: f32,
    release_from: f32,
    release_pos: u64,
}

impl<S: SampleSource> Envelope<S> {
    pub fn new(source: S, attack_len: u64, release_len: u64) -> Self {
        Self {
            source,
            handle: EnvelopeHandle::default(),
            attack_len,
            release_len: release_len.max(1),
            stage: if attack_len == 0 { EnvelopeStage::Sustain } else { EnvelopeStage::Attack },
            position: 0,
            level: if attack_len == 0 { 1.0 } else { 0.0 },
            release_from: 0.0,
            release_pos: 0,
        }
    }

    pub fn handle(&self) -> EnvelopeHandle {
        self.handle.clone()
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}

impl<S: SampleSource> SampleSource for Envelope<S> {
    fn read(&mut self, out: &mut [f32]) -> usize {
        if self.stage == EnvelopeStage::Complete {
            return 0;
        }
        if self.handle.is_released() && self.stage != EnvelopeStage::Release {
            self.stage = EnvelopeStage::Release;
            self.release_from = self.level;
            self.release_pos = 0;
        }

        let got = self.source.read(out);
        for (i, sample) in out[..got].iter_mut().enumerate() {
            match self.stage {
                EnvelopeStage::Attack => {
                    self.level = self.position as f32 / self.attack_len as f32;
                    if self.position + 1 >= self.attack_len {
                        self.stage = EnvelopeStage::Sustain;
                    }
                }
                EnvelopeStage::Sustain => self.level = 1.0,
                EnvelopeStage::Release => {
                    self.level = self.release_from
                        * (1.0 - self.release_pos as f32 / self.release_len as f32);
                    self.release_pos += 1;
                    if self.release_pos >= self.release_len {
                        self.stage = EnvelopeStage::Complete;
                        *sample *= self.level;
                        self.position += 1;
                        return i + 1;
                    }
                }
                EnvelopeStage::Complete => return i,
            }
            *sample *= self.level;
            self.position += 1;
        }
        got
    }
}
