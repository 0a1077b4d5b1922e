// The effect rack: exactly one live processor per effect kind for the whole
// process, owned by the engine and mutated in place as parameters change.
// Cells share these instances at render time; when two voices trigger with
// the same effect in one tick, the last parameter write before a trigger
// wins. That aliasing is part of the contract, not something to fix here.
//
// The processors themselves are intentionally small placeholders with the
// right parameter surface; this program is a sequencer, not a DSP library.

use crate::studio::effects::{EffectKind, ParamMap};

pub trait EffectProcessor: Send {
    fn kind(&self) -> EffectKind;
    /// Unknown parameter names are ignored; the control surface only emits
    /// names from the effect's schema.
    fn set_param(&mut self, param: &str, value: f32);
    fn param(&self, param: &str) -> Option<f32>;
    fn process(&mut self, block: &mut [f32]);
}

pub struct EffectRack {
    effects: Vec<Box<dyn EffectProcessor>>,
}

impl EffectRack {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            effects: vec![
                Box::new(Reverb::new(sample_rate)),
                Box::new(Delay::new(sample_rate)),
                Box::new(Distortion::new()),
                Box::new(Filter::new(sample_rate)),
                Box::new(PitchShift::new()),
            ],
        }
    }

    fn find(&self, kind: EffectKind) -> &dyn EffectProcessor {
        self.effects
            .iter()
            .find(|e| e.kind() == kind)
            .map(|e| e.as_ref())
            .expect("rack holds every effect kind")
    }

    fn find_mut(&mut self, kind: EffectKind) -> &mut (dyn EffectProcessor + 'static) {
        self.effects
            .iter_mut()
            .find(|e| e.kind() == kind)
            .map(|e| e.as_mut())
            .expect("rack holds every effect kind")
    }

    pub fn set_param(&mut self, kind: EffectKind, param: &str, value: f32) {
        self.find_mut(kind).set_param(param, value);
    }

    /// Push a cell's overrides into the shared instance, immediately before
    /// that cell's trigger.
    pub fn apply_params(&mut self, kind: EffectKind, params: &ParamMap) {
        let effect = self.find_mut(kind);
        for (param, &value) in params {
            effect.set_param(param, value);
        }
    }

    pub fn param(&self, kind: EffectKind, param: &str) -> Option<f32> {
        self.find(kind).param(param)
    }

    pub fn process(&mut self, kind: EffectKind, block: &mut [f32]) {
        self.find_mut(kind).process(block);
    }

    /// Playback-rate factor from the shared pitch instance, sampled at
    /// trigger time: one semitone per unit, 2^(pitch/12).
    pub fn pitch_rate(&self) -> f64 {
        let semitones = self.param(EffectKind::PitchShift, "pitch").unwrap_or(0.0);
        2f64.powf(semitones as f64 / 12.0)
    }
}

// ── Reverb: single feedback comb with an RT60-style decay ─────────────

struct Reverb {
    decay: f32,
    wet: f32,
    feedback: f32,
    loop_secs: f32,
    buffer: Vec<f32>,
    pos: usize,
}

impl Reverb {
    fn new(sample_rate: u32) -> Self {
        let loop_secs = 0.06;
        let len = ((sample_rate as f32 * loop_secs) as usize).max(1);
        let mut reverb = Self {
            decay: 2.5,
            wet: 0.5,
            feedback: 0.0,
            loop_secs,
            buffer: vec![0.0; len],
            pos: 0,
        };
        reverb.update_feedback();
        reverb
    }

    fn update_feedback(&mut self) {
        // Gain per pass such that the loop decays by 60 dB over `decay` seconds.
        self.feedback = 10f32.powf(-3.0 * self.loop_secs / self.decay.max(0.01));
    }
}

impl EffectProcessor for Reverb {
    fn kind(&self) -> EffectKind {
        EffectKind::Reverb
    }

    fn set_param(&mut self, param: &str, value: f32) {
        match param {
            "decay" => {
                self.decay = value;
                self.update_feedback();
            }
            "wet" => self.wet = value,
            _ => {}
        }
    }

    fn param(&self, param: &str) -> Option<f32> {
        match param {
            "decay" => Some(self.decay),
            "wet" => Some(self.wet),
            _ => None,
        }
    }

    fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            let delayed = self.buffer[self.pos];
            self.buffer[self.pos] = *sample + delayed * self.feedback;
            self.pos = (self.pos + 1) % self.buffer.len();
            *sample = *sample * (1.0 - self.wet) + delayed * self.wet;
        }
    }
}

// ── Delay: feedback delay line, up to one second ──────────────────────

struct Delay {
    time: f32,
    feedback: f32,
    wet: f32,
    sample_rate: u32,
    delay_samples: usize,
    buffer: Vec<f32>,
    pos: usize,
}

impl Delay {
    fn new(sample_rate: u32) -> Self {
        let mut delay = Self {
            time: 0.25,
            feedback: 0.5,
            wet: 0.5,
            sample_rate,
            delay_samples: 1,
            buffer: vec![0.0; sample_rate as usize + 1],
            pos: 0,
        };
        delay.update_delay_samples();
        delay
    }

    fn update_delay_samples(&mut self) {
        let samples = (self.time * self.sample_rate as f32) as usize;
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
    }
}

impl EffectProcessor for Delay {
    fn kind(&self) -> EffectKind {
        EffectKind::Delay
    }

    fn set_param(&mut self, param: &str, value: f32) {
        match param {
            "time" => {
                self.time = value;
                self.update_delay_samples();
            }
            "feedback" => self.feedback = value,
            "wet" => self.wet = value,
            _ => {}
        }
    }

    fn param(&self, param: &str) -> Option<f32> {
        match param {
            "time" => Some(self.time),
            "feedback" => Some(self.feedback),
            "wet" => Some(self.wet),
            _ => None,
        }
    }

    fn process(&mut self, block: &mut [f32]) {
        let len = self.buffer.len();
        for sample in block.iter_mut() {
            let read = (self.pos + len - self.delay_samples) % len;
            let delayed = self.buffer[read];
            self.buffer[self.pos] = *sample + delayed * self.feedback;
            self.pos = (self.pos + 1) % len;
            *sample = *sample * (1.0 - self.wet) + delayed * self.wet;
        }
    }
}

// ── Distortion: tanh drive ────────────────────────────────────────────

struct Distortion {
    amount: f32,
    wet: f32,
}

impl Distortion {
    fn new() -> Self {
        Self {
            amount: 0.4,
            wet: 0.5,
        }
    }
}

impl EffectProcessor for Distortion {
    fn kind(&self) -> EffectKind {
        EffectKind::Distortion
    }

    fn set_param(&mut self, param: &str, value: f32) {
        match param {
            "amount" => self.amount = value,
            "wet" => self.wet = value,
            _ => {}
        }
    }

    fn param(&self, param: &str) -> Option<f32> {
        match param {
            "amount" => Some(self.amount),
            "wet" => Some(self.wet),
            _ => None,
        }
    }

    fn process(&mut self, block: &mut [f32]) {
        let pre_gain = 1.0 + self.amount * 10.0;
        for sample in block.iter_mut() {
            let driven = (pre_gain * sample.clamp(-1.0, 1.0)).tanh();
            *sample = *sample * (1.0 - self.wet) + driven * self.wet;
        }
    }
}

// ── Filter: state-variable lowpass ────────────────────────────────────

struct Filter {
    frequency: f32,
    q: f32,
    sample_rate: u32,
    coeff: f32,
    low: f32,
    band: f32,
}

impl Filter {
    fn new(sample_rate: u32) -> Self {
        let mut filter = Self {
            frequency: 800.0,
            q: 1.0,
            sample_rate,
            coeff: 0.0,
            low: 0.0,
            band: 0.0,
        };
        filter.update_coeff();
        filter
    }

    fn update_coeff(&mut self) {
        // Cutoff capped well below Nyquist to keep the SVF stable.
        let fc = self.frequency.min(self.sample_rate as f32 / 6.0);
        self.coeff = 2.0 * (std::f32::consts::PI * fc / self.sample_rate as f32).sin();
    }
}

impl EffectProcessor for Filter {
    fn kind(&self) -> EffectKind {
        EffectKind::Filter
    }

    fn set_param(&mut self, param: &str, value: f32) {
        match param {
            "frequency" => {
                self.frequency = value;
                self.update_coeff();
            }
            "q" => self.q = value.max(0.1),
            _ => {}
        }
    }

    fn param(&self, param: &str) -> Option<f32> {
        match param {
            "frequency" => Some(self.frequency),
            "q" => Some(self.q),
            _ => None,
        }
    }

    fn process(&mut self, block: &mut [f32]) {
        let damp = 1.0 / self.q;
        for sample in block.iter_mut() {
            self.low += self.coeff * self.band;
            let high = *sample - self.low - damp * self.band;
            self.band += self.coeff * high;
            *sample = self.low;
        }
    }
}

// ── Pitch shift ───────────────────────────────────────────────────────

/// Holds the semitone offset like any other rack parameter. The player
/// samples its playback rate from this instance at trigger time, so the
/// block pass is an identity.
struct PitchShift {
    pitch: f32,
}

impl PitchShift {
    fn new() -> Self {
        Self { pitch: 0.0 }
    }
}

impl EffectProcessor for PitchShift {
    fn kind(&self) -> EffectKind {
        EffectKind::PitchShift
    }

    fn set_param(&mut self, param: &str, value: f32) {
        if param == "pitch" {
            self.pitch = value;
        }
    }

    fn param(&self, param: &str) -> Option<f32> {
        if param == "pitch" { Some(self.pitch) } else { None }
    }

    fn process(&mut self, _block: &mut [f32]) {}
}
