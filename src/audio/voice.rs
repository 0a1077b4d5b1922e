// A persistent player bound to one sound's decoded buffer. Created lazily
// on the first trigger of that sound and reused for the rest of the
// session; re-triggering restarts playback from the top of the clip, so the
// same sound fired on two tracks in one tick plays once, not twice.

use std::sync::Arc;

use crate::studio::effects::EffectKind;

#[derive(Debug, Clone)]
pub struct Player {
    buffer: Arc<Vec<f32>>,
    chain: Vec<EffectKind>,
    /// Fractional read position; advanced by `rate` per output sample.
    pos: f64,
    rate: f64,
    active: bool,
}

impl Player {
    pub fn new(buffer: Arc<Vec<f32>>) -> Self {
        Self {
            buffer,
            chain: Vec::new(),
            pos: 0.0,
            rate: 1.0,
            active: false,
        }
    }

    /// Restart from the start of the clip with a fresh routing. Cuts any
    /// playback still in flight on this player.
    pub fn start(&mut self, buffer: Arc<Vec<f32>>, chain: Vec<EffectKind>, rate: f64) {
        self.buffer = buffer;
        self.chain = chain;
        self.pos = 0.0;
        self.rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        };
        self.active = !self.buffer.is_empty();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn chain(&self) -> &[EffectKind] {
        &self.chain
    }

    /// Render the next dry block into `out`, overwriting it. Returns the
    /// number of samples written; the player goes inactive at the end of
    /// the clip. Linear interpolation covers non-unit rates.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        if !self.active {
            return 0;
        }
        let data = &self.buffer[..];
        let mut written = 0;
        for slot in out.iter_mut() {
            let index = self.pos as usize;
            if index >= data.len() {
                self.active = false;
                break;
            }
            let frac = (self.pos - index as f64) as f32;
            let s0 = data[index];
            let s1 = data.get(index + 1).copied().unwrap_or(s0);
            *slot = s0 + (s1 - s0) * frac;
            self.pos += self.rate;
            written += 1;
        }
        written
    }
}
