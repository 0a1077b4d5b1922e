// Step clock for the transport: counts output samples and fires one tick
// per eighth-note step, looping over the 16-step timeline.

use super::{DEFAULT_BPM, MAX_BPM, MIN_BPM, NUM_STEPS};

/// Sample-counting step clock. The audio engine calls `advance` once per
/// output block; ticks never overlap because a block is fully processed
/// before the next callback runs.
#[derive(Debug, Clone)]
pub struct StepClock {
    sample_rate: u32,
    bpm: u32,
    playing: bool,
    samples_per_step: f64,
    /// Samples remaining until the next tick fires.
    until_next: f64,
    /// Step index the next tick will report.
    next_step: usize,
    current: Option<usize>,
}

impl StepClock {
    pub fn new(sample_rate: u32, bpm: u32) -> Self {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        Self {
            sample_rate,
            bpm,
            playing: false,
            samples_per_step: Self::calculate_samples_per_step(sample_rate, bpm),
            until_next: 0.0,
            next_step: 0,
            current: None,
        }
    }

    /// One step is an eighth note: half a beat.
    fn calculate_samples_per_step(sample_rate: u32, bpm: u32) -> f64 {
        (60.0 / bpm as f64) * sample_rate as f64 / 2.0
    }

    /// Start playback from step 0. Restarting while already playing tears
    /// the previous run down implicitly: the single clock resets, so there
    /// is never more than one tick stream.
    pub fn start(&mut self) {
        self.playing = true;
        self.next_step = 0;
        self.until_next = 0.0;
        self.current = None;
    }

    /// Safe to call when already stopped.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current step index, or `None` when stopped or before the first tick.
    pub fn playhead(&self) -> Option<usize> {
        if self.playing { self.current } else { None }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Change tempo. A tick already scheduled keeps its absolute timing;
    /// only the interval between subsequent ticks changes.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.samples_per_step = Self::calculate_samples_per_step(self.sample_rate, self.bpm);
    }

    /// Consume `frames` output samples and return every step index that
    /// ticked inside the block, in order. Empty when stopped.
    pub fn advance(&mut self, frames: usize) -> Vec<usize> {
        if !self.playing {
            return Vec::new();
        }
        let mut ticks = Vec::new();
        let mut remaining = frames as f64;
        // Strictly greater: a tick due exactly at the end of this block
        // belongs to the start of the next one.
        while remaining > self.until_next {
            remaining -= self.until_next;
            ticks.push(self.next_step);
            self.current = Some(self.next_step);
            self.next_step = (self.next_step + 1) % NUM_STEPS;
            self.until_next = self.samples_per_step;
        }
        self.until_next -= remaining;
        ticks
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new(44100, DEFAULT_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_length_calculation() {
        let clock = StepClock::new(44100, 120);
        // At 120 BPM a beat is 0.5s; an eighth-note step is 0.25s,
        // 0.25 * 44100 = 11025 samples.
        assert_eq!(clock.samples_per_step, 11025.0);
    }

    #[test]
    fn test_one_loop_ticks_every_step_in_order() {
        let mut clock = StepClock::new(44100, 120);
        clock.start();

        let mut ticks = Vec::new();
        // 16 steps of 11025 samples, in 441-sample blocks.
        for _ in 0..(16 * 25) {
            ticks.extend(clock.advance(441));
        }

        assert_eq!(ticks, (0..NUM_STEPS).collect::<Vec<_>>());
    }

    #[test]
    fn test_loops_back_to_step_zero() {
        let mut clock = StepClock::new(44100, 120);
        clock.start();

        let ticks = clock.advance(16 * 11025 + 1);
        assert_eq!(ticks.len(), 17);
        assert_eq!(ticks[15], 15);
        assert_eq!(ticks[16], 0);
    }

    #[test]
    fn test_stopped_clock_never_ticks() {
        let mut clock = StepClock::new(44100, 120);
        assert!(clock.advance(44100).is_empty());
        assert_eq!(clock.playhead(), None);

        clock.start();
        clock.advance(441);
        clock.stop();
        assert_eq!(clock.playhead(), None);
        assert!(clock.advance(44100).is_empty());

        // Stopping again is a no-op.
        clock.stop();
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_restart_resets_to_step_zero() {
        let mut clock = StepClock::new(44100, 120);
        clock.start();
        clock.advance(5 * 11025 + 100);
        assert_eq!(clock.playhead(), Some(5));

        clock.start();
        let ticks = clock.advance(441);
        assert_eq!(ticks, vec![0]);
    }

    #[test]
    fn test_bpm_change_keeps_scheduled_tick() {
        let mut clock = StepClock::new(44100, 120);
        clock.start();
        clock.advance(1); // fires step 0, next due in 11025

        // Raising the tempo must not move the already-scheduled tick: step 1
        // still lands 11025 samples after step 0.
        clock.set_bpm(200);
        let ticks = clock.advance(11025);
        assert_eq!(ticks, vec![1]);

        // Subsequent intervals use the new tempo: 60/200*44100/2 = 6615.
        let ticks = clock.advance(6615);
        assert_eq!(ticks, vec![2]);
    }

    #[test]
    fn test_playhead_matches_last_tick() {
        let mut clock = StepClock::new(44100, 120);
        clock.start();
        for expected in 0..NUM_STEPS {
            let ticks = clock.advance(11025);
            assert_eq!(ticks, vec![expected]);
            assert_eq!(clock.playhead(), Some(expected));
        }
    }
}
