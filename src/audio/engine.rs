// The playback engine. Owned by the output stream's callback: each block it
// drains pending commands, advances the step clock, fires the triggers for
// any step that ticked, and mixes the active voices through the shared
// effect rack. The session mutex is only ever taken here and briefly on the
// UI thread for drawing, so the callback never blocks for long.

use crossbeam::channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::bank::SampleBank;
use super::rack::EffectRack;
use super::voice::Player;
use super::{AudioEvent, StudioCommand, debug_log};
use crate::studio::effects::EffectKind;
use crate::studio::session::Session;
use crate::studio::catalog::Sound;
use crate::studio::transport::StepClock;

pub struct StudioEngine {
    session: Arc<Mutex<Session>>,
    bank: SampleBank,
    rack: EffectRack,
    clock: StepClock,
    /// One persistent player per sound id. Re-triggering a sound restarts
    /// its player, so the same sound on two tracks in one tick plays once.
    players: HashMap<u32, Player>,
    command_rx: Receiver<StudioCommand>,
    event_tx: Sender<AudioEvent>,
    scratch: Vec<f32>,
    debug_mode: bool,
}

impl StudioEngine {
    pub fn new(
        session: Arc<Mutex<Session>>,
        bank: SampleBank,
        sample_rate: u32,
        command_rx: Receiver<StudioCommand>,
        event_tx: Sender<AudioEvent>,
        debug_mode: bool,
    ) -> Self {
        let bpm = session
            .lock()
            .map(|s| s.bpm())
            .unwrap_or(crate::studio::DEFAULT_BPM);
        Self {
            session,
            bank,
            rack: EffectRack::new(sample_rate),
            clock: StepClock::new(sample_rate, bpm),
            players: HashMap::new(),
            command_rx,
            event_tx,
            scratch: Vec::new(),
            debug_mode,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    #[cfg(test)]
    pub fn rack(&self) -> &EffectRack {
        &self.rack
    }

    /// Fill one mono output block. Called from the stream callback.
    pub fn process_block(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        while let Ok(command) = self.command_rx.try_recv() {
            self.handle_command(command);
        }

        let ticks = self.clock.advance(out.len());
        for step in ticks {
            self.trigger_step(step);
        }

        self.render_voices(out);

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    fn handle_command(&mut self, command: StudioCommand) {
        let result = match command {
            StudioCommand::Place {
                track,
                step,
                sound,
                origin,
            } => self.with_session(|s| s.place(track, step, sound, origin)),
            StudioCommand::Remove { track, step } => self.with_session(|s| s.remove(track, step)),
            StudioCommand::Select { track, step } => self.with_session(|s| s.select(track, step)),
            StudioCommand::ToggleEffect { track, step, kind } => {
                self.with_session(|s| s.toggle_effect(track, step, kind))
            }
            StudioCommand::SetEffectParam {
                track,
                step,
                kind,
                param,
                value,
            } => {
                // Mirror the edit into the live instance so an effect that
                // is currently sounding follows the control immediately.
                self.rack.set_param(kind, &param, value);
                self.with_session(|s| s.set_effect_param(track, step, kind, &param, value))
            }
            StudioCommand::Undo => self.with_session(|s| {
                s.undo();
                Ok(())
            }),
            StudioCommand::ClearAll => self.with_session(|s| {
                s.clear_all();
                Ok(())
            }),
            StudioCommand::Play => {
                self.clock.start();
                Ok(())
            }
            StudioCommand::Stop => {
                // Voices already sounding ring out on their own.
                self.clock.stop();
                let _ = self.with_session(|s| {
                    s.playhead = None;
                    Ok(())
                });
                let _ = self.event_tx.send(AudioEvent::Playhead(None));
                Ok(())
            }
            StudioCommand::SetBpm(bpm) => self
                .with_session(|s| {
                    s.set_bpm(bpm);
                    Ok(s.bpm())
                })
                .map(|clamped| self.clock.set_bpm(clamped)),
            StudioCommand::Preview(sound) => self.preview(sound),
        };

        if let Err(e) = result {
            debug_log(self.debug_mode, &format!("command failed: {}", e));
            let _ = self.event_tx.send(AudioEvent::Error(e.to_string()));
        }
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        f(&mut session)
    }

    fn preview(&mut self, sound: Sound) -> anyhow::Result<()> {
        let Some(buffer) = self.bank.get(sound.id) else {
            anyhow::bail!("no sample loaded for \"{}\"", sound.name);
        };
        self.players
            .entry(sound.id)
            .or_insert_with(|| Player::new(buffer.clone()))
            .start(buffer, Vec::new(), 1.0);
        Ok(())
    }

    /// Fire every populated cell in this step's column, track 0 first.
    fn trigger_step(&mut self, step: usize) {
        let mut triggers: Vec<(usize, Sound, Vec<EffectKind>)> = Vec::new();
        {
            let Ok(mut session) = self.session.lock() else {
                return;
            };
            session.playhead = Some(step);
            for (track, sound) in session.grid().sounds_at_step(step) {
                let chain = session.effect_chain(track, step).to_vec();
                // Push this cell's overrides into the shared instances
                // before sampling anything from them.
                for &kind in &chain {
                    if let Some(params) = session.effect_params(track, step, kind) {
                        self.rack.apply_params(kind, params);
                    }
                }
                triggers.push((track, sound.clone(), chain));
            }
        }
        let _ = self.event_tx.send(AudioEvent::Playhead(Some(step)));

        for (track, sound, chain) in triggers {
            let Some(buffer) = self.bank.get(sound.id) else {
                debug_log(
                    self.debug_mode,
                    &format!("step {}: no sample for \"{}\", skipped", step, sound.name),
                );
                continue;
            };
            let rate = if chain.contains(&EffectKind::PitchShift) {
                self.rack.pitch_rate()
            } else {
                1.0
            };
            self.players
                .entry(sound.id)
                .or_insert_with(|| Player::new(buffer.clone()))
                .start(buffer, chain.clone(), rate);
            let _ = self.event_tx.send(AudioEvent::CellTriggered {
                track,
                step,
                sound_id: sound.id,
                effects: chain,
            });
        }
    }

    fn render_voices(&mut self, out: &mut [f32]) {
        self.scratch.resize(out.len(), 0.0);
        for player in self.players.values_mut() {
            if !player.is_active() {
                continue;
            }
            self.scratch.fill(0.0);
            player.render(&mut self.scratch);
            // The whole block goes through the chain so reverb and delay
            // tails extend past the end of the clip.
            let chain = player.chain().to_vec();
            for kind in chain {
                self.rack.process(kind, &mut self.scratch);
            }
            for (slot, &sample) in out.iter_mut().zip(self.scratch.iter()) {
                *slot += sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::NUM_TRACKS;
    use crossbeam::channel::unbounded;

    const BLOCK: usize = 441;
    // 120 BPM at 44100 Hz: 11025 samples per step, 25 blocks of 441.
    const BLOCKS_PER_STEP: usize = 25;

    fn sound(id: u32, name: &str) -> Sound {
        Sound {
            id,
            name: name.to_string(),
            path: format!("sounds/{}.wav", name.to_lowercase()),
        }
    }

    fn engine_with(
        setup: impl FnOnce(&mut Session),
    ) -> (StudioEngine, Sender<StudioCommand>, Receiver<AudioEvent>) {
        let mut session = Session::new();
        setup(&mut session);
        let session = Arc::new(Mutex::new(session));
        let mut bank = SampleBank::new(44100);
        for id in 1..=8 {
            bank.insert(id, vec![0.25; 64]);
        }
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let engine = StudioEngine::new(session, bank, 44100, cmd_rx, event_tx, false);
        (engine, cmd_tx, event_rx)
    }

    fn run_blocks(engine: &mut StudioEngine, blocks: usize) {
        let mut out = vec![0.0f32; BLOCK];
        for _ in 0..blocks {
            engine.process_block(&mut out);
        }
    }

    fn collect_triggers(event_rx: &Receiver<AudioEvent>) -> Vec<(usize, usize, Vec<EffectKind>)> {
        let mut triggers = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            if let AudioEvent::CellTriggered {
                track,
                step,
                effects,
                ..
            } = event
            {
                triggers.push((track, step, effects));
            }
        }
        triggers
    }

    #[test]
    fn test_one_loop_triggers_every_populated_cell_in_step_order() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|session| {
            session.place(0, 0, sound(1, "Kick"), None).unwrap();
            session.place(2, 0, sound(2, "Snare"), None).unwrap();
            session.place(1, 7, sound(3, "Hi-Hat"), None).unwrap();
            session.place(5, 15, sound(4, "808"), None).unwrap();
        });

        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, 16 * BLOCKS_PER_STEP);

        let triggers = collect_triggers(&event_rx);
        let cells: Vec<(usize, usize)> = triggers.iter().map(|(t, s, _)| (*t, *s)).collect();
        assert_eq!(cells, vec![(0, 0), (2, 0), (1, 7), (5, 15)]);
    }

    #[test]
    fn test_playhead_events_follow_ticks() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|_| {});

        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, 3 * BLOCKS_PER_STEP);

        let mut positions = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            if let AudioEvent::Playhead(pos) = event {
                positions.push(pos);
            }
        }
        assert_eq!(positions, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_stop_reports_playhead_cleared() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|_| {});

        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, BLOCKS_PER_STEP);
        cmd_tx.send(StudioCommand::Stop).unwrap();
        run_blocks(&mut engine, 1);

        let mut last = None;
        while let Ok(event) = event_rx.try_recv() {
            if let AudioEvent::Playhead(pos) = event {
                last = Some(pos);
            }
        }
        assert_eq!(last, Some(None));
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_double_play_keeps_a_single_tick_stream() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|session| {
            session.place(0, 0, sound(1, "Kick"), None).unwrap();
        });

        // Two starts in a row reset the same clock instead of layering a
        // second one; one loop still triggers the cell exactly once.
        cmd_tx.send(StudioCommand::Play).unwrap();
        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, 16 * BLOCKS_PER_STEP);

        let triggers = collect_triggers(&event_rx);
        assert_eq!(triggers.len(), 1);
        assert_eq!((triggers[0].0, triggers[0].1), (0, 0));
    }

    #[test]
    fn test_effected_and_dry_cells_of_same_sound() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|session| {
            session.place(0, 0, sound(1, "Kick"), None).unwrap();
            session.place(0, 4, sound(1, "Kick"), None).unwrap();
            session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
            session
                .set_effect_param(0, 0, EffectKind::Reverb, "decay", 5.0)
                .unwrap();
        });

        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, 16 * BLOCKS_PER_STEP);

        let triggers = collect_triggers(&event_rx);
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0], (0, 0, vec![EffectKind::Reverb]));
        assert_eq!(triggers[1], (0, 4, vec![]));

        // The cell's override reached the shared reverb before its trigger.
        assert_eq!(engine.rack().param(EffectKind::Reverb, "decay"), Some(5.0));
    }

    #[test]
    fn test_missing_sample_skips_trigger() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|session| {
            session.place(0, 0, sound(99, "Ghost"), None).unwrap();
            session.place(1, 0, sound(1, "Kick"), None).unwrap();
        });

        cmd_tx.send(StudioCommand::Play).unwrap();
        run_blocks(&mut engine, BLOCKS_PER_STEP);

        let triggers = collect_triggers(&event_rx);
        assert_eq!(triggers.len(), 1);
        assert_eq!((triggers[0].0, triggers[0].1), (1, 0));
    }

    #[test]
    fn test_triggered_cell_produces_audio() {
        let (mut engine, cmd_tx, _event_rx) = engine_with(|session| {
            session.place(0, 0, sound(1, "Kick"), None).unwrap();
        });

        cmd_tx.send(StudioCommand::Play).unwrap();
        let mut out = vec![0.0f32; BLOCK];
        engine.process_block(&mut out);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_commands_drive_session_edits() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|_| {});

        cmd_tx
            .send(StudioCommand::Place {
                track: 0,
                step: 3,
                sound: sound(1, "Kick"),
                origin: None,
            })
            .unwrap();
        cmd_tx
            .send(StudioCommand::ToggleEffect {
                track: 0,
                step: 3,
                kind: EffectKind::Delay,
            })
            .unwrap();
        cmd_tx
            .send(StudioCommand::SetEffectParam {
                track: 0,
                step: 3,
                kind: EffectKind::Delay,
                param: "time".to_string(),
                value: 0.4,
            })
            .unwrap();
        run_blocks(&mut engine, 1);

        let session = engine.session.lock().unwrap();
        assert!(session.grid().is_occupied(0, 3));
        assert_eq!(session.effect_chain(0, 3), &[EffectKind::Delay]);
        assert_eq!(
            session.effect_params(0, 3, EffectKind::Delay).unwrap()["time"],
            0.4
        );
        drop(session);

        // Live instance followed the edit immediately.
        assert_eq!(engine.rack().param(EffectKind::Delay, "time"), Some(0.4));
        assert!(collect_triggers(&event_rx).is_empty());
    }

    #[test]
    fn test_out_of_range_command_reports_error() {
        let (mut engine, cmd_tx, event_rx) = engine_with(|_| {});

        cmd_tx
            .send(StudioCommand::Place {
                track: NUM_TRACKS,
                step: 0,
                sound: sound(1, "Kick"),
                origin: None,
            })
            .unwrap();
        run_blocks(&mut engine, 1);

        let mut saw_error = false;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, AudioEvent::Error(_)) {
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert!(engine.session.lock().unwrap().grid().is_empty());
    }

    #[test]
    fn test_bpm_change_applies_clamped() {
        let (mut engine, cmd_tx, _event_rx) = engine_with(|_| {});

        cmd_tx.send(StudioCommand::SetBpm(500)).unwrap();
        run_blocks(&mut engine, 1);

        assert_eq!(engine.clock.bpm(), crate::studio::MAX_BPM);
        assert_eq!(engine.session.lock().unwrap().bpm(), crate::studio::MAX_BPM);
    }
}
