// The editing session: timeline grid, per-cell effect chains and parameter
// overrides, cell selection, undo history, and tempo. This is the single
// piece of state shared between the UI thread and the audio engine; all
// mutation happens through the engine's command loop, one callback at a time.

use anyhow::{Result, anyhow};
use std::collections::HashMap;

use super::catalog::Sound;
use super::effects::{EffectKind, ParamMap, descriptor};
use super::grid::Grid;
use super::history::SnapshotHistory;
use super::{DEFAULT_BPM, MAX_BPM, MIN_BPM};

type Cell = (usize, usize);

#[derive(Debug)]
pub struct Session {
    grid: Grid,
    /// Active effect chain per cell; insertion order is chain order, no
    /// duplicates. Entries for cells that have since been emptied are
    /// tolerated but never consulted at render time.
    cell_effects: HashMap<Cell, Vec<EffectKind>>,
    /// Per-cell parameter overrides, seeded from descriptor defaults the
    /// first time an effect is enabled on that cell. Kept across a
    /// disable/re-enable of the same effect.
    effect_settings: HashMap<Cell, HashMap<EffectKind, ParamMap>>,
    selected: Option<Cell>,
    history: SnapshotHistory,
    bpm: u32,
    /// Current step during playback, written by the engine on each tick.
    /// `None` means the transport is stopped.
    pub playhead: Option<usize>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            grid: Grid::new(),
            cell_effects: HashMap::new(),
            effect_settings: HashMap::new(),
            selected: None,
            history: SnapshotHistory::new(),
            bpm: DEFAULT_BPM,
            playhead: None,
        }
    }

    fn check_bounds(track: usize, step: usize) -> Result<()> {
        if Grid::in_bounds(track, step) {
            Ok(())
        } else {
            Err(anyhow!("cell ({}, {}) out of range", track, step))
        }
    }

    /// Place a copy of `sound` at (track, step). When `origin` names a prior
    /// cell (a move), that cell is cleared in the same edit. Dropping a
    /// placement onto itself is a no-op; dropping onto an occupied cell
    /// overwrites the previous occupant.
    pub fn place(
        &mut self,
        track: usize,
        step: usize,
        sound: Sound,
        origin: Option<Cell>,
    ) -> Result<()> {
        Self::check_bounds(track, step)?;
        if let Some((from_track, from_step)) = origin {
            Self::check_bounds(from_track, from_step)?;
            if (from_track, from_step) == (track, step) {
                return Ok(());
            }
            self.grid.set(from_track, from_step, None);
        }
        self.grid.set(track, step, Some(sound));
        self.history.record(&self.grid);
        Ok(())
    }

    /// Clear a cell. Clears the selection if it pointed at this cell.
    pub fn remove(&mut self, track: usize, step: usize) -> Result<()> {
        Self::check_bounds(track, step)?;
        if !self.grid.is_occupied(track, step) {
            return Ok(());
        }
        self.grid.set(track, step, None);
        if self.selected == Some((track, step)) {
            self.selected = None;
        }
        self.history.record(&self.grid);
        Ok(())
    }

    /// Toggle selection: re-selecting the current cell deselects it,
    /// selecting another populated cell moves the selection, and selecting
    /// an empty cell does nothing.
    pub fn select(&mut self, track: usize, step: usize) -> Result<()> {
        Self::check_bounds(track, step)?;
        if !self.grid.is_occupied(track, step) {
            return Ok(());
        }
        if self.selected == Some((track, step)) {
            self.selected = None;
        } else {
            self.selected = Some((track, step));
        }
        Ok(())
    }

    pub fn selected_cell(&self) -> Option<Cell> {
        self.selected
    }

    pub fn has_effects(&self, track: usize, step: usize) -> bool {
        self.cell_effects
            .get(&(track, step))
            .is_some_and(|chain| !chain.is_empty())
    }

    /// Enable or disable an effect on a cell. Enabling appends to the end of
    /// the chain and seeds this cell's parameter overrides from the effect's
    /// defaults if it has never been enabled here before.
    pub fn toggle_effect(&mut self, track: usize, step: usize, kind: EffectKind) -> Result<()> {
        Self::check_bounds(track, step)?;
        let chain = self.cell_effects.entry((track, step)).or_default();
        if let Some(pos) = chain.iter().position(|&k| k == kind) {
            chain.remove(pos);
        } else {
            chain.push(kind);
            self.effect_settings
                .entry((track, step))
                .or_default()
                .entry(kind)
                .or_insert_with(|| descriptor(kind).default_params());
        }
        Ok(())
    }

    /// Write one parameter override for an effect on a cell. The engine also
    /// pushes the value into the shared live instance so auditioning
    /// reflects the edit immediately. Values arrive range-clamped from the
    /// control surface.
    pub fn set_effect_param(
        &mut self,
        track: usize,
        step: usize,
        kind: EffectKind,
        param: &str,
        value: f32,
    ) -> Result<()> {
        Self::check_bounds(track, step)?;
        let params = self
            .effect_settings
            .entry((track, step))
            .or_default()
            .entry(kind)
            .or_insert_with(|| descriptor(kind).default_params());
        params.insert(param.to_string(), value);
        Ok(())
    }

    pub fn effect_chain(&self, track: usize, step: usize) -> &[EffectKind] {
        self.cell_effects
            .get(&(track, step))
            .map(|chain| chain.as_slice())
            .unwrap_or(&[])
    }

    pub fn effect_params(&self, track: usize, step: usize, kind: EffectKind) -> Option<&ParamMap> {
        self.effect_settings.get(&(track, step))?.get(&kind)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Step the grid back one structural edit. Effect state, settings, and
    /// selection are left as they are.
    pub fn undo(&mut self) {
        if let Some(grid) = self.history.undo() {
            self.grid = grid;
        }
    }

    /// Joint reset of grid, effect state, settings, selection, and history.
    /// Destructive; the UI gates this behind a confirmation prompt.
    pub fn clear_all(&mut self) {
        self.grid = Grid::new();
        self.cell_effects.clear();
        self.effect_settings.clear();
        self.selected = None;
        self.history.clear();
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Rebase the undo stack on the current grid. Used after loading a
    /// project so the first undo steps back to an empty timeline instead of
    /// through the load's intermediate placements.
    pub fn reset_history(&mut self) {
        self.history.clear();
        self.history.record(&self.grid);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::{NUM_STEPS, NUM_TRACKS};

    fn sound(id: u32, name: &str) -> Sound {
        Sound {
            id,
            name: name.to_string(),
            path: format!("sounds/{}.wav", name.to_lowercase()),
        }
    }

    #[test]
    fn test_place_and_remove() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        assert!(session.grid().is_occupied(0, 0));

        session.remove(0, 0).unwrap();
        assert!(session.grid().is_empty());
    }

    #[test]
    fn test_move_clears_origin_and_nothing_else() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        session.place(3, 9, sound(2, "Snare"), None).unwrap();

        // Move the kick from (0,0) to (2,5).
        session.place(2, 5, sound(1, "Kick"), Some((0, 0))).unwrap();

        assert!(!session.grid().is_occupied(0, 0));
        assert_eq!(session.grid().get(2, 5).unwrap().id, 1);
        assert_eq!(session.grid().get(3, 9).unwrap().id, 2);
        assert_eq!(session.grid().placements().count(), 2);
    }

    #[test]
    fn test_move_onto_itself_is_noop() {
        let mut session = Session::new();
        session.place(1, 1, sound(1, "Kick"), None).unwrap();
        let history_before = session.history_len();

        session.place(1, 1, sound(1, "Kick"), Some((1, 1))).unwrap();

        assert!(session.grid().is_occupied(1, 1));
        assert_eq!(session.history_len(), history_before);
    }

    #[test]
    fn test_drop_overwrites_occupant() {
        let mut session = Session::new();
        session.place(0, 3, sound(1, "Kick"), None).unwrap();
        session.place(0, 3, sound(2, "Snare"), None).unwrap();

        assert_eq!(session.grid().get(0, 3).unwrap().id, 2);
        assert_eq!(session.grid().placements().count(), 1);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut session = Session::new();
        assert!(session.place(NUM_TRACKS, 0, sound(1, "Kick"), None).is_err());
        assert!(session.place(0, NUM_STEPS, sound(1, "Kick"), None).is_err());
        assert!(session.remove(NUM_TRACKS, 0).is_err());
        assert!(session.select(0, NUM_STEPS).is_err());
        assert!(session.grid().is_empty());
    }

    #[test]
    fn test_select_toggles_and_skips_empty() {
        let mut session = Session::new();
        session.place(2, 2, sound(1, "Kick"), None).unwrap();

        // Selecting an empty cell is a no-op.
        session.select(0, 0).unwrap();
        assert_eq!(session.selected_cell(), None);

        session.select(2, 2).unwrap();
        assert_eq!(session.selected_cell(), Some((2, 2)));

        // Re-selecting deselects.
        session.select(2, 2).unwrap();
        assert_eq!(session.selected_cell(), None);
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut session = Session::new();
        session.place(1, 4, sound(1, "Kick"), None).unwrap();
        session.select(1, 4).unwrap();

        session.remove(1, 4).unwrap();
        assert_eq!(session.selected_cell(), None);
    }

    #[test]
    fn test_effect_toggle_round_trip() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();

        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        assert!(session.has_effects(0, 0));
        let params = session.effect_params(0, 0, EffectKind::Reverb).unwrap();
        assert_eq!(*params, descriptor(EffectKind::Reverb).default_params());

        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        assert!(!session.has_effects(0, 0));
    }

    #[test]
    fn test_chain_order_is_insertion_order() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        session.toggle_effect(0, 0, EffectKind::Filter).unwrap();
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        session.toggle_effect(0, 0, EffectKind::Delay).unwrap();
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap(); // disable
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap(); // re-enable at end

        assert_eq!(
            session.effect_chain(0, 0),
            &[EffectKind::Filter, EffectKind::Delay, EffectKind::Reverb]
        );
    }

    #[test]
    fn test_settings_survive_disable() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        session
            .set_effect_param(0, 0, EffectKind::Reverb, "decay", 7.5)
            .unwrap();

        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();

        let params = session.effect_params(0, 0, EffectKind::Reverb).unwrap();
        assert_eq!(params["decay"], 7.5);
    }

    #[test]
    fn test_undo_restores_prior_structural_state() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap(); // E1
        let after_e1 = session.grid().clone();
        session.place(1, 8, sound(2, "Snare"), None).unwrap(); // E2

        session.undo();
        assert_eq!(*session.grid(), after_e1);
    }

    #[test]
    fn test_undo_idempotent_at_floor() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();

        session.undo(); // back to empty, history cleared
        assert!(session.grid().is_empty());
        assert_eq!(session.history_len(), 0);

        session.undo();
        session.undo();
        assert!(session.grid().is_empty());
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn test_undo_leaves_effect_state_alone() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        session.toggle_effect(0, 0, EffectKind::Delay).unwrap();
        session.place(0, 1, sound(2, "Snare"), None).unwrap();

        session.undo();
        // Placement rolled back, effect metadata untouched.
        assert!(!session.grid().is_occupied(0, 1));
        assert!(session.has_effects(0, 0));
    }

    #[test]
    fn test_clear_all_resets_everything() {
        let mut session = Session::new();
        session.place(0, 0, sound(1, "Kick"), None).unwrap();
        session.toggle_effect(0, 0, EffectKind::Reverb).unwrap();
        session.select(0, 0).unwrap();

        session.clear_all();

        assert!(session.grid().is_empty());
        assert!(!session.has_effects(0, 0));
        assert_eq!(session.selected_cell(), None);
        assert_eq!(session.history_len(), 0);

        // History floor after clear: undo stays a no-op.
        session.undo();
        assert!(session.grid().is_empty());
    }

    #[test]
    fn test_bpm_clamped() {
        let mut session = Session::new();
        session.set_bpm(20);
        assert_eq!(session.bpm(), MIN_BPM);
        session.set_bpm(500);
        assert_eq!(session.bpm(), MAX_BPM);
        session.set_bpm(140);
        assert_eq!(session.bpm(), 140);
    }
}
