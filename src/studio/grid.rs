// The timeline grid: a fixed 6x16 matrix of optional sound placements.

use super::catalog::Sound;
use super::{NUM_STEPS, NUM_TRACKS};

/// Fixed-shape matrix of tracks by steps. Each cell is either empty or
/// holds its own copy of a `Sound`. Structural edits (place/remove/move)
/// go through `Session`, which validates coordinates and keeps the undo
/// history in sync; `Grid` itself only stores cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: Vec<Vec<Option<Sound>>>,
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: vec![vec![None; NUM_STEPS]; NUM_TRACKS],
        }
    }

    pub fn in_bounds(track: usize, step: usize) -> bool {
        track < NUM_TRACKS && step < NUM_STEPS
    }

    pub fn get(&self, track: usize, step: usize) -> Option<&Sound> {
        self.cells.get(track)?.get(step)?.as_ref()
    }

    /// Overwrite a cell. Callers validate coordinates first.
    pub fn set(&mut self, track: usize, step: usize, sound: Option<Sound>) {
        self.cells[track][step] = sound;
    }

    pub fn is_occupied(&self, track: usize, step: usize) -> bool {
        self.get(track, step).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| cell.is_none()))
    }

    /// All populated cells in (track, step) order.
    pub fn placements(&self) -> impl Iterator<Item = (usize, usize, &Sound)> {
        self.cells.iter().enumerate().flat_map(|(track, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(step, cell)| cell.as_ref().map(|sound| (track, step, sound)))
        })
    }

    /// Populated cells in one step column, in track order.
    pub fn sounds_at_step(&self, step: usize) -> impl Iterator<Item = (usize, &Sound)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(track, row)| {
                row.get(step)
                    .and_then(|cell| cell.as_ref())
                    .map(|sound| (track, sound))
            })
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}
