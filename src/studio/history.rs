// Undo history for the timeline: an append-only stack of full grid
// snapshots. Effect chains, parameter settings, and the selection are
// deliberately outside the undo contract; only placements are restored.

use super::grid::Grid;

#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    snapshots: Vec<Grid>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    /// Record the grid after a structural edit. Fully empty grids are never
    /// recorded, so the first placement after a clear starts a fresh stack.
    pub fn record(&mut self, grid: &Grid) {
        if !grid.is_empty() {
            self.snapshots.push(grid.clone());
        }
    }

    /// Step back one structural edit. Returns the grid to restore:
    /// with two or more entries the most recent is dropped and the previous
    /// one returned; with exactly one entry the stack empties and an empty
    /// grid is returned; with no entries there is nothing to do.
    pub fn undo(&mut self) -> Option<Grid> {
        match self.snapshots.len() {
            0 => None,
            1 => {
                self.snapshots.clear();
                Some(Grid::new())
            }
            _ => {
                self.snapshots.pop();
                self.snapshots.last().cloned()
            }
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
