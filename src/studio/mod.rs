pub mod catalog;
pub mod effects;
pub mod grid;
pub mod history;
pub mod project;
pub mod session;
pub mod transport;

pub use catalog::{Category, Sound, SoundLibrary};
pub use effects::{ControlSpec, EffectDescriptor, EffectKind, ParamMap};
pub use grid::Grid;
pub use history::SnapshotHistory;
pub use session::Session;
pub use transport::StepClock;

/// Timeline dimensions: 6 tracks by 16 steps.
pub const NUM_TRACKS: usize = 6;
pub const NUM_STEPS: usize = 16;

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const DEFAULT_BPM: u32 = 120;
