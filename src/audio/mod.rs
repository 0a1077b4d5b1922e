pub mod bank;
pub mod engine;
pub mod rack;
pub mod stream;
pub mod voice;

pub use bank::SampleBank;
pub use engine::StudioEngine;
pub use rack::EffectRack;
pub use stream::AudioStream;
pub use voice::Player;

use crate::studio::catalog::Sound;
use crate::studio::effects::EffectKind;

/// Edits and transport actions sent from the UI thread to the engine.
/// Every mutation of the shared session happens inside the engine's
/// callback, one command at a time.
#[derive(Debug, Clone)]
pub enum StudioCommand {
    Place {
        track: usize,
        step: usize,
        sound: Sound,
        origin: Option<(usize, usize)>,
    },
    Remove {
        track: usize,
        step: usize,
    },
    Select {
        track: usize,
        step: usize,
    },
    ToggleEffect {
        track: usize,
        step: usize,
        kind: EffectKind,
    },
    SetEffectParam {
        track: usize,
        step: usize,
        kind: EffectKind,
        param: String,
        value: f32,
    },
    Undo,
    ClearAll,
    Play,
    Stop,
    SetBpm(u32),
    /// Audition a library sound dry, outside the grid.
    Preview(Sound),
}

/// Notifications from the engine back to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// New playhead position; `None` when the transport stops.
    Playhead(Option<usize>),
    CellTriggered {
        track: usize,
        step: usize,
        sound_id: u32,
        effects: Vec<EffectKind>,
    },
    Error(String),
}

/// Append a line to debug.log when --debug is active.
pub fn debug_log(enabled: bool, msg: &str) {
    if !enabled {
        return;
    }
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .and_then(|mut file| {
            use std::io::Write;
            writeln!(file, "{}", msg)
        });
}
