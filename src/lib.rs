pub mod audio;
pub mod studio;
pub mod ui;

pub use audio::StudioEngine;
pub use studio::{Session, SoundLibrary};
pub use ui::TerminalUI;
