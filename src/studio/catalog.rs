// Sound library: a static catalog of named audio clips grouped by category.
// Loaded from a `sounds.toml` next to the project, or the built-in set.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry in the catalog. Cells in the timeline hold copies of this,
/// never shared references, so edits to one placement cannot alias another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    pub id: u32,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(rename = "sound", default)]
    pub sounds: Vec<Sound>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SoundLibrary {
    #[serde(rename = "category", default)]
    pub categories: Vec<Category>,
}

impl SoundLibrary {
    /// Parse a catalog from TOML text. Sound ids must be unique across
    /// categories since the engine keys decoded buffers and players by id.
    pub fn from_toml(text: &str) -> Result<Self> {
        let library: SoundLibrary = toml::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for sound in library.all_sounds() {
            if !seen.insert(sound.id) {
                return Err(anyhow!(
                    "duplicate sound id {} ({}) in catalog",
                    sound.id,
                    sound.name
                ));
            }
        }
        Ok(library)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `sounds.toml` from the project directory, falling back to the
    /// built-in catalog when the file is missing. A malformed file is an
    /// error, not a fallback.
    pub fn load_or_builtin(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join("sounds.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// The default catalog shipped with the program.
    pub fn builtin() -> Self {
        fn sound(id: u32, name: &str, path: &str) -> Sound {
            Sound {
                id,
                name: name.to_string(),
                path: path.to_string(),
            }
        }
        SoundLibrary {
            categories: vec![
                Category {
                    name: "Drums".to_string(),
                    sounds: vec![
                        sound(1, "Kick", "sounds/kick.wav"),
                        sound(2, "Snare", "sounds/snare.wav"),
                        sound(3, "Hi-Hat", "sounds/hihat.wav"),
                    ],
                },
                Category {
                    name: "Bass".to_string(),
                    sounds: vec![
                        sound(4, "808", "sounds/808.wav"),
                        sound(5, "Sub Bass", "sounds/subbass.wav"),
                    ],
                },
                Category {
                    name: "Synths".to_string(),
                    sounds: vec![
                        sound(6, "Pad", "sounds/pad.wav"),
                        sound(7, "Lead", "sounds/lead.wav"),
                    ],
                },
            ],
        }
    }

    pub fn all_sounds(&self) -> impl Iterator<Item = &Sound> {
        self.categories.iter().flat_map(|c| c.sounds.iter())
    }

    pub fn sound_count(&self) -> usize {
        self.all_sounds().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let library = SoundLibrary::builtin();
        assert_eq!(library.categories.len(), 3);
        assert_eq!(library.sound_count(), 7);

        let kick = library.all_sounds().find(|s| s.name == "Kick").unwrap();
        assert_eq!(kick.id, 1);
        assert_eq!(kick.path, "sounds/kick.wav");
    }

    #[test]
    fn test_parse_toml_catalog() {
        let text = r#"
            [[category]]
            name = "Percussion"

            [[category.sound]]
            id = 10
            name = "Clap"
            path = "samples/clap.wav"

            [[category.sound]]
            id = 11
            name = "Rim"
            path = "samples/rim.wav"
        "#;

        let library = SoundLibrary::from_toml(text).unwrap();
        assert_eq!(library.categories.len(), 1);
        assert_eq!(library.categories[0].name, "Percussion");
        assert_eq!(library.categories[0].sounds.len(), 2);
        assert_eq!(library.categories[0].sounds[1].name, "Rim");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let text = r#"
            [[category]]
            name = "A"
            [[category.sound]]
            id = 1
            name = "X"
            path = "x.wav"

            [[category]]
            name = "B"
            [[category.sound]]
            id = 1
            name = "Y"
            path = "y.wav"
        "#;

        assert!(SoundLibrary::from_toml(text).is_err());
    }
}
