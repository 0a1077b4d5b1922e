// The fixed effect set: descriptors, control schemas, and default parameters.
// One live processor per kind exists in the audio engine's EffectRack; this
// module is the static metadata the UI and session share.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name -> value. Ordered so snapshots and saved projects are
/// deterministic.
pub type ParamMap = BTreeMap<String, f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Reverb,
    Delay,
    Distortion,
    Filter,
    PitchShift,
}

impl EffectKind {
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Distortion,
        EffectKind::Filter,
        EffectKind::PitchShift,
    ];

    pub fn display_name(self) -> &'static str {
        descriptor(self).name
    }
}

/// Schema for one slider in the effect control panel. The UI nudges values
/// by `step` and clamps to [min, max], so the engine never sees an
/// out-of-range or non-numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSpec {
    pub label: &'static str,
    pub param: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectDescriptor {
    pub kind: EffectKind,
    pub name: &'static str,
    pub controls: &'static [ControlSpec],
}

impl EffectDescriptor {
    /// Seed parameter map: every control at its default value.
    pub fn default_params(&self) -> ParamMap {
        self.controls
            .iter()
            .map(|c| (c.param.to_string(), c.default))
            .collect()
    }

    pub fn control(&self, param: &str) -> Option<&'static ControlSpec> {
        self.controls.iter().find(|c| c.param == param)
    }
}

const REVERB: EffectDescriptor = EffectDescriptor {
    kind: EffectKind::Reverb,
    name: "Reverb",
    controls: &[
        ControlSpec {
            label: "Decay",
            param: "decay",
            min: 0.1,
            max: 10.0,
            step: 0.1,
            default: 2.5,
        },
        ControlSpec {
            label: "Mix",
            param: "wet",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            default: 0.5,
        },
    ],
};

const DELAY: EffectDescriptor = EffectDescriptor {
    kind: EffectKind::Delay,
    name: "Delay",
    controls: &[
        ControlSpec {
            label: "Time",
            param: "time",
            min: 0.05,
            max: 1.0,
            step: 0.05,
            default: 0.25,
        },
        ControlSpec {
            label: "Feedback",
            param: "feedback",
            min: 0.0,
            max: 0.9,
            step: 0.01,
            default: 0.5,
        },
        ControlSpec {
            label: "Mix",
            param: "wet",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            default: 0.5,
        },
    ],
};

const DISTORTION: EffectDescriptor = EffectDescriptor {
    kind: EffectKind::Distortion,
    name: "Distortion",
    controls: &[
        ControlSpec {
            label: "Amount",
            param: "amount",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            default: 0.4,
        },
        ControlSpec {
            label: "Mix",
            param: "wet",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            default: 0.5,
        },
    ],
};

const FILTER: EffectDescriptor = EffectDescriptor {
    kind: EffectKind::Filter,
    name: "Filter",
    controls: &[
        ControlSpec {
            label: "Frequency",
            param: "frequency",
            min: 50.0,
            max: 10000.0,
            step: 10.0,
            default: 800.0,
        },
        ControlSpec {
            label: "Resonance",
            param: "q",
            min: 0.1,
            max: 10.0,
            step: 0.1,
            default: 1.0,
        },
    ],
};

const PITCH_SHIFT: EffectDescriptor = EffectDescriptor {
    kind: EffectKind::PitchShift,
    name: "Pitch",
    controls: &[ControlSpec {
        label: "Pitch",
        param: "pitch",
        min: -12.0,
        max: 12.0,
        step: 1.0,
        default: 0.0,
    }],
};

pub fn descriptor(kind: EffectKind) -> &'static EffectDescriptor {
    match kind {
        EffectKind::Reverb => &REVERB,
        EffectKind::Delay => &DELAY,
        EffectKind::Distortion => &DISTORTION,
        EffectKind::Filter => &FILTER,
        EffectKind::PitchShift => &PITCH_SHIFT,
    }
}
