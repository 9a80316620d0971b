//! Amplifier control: the rig's routing and volume state machine.
//!
//! [`core::ControlCore`] owns the amplifier state (active input, input
//! mode, volume, dim) and is the only component that talks to the DSP
//! engine. Commands arrive over a channel and run to completion one at a
//! time, so every handler sees the state its predecessor left behind.

pub mod core;

pub use self::core::{ControlCore, ControlHandle, DIM_STEP, MAX_VOLUME, MIN_VOLUME};

use std::fmt;

use crate::dsp::DspError;
use crate::transport::TrackInfo;

/// Coarse volume step for the remote's volume buttons, in dB.
pub const VOLUME_STEP: f32 = 1.5;
/// Fine step for the encoder and the remote's fine buttons, in dB.
pub const VOLUME_STEP_FINE: f32 = 0.5;

/// Processing mode selecting which of an input's three DSP configs is
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Direct,
    Eq,
    EqAlt,
}

impl InputMode {
    /// Index of this mode's slot in an input's config list.
    pub fn slot(self) -> usize {
        match self {
            InputMode::Direct => 0,
            InputMode::Eq => 1,
            InputMode::EqAlt => 2,
        }
    }

    pub fn from_slot(slot: usize) -> Self {
        match slot {
            1 => InputMode::Eq,
            2 => InputMode::EqAlt,
            _ => InputMode::Direct,
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputMode::Direct => "DIRECT",
            InputMode::Eq => "EQ",
            InputMode::EqAlt => "EQ-ALT",
        };
        f.write_str(name)
    }
}

/// Amplifier state. `active_input` always indexes the configured input
/// list; `volume_db` stays within the clamp range and on the one-decimal
/// grid.
#[derive(Debug, Clone)]
pub struct AmpState {
    pub active_input: usize,
    pub input_mode: InputMode,
    pub volume_db: f32,
    pub dim_sign: i8,
}

impl fmt::Display for AmpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input:{} mode:{} vol:{:.1}dB dim:{}",
            self.active_input, self.input_mode, self.volume_db, self.dim_sign
        )
    }
}

/// Command vocabulary consumed by the control loop.
#[derive(Debug, Clone)]
pub enum ControlCommand {
    ChangeInput(usize),
    NextInput { reverse: bool },
    ChangeMode(InputMode),
    VolumeStep { delta: f32 },
    VolumeDim,
    DisplayToggle,
    GalleryAdvance,
    SongUpdate(TrackInfo),
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("input index {index} out of range ({count} inputs configured)")]
    InvalidIndex { index: usize, count: usize },

    #[error("active dsp config {0:?} does not match any configured input")]
    UnmappedDspConfig(String),

    #[error(transparent)]
    Dsp(#[from] DspError),
}
