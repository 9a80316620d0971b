//! Input subsystem: event sources, admission control, command routing.
//!
//! Two hardware sources feed one stream of [`RemoteEvent`]s:
//!
//! ```text
//! IR remote (evdev) ──┐
//!                     ├──► RemoteDispatch ──► governor ──► ControlCore
//! encoder (gpio) ─────┘                          │
//!                                                └──► TransportGate
//! ```
//!
//! The dispatcher gates each event through the governor class configured
//! for its button, then forwards it either as a control command or as a
//! transport request. Encoder rotation arrives pre-limited by the detent
//! mechanism and is marked `forced`, which bypasses admission.

pub mod dispatch;
pub mod encoder;
pub mod governor;
pub mod remote;

pub use dispatch::RemoteDispatch;
pub use encoder::{EncoderHandle, QuadratureDecoder, Tick};
pub use governor::{Debounce, TokenBucket};
pub use remote::RemoteHandle;

use chrono::{DateTime, Local};

/// The bounded button vocabulary both event sources produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteButton {
    VolumeUp,
    VolumeDown,
    VolumeUpFine,
    VolumeDownFine,
    Dim,
    InputNext,
    InputPrev,
    /// Direct input selection, zero-based.
    Direct(usize),
    ModeEq,
    ModeEqAlt,
    DisplayToggle,
    Gallery,
    Play,
    Pause,
    Stop,
    TrackNext,
    TrackPrev,
}

/// A raw input event, stamped at the source.
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub button: RemoteButton,
    /// Forced events bypass the governor entirely.
    pub forced: bool,
    pub timestamp: DateTime<Local>,
}

impl RemoteEvent {
    pub fn new(button: RemoteButton) -> Self {
        Self {
            button,
            forced: false,
            timestamp: Local::now(),
        }
    }

    pub fn forced(button: RemoteButton) -> Self {
        Self {
            button,
            forced: true,
            timestamp: Local::now(),
        }
    }
}
