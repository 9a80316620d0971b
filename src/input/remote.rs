//! IR remote event source.
//!
//! The IR receiver shows up as a Linux input device (the kernel decodes
//! scancodes into key events), so the reader is a thin evdev stream mapped
//! onto the [`RemoteButton`] vocabulary. Key repeats are forwarded as
//! presses; the governor decides what survives.

use std::io;

use evdev::{Device, InputEventKind, Key};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::RemoteConfig;
use crate::input::{RemoteButton, RemoteEvent};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to open remote input device: {0}")]
    Device(#[from] io::Error),
}

/// Owns the remote reader task.
pub struct RemoteHandle {}

impl RemoteHandle {
    pub fn spawn(
        config: &RemoteConfig,
        events: mpsc::Sender<RemoteEvent>,
    ) -> Result<Self, RemoteError> {
        let device = Device::open(&config.device)?;
        info!(
            "opened remote input device {} ({})",
            config.device.display(),
            device.name().unwrap_or("unnamed")
        );
        let mut stream = device.into_event_stream()?;

        tokio::spawn(async move {
            loop {
                let event = match stream.next_event().await {
                    Ok(event) => event,
                    Err(e) => {
                        error!("remote device read failed: {e}");
                        break;
                    }
                };
                // value 1 is a press, 2 a key repeat while held.
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };
                if event.value() != 1 && event.value() != 2 {
                    continue;
                }
                let Some(button) = button_for(key) else {
                    debug!("unmapped remote key {:?}", key);
                    continue;
                };
                if events.send(RemoteEvent::new(button)).await.is_err() {
                    warn!("input event channel closed, stopping remote reader");
                    break;
                }
            }
        });

        Ok(Self {})
    }
}

fn button_for(key: Key) -> Option<RemoteButton> {
    let button = match key {
        Key::KEY_VOLUMEUP => RemoteButton::VolumeUp,
        Key::KEY_VOLUMEDOWN => RemoteButton::VolumeDown,
        Key::KEY_UP => RemoteButton::VolumeUpFine,
        Key::KEY_DOWN => RemoteButton::VolumeDownFine,
        Key::KEY_MUTE => RemoteButton::Dim,
        Key::KEY_CHANNELUP => RemoteButton::InputNext,
        Key::KEY_CHANNELDOWN => RemoteButton::InputPrev,
        Key::KEY_1 => RemoteButton::Direct(0),
        Key::KEY_2 => RemoteButton::Direct(1),
        Key::KEY_3 => RemoteButton::Direct(2),
        Key::KEY_4 => RemoteButton::Direct(3),
        Key::KEY_5 => RemoteButton::Direct(4),
        Key::KEY_RED => RemoteButton::ModeEq,
        Key::KEY_GREEN => RemoteButton::ModeEqAlt,
        Key::KEY_INFO => RemoteButton::DisplayToggle,
        Key::KEY_BLUE => RemoteButton::Gallery,
        Key::KEY_PLAY | Key::KEY_PLAYPAUSE => RemoteButton::Play,
        Key::KEY_PAUSE => RemoteButton::Pause,
        Key::KEY_STOP | Key::KEY_STOPCD => RemoteButton::Stop,
        Key::KEY_NEXTSONG => RemoteButton::TrackNext,
        Key::KEY_PREVIOUSSONG => RemoteButton::TrackPrev,
        _ => return None,
    };
    Some(button)
}
