//! Routes admitted input events to the control core and the transport gate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::GovernorConfig;
use crate::control::{ControlCommand, InputMode, VOLUME_STEP, VOLUME_STEP_FINE};
use crate::input::governor::{Debounce, TokenBucket};
use crate::input::{RemoteButton, RemoteEvent};
use crate::transport::{TransportGate, TransportOp};

/// What an admitted button press turns into.
#[derive(Debug, Clone)]
enum Action {
    Control(ControlCommand),
    Transport(TransportOp),
}

/// Governor class a button is admitted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateClass {
    /// Repeat-capable volume buttons, token bucket.
    Volume,
    /// Discrete menu buttons, debounce.
    Menu,
    /// Transport buttons, debounce.
    Transport,
}

/// Per-class admission state plus the outbound channels.
pub struct RemoteDispatch {
    volume_gate: TokenBucket,
    menu_gate: Debounce,
    transport_gate: Debounce,
    control_tx: mpsc::Sender<ControlCommand>,
    transport: Arc<TransportGate>,
}

impl RemoteDispatch {
    pub fn new(
        config: &GovernorConfig,
        control_tx: mpsc::Sender<ControlCommand>,
        transport: Arc<TransportGate>,
    ) -> Self {
        let debounce = Duration::from_millis(config.button_debounce_ms);
        Self {
            volume_gate: TokenBucket::new(
                config.volume_bucket_capacity,
                Duration::from_millis(config.volume_bucket_refill_ms),
            ),
            menu_gate: Debounce::new(debounce),
            transport_gate: Debounce::new(debounce),
            control_tx,
            transport,
        }
    }

    /// Consumes the event stream until every source hangs up.
    pub async fn run(mut self, mut events: mpsc::Receiver<RemoteEvent>) {
        info!("remote dispatch started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("input event stream closed, remote dispatch stopping");
    }

    async fn handle(&mut self, event: RemoteEvent) {
        let (action, class) = action_for(event.button);

        let admitted = event.forced
            || match class {
                GateClass::Volume => self.volume_gate.admit(),
                GateClass::Menu => self.menu_gate.admit(),
                GateClass::Transport => self.transport_gate.admit(),
            };
        if !admitted {
            debug!(
                "dropped {:?} from {} ({:?} class throttled)",
                event.button,
                event.timestamp.format("%H:%M:%S%.3f"),
                class
            );
            return;
        }

        match action {
            Action::Control(command) => {
                if let Err(e) = self.control_tx.send(command).await {
                    error!("control command channel closed: {e}");
                }
            }
            Action::Transport(op) => self.transport.request_op(op).await,
        }
    }
}

fn action_for(button: RemoteButton) -> (Action, GateClass) {
    match button {
        RemoteButton::VolumeUp => (
            Action::Control(ControlCommand::VolumeStep { delta: VOLUME_STEP }),
            GateClass::Volume,
        ),
        RemoteButton::VolumeDown => (
            Action::Control(ControlCommand::VolumeStep {
                delta: -VOLUME_STEP,
            }),
            GateClass::Volume,
        ),
        RemoteButton::VolumeUpFine => (
            Action::Control(ControlCommand::VolumeStep {
                delta: VOLUME_STEP_FINE,
            }),
            GateClass::Volume,
        ),
        RemoteButton::VolumeDownFine => (
            Action::Control(ControlCommand::VolumeStep {
                delta: -VOLUME_STEP_FINE,
            }),
            GateClass::Volume,
        ),
        RemoteButton::Dim => (Action::Control(ControlCommand::VolumeDim), GateClass::Menu),
        RemoteButton::InputNext => (
            Action::Control(ControlCommand::NextInput { reverse: false }),
            GateClass::Menu,
        ),
        RemoteButton::InputPrev => (
            Action::Control(ControlCommand::NextInput { reverse: true }),
            GateClass::Menu,
        ),
        RemoteButton::Direct(index) => (
            Action::Control(ControlCommand::ChangeInput(index)),
            GateClass::Menu,
        ),
        RemoteButton::ModeEq => (
            Action::Control(ControlCommand::ChangeMode(InputMode::Eq)),
            GateClass::Menu,
        ),
        RemoteButton::ModeEqAlt => (
            Action::Control(ControlCommand::ChangeMode(InputMode::EqAlt)),
            GateClass::Menu,
        ),
        RemoteButton::DisplayToggle => (
            Action::Control(ControlCommand::DisplayToggle),
            GateClass::Menu,
        ),
        RemoteButton::Gallery => (
            Action::Control(ControlCommand::GalleryAdvance),
            GateClass::Menu,
        ),
        RemoteButton::Play => (Action::Transport(TransportOp::Play), GateClass::Transport),
        RemoteButton::Pause => (Action::Transport(TransportOp::Pause), GateClass::Transport),
        RemoteButton::Stop => (Action::Transport(TransportOp::Stop), GateClass::Transport),
        RemoteButton::TrackNext => (Action::Transport(TransportOp::Next), GateClass::Transport),
        RemoteButton::TrackPrev => (Action::Transport(TransportOp::Prev), GateClass::Transport),
    }
}
