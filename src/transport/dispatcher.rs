//! The single-flight gate and the poll cycle state machine.

use std::sync::Arc;
use std::time::Duration;

use statum::{machine, state};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::control::ControlCommand;
use crate::transport::{MediaPlayer, TrackInfo, TransportOp};

/// One-slot mailbox with first-writer-wins semantics.
///
/// The slot stays occupied from request until the drain finishes handling,
/// so duplicates arriving during the wait *and* during handling are
/// dropped. A mailbox plus [`Notify`] instead of a bare flag: a request
/// landing between two waits leaves a stored permit, so no wakeup is lost.
pub struct TransportGate {
    slot: Mutex<Option<TransportOp>>,
    signal: Notify,
}

impl TransportGate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            signal: Notify::new(),
        }
    }

    /// Records the op unless one is already pending. Duplicates are
    /// dropped silently; the first request wins until it is drained.
    pub async fn request_op(&self, op: TransportOp) {
        let mut slot = self.slot.lock().await;
        if let Some(pending) = *slot {
            debug!("transport busy ({pending:?} pending), dropping {op:?}");
            return;
        }
        *slot = Some(op);
        self.signal.notify_one();
    }

    /// Waits up to `timeout` for a request. The slot is left occupied;
    /// the caller clears it after handling.
    async fn wait(&self, timeout: Duration) -> Option<TransportOp> {
        match tokio::time::timeout(timeout, self.signal.notified()).await {
            Err(_) => None,
            Ok(()) => *self.slot.lock().await,
        }
    }

    async fn clear(&self) {
        *self.slot.lock().await = None;
    }

    #[cfg(test)]
    pub async fn pending(&self) -> Option<TransportOp> {
        *self.slot.lock().await
    }
}

impl Default for TransportGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Op carried from the wait into the drain stage.
#[derive(Debug, Clone)]
pub struct DrainCycle {
    op: Option<TransportOp>,
}

/// Poll cycle states.
#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Waiting,
    Draining(DrainCycle),
    Refreshing,
}

/// One polling period: wait on the gate with a receive-timeout, issue at
/// most one player call, then refresh track metadata. Both halves finish
/// within the period, so transport latency and track-change latency share
/// the same bound.
#[machine]
pub struct PollMachine<S: PollState> {
    gate: Arc<TransportGate>,
    player: Box<dyn MediaPlayer>,
    control_tx: mpsc::Sender<ControlCommand>,
    interval: Duration,
    last_track: Option<TrackInfo>,
}

impl PollMachine<Waiting> {
    pub fn create(
        gate: Arc<TransportGate>,
        player: Box<dyn MediaPlayer>,
        control_tx: mpsc::Sender<ControlCommand>,
        interval: Duration,
    ) -> Self {
        Self::new(gate, player, control_tx, interval, None)
    }

    pub async fn await_request(self) -> PollMachine<Draining> {
        let op = self.gate.wait(self.interval).await;
        self.transition_with(DrainCycle { op })
    }
}

impl PollMachine<Draining> {
    /// Issues the pending op, if any. The slot is cleared whatever the
    /// outcome; a failed command is not retried.
    pub async fn drain(mut self) -> PollMachine<Refreshing> {
        let op = self.get_state_data().and_then(|cycle| cycle.op);
        if let Some(op) = op {
            self.issue(op);
            self.gate.clear().await;
        }
        self.transition()
    }

    fn issue(&mut self, op: TransportOp) {
        let result = match op {
            TransportOp::Prev => match &self.last_track {
                Some(track) if track.current_index == 0 => {
                    debug!("already at the first track, ignoring prev");
                    Ok(())
                }
                _ => self.player.seek_relative(-1),
            },
            TransportOp::Next => match &self.last_track {
                Some(track) if track.current_index + 1 >= track.playlist_length => {
                    debug!("already at the last track, ignoring next");
                    Ok(())
                }
                _ => self.player.seek_relative(1),
            },
            TransportOp::Play => self.player.play(),
            TransportOp::Pause => self.player.pause(),
            TransportOp::Stop => self.player.stop(),
        };
        if let Err(e) = result {
            error!("transport command {op:?} failed: {e}");
        }
    }
}

impl PollMachine<Refreshing> {
    /// Polls track metadata and forwards a change of (album, artist,
    /// title) to the control core.
    pub async fn refresh(mut self) -> PollMachine<Waiting> {
        match self.player.update() {
            Ok(track) => {
                let changed = self
                    .last_track
                    .as_ref()
                    .is_none_or(|known| !known.same_track(&track));
                if changed {
                    info!("track changed: {} - {}", track.artist, track.title);
                    if let Err(e) = self
                        .control_tx
                        .send(ControlCommand::SongUpdate(track.clone()))
                        .await
                    {
                        error!("control command channel closed: {e}");
                    }
                }
                self.last_track = Some(track);
            }
            Err(e) => warn!("player poll failed: {e}"),
        }
        self.transition()
    }
}

/// Runs the poll machine in a background task.
pub struct PollHandle {}

impl PollHandle {
    pub fn spawn(
        gate: Arc<TransportGate>,
        player: Box<dyn MediaPlayer>,
        control_tx: mpsc::Sender<ControlCommand>,
        interval: Duration,
    ) -> Self {
        info!("starting media poll loop with {interval:?} interval");
        let mut machine = PollMachine::create(gate, player, control_tx, interval);
        tokio::spawn(async move {
            loop {
                machine = machine.await_request().await.drain().await.refresh().await;
            }
        });
        Self {}
    }
}
