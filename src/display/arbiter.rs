//! Durable/overlay sequencing and the panel render loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::display::{DisplayContent, DisplaySink};

struct ArbiterState {
    /// Last durable content; what overlays revert to.
    base: Option<DisplayContent>,
    /// At most one scheduled revert is live at any time.
    revert: Option<CancellationToken>,
}

/// Sequences durable content and self-reverting overlays onto the frame
/// queue consumed by [`run_render_loop`].
#[derive(Clone)]
pub struct DisplayArbiter {
    state: Arc<Mutex<ArbiterState>>,
    frame_tx: mpsc::Sender<DisplayContent>,
}

impl DisplayArbiter {
    pub fn new(frame_tx: mpsc::Sender<DisplayContent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ArbiterState {
                base: None,
                revert: None,
            })),
            frame_tx,
        }
    }

    /// Replaces the durable base and shows it. Cancels any pending revert:
    /// an overlay superseded by durable content must not restore a stale
    /// snapshot later.
    pub async fn put(&self, content: DisplayContent) {
        let mut state = self.state.lock().await;
        if let Some(revert) = state.revert.take() {
            revert.cancel();
        }
        state.base = Some(content.clone());
        self.enqueue(content).await;
    }

    /// Shows an overlay and schedules a revert to whatever the durable
    /// base is once `revert_after` elapses. Scheduling cancels the
    /// previous revert first, so overlays never stack.
    pub async fn put_temporary(&self, content: DisplayContent, revert_after: Duration) {
        let mut state = self.state.lock().await;
        if let Some(revert) = state.revert.take() {
            revert.cancel();
        }
        self.enqueue(content).await;

        let token = CancellationToken::new();
        state.revert = Some(token.clone());

        let shared = Arc::clone(&self.state);
        let frame_tx = self.frame_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(revert_after) => {
                    // Cancellation happens under the state lock, so
                    // re-checking under the same lock closes the race with
                    // a put arriving right as the timer fires.
                    let base = {
                        let mut state = shared.lock().await;
                        if token.is_cancelled() {
                            None
                        } else {
                            state.revert = None;
                            state.base.clone()
                        }
                    };
                    if let Some(base) = base {
                        debug!("overlay expired, restoring base content");
                        if frame_tx.send(base).await.is_err() {
                            debug!("frame queue closed, revert dropped");
                        }
                    }
                }
            }
        });
    }

    async fn enqueue(&self, content: DisplayContent) {
        if self.frame_tx.send(content).await.is_err() {
            debug!("frame queue closed, frame dropped");
        }
    }
}

/// Drains the frame queue into the sink.
///
/// Coalesces: when several frames are queued, only the newest is drawn.
/// Blanks the panel after `idle_timeout` without frames.
pub async fn run_render_loop(
    mut frames: mpsc::Receiver<DisplayContent>,
    mut sink: Box<dyn DisplaySink>,
    idle_timeout: Duration,
) {
    info!("render loop started");
    loop {
        match tokio::time::timeout(idle_timeout, frames.recv()).await {
            Ok(Some(mut frame)) => {
                while let Ok(newer) = frames.try_recv() {
                    frame = newer;
                }
                if let Err(e) = sink.render(&frame) {
                    error!("render failed: {e}");
                }
            }
            Ok(None) => {
                info!("frame queue closed, render loop stopping");
                break;
            }
            Err(_) => {
                debug!("display idle, blanking");
                if let Err(e) = sink.blank() {
                    error!("blank failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::InputMode;
    use std::sync::Mutex as StdMutex;

    fn status(name: &str) -> DisplayContent {
        DisplayContent::InputStatus {
            input: name.to_string(),
            mode: InputMode::Direct,
        }
    }

    fn volume(db: f32) -> DisplayContent {
        DisplayContent::Volume { db }
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_reverts_to_base_after_delay() {
        let (frame_tx, mut frames) = mpsc::channel(16);
        let arbiter = DisplayArbiter::new(frame_tx);

        arbiter.put(status("TV")).await;
        arbiter
            .put_temporary(volume(-37.0), Duration::from_secs(2))
            .await;
        // Let the revert task arm its timer before advancing the clock.
        tokio::task::yield_now().await;
        assert_eq!(frames.recv().await, Some(status("TV")));
        assert_eq!(frames.recv().await, Some(volume(-37.0)));

        tokio::time::advance(Duration::from_millis(2001)).await;
        assert_eq!(frames.recv().await, Some(status("TV")));
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_overlay_cancels_the_earlier_revert() {
        let (frame_tx, mut frames) = mpsc::channel(16);
        let arbiter = DisplayArbiter::new(frame_tx);

        arbiter.put(status("TV")).await;
        arbiter
            .put_temporary(volume(-40.0), Duration::from_secs(2))
            .await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        arbiter
            .put_temporary(volume(-39.0), Duration::from_secs(2))
            .await;
        tokio::task::yield_now().await;

        assert_eq!(frames.recv().await, Some(status("TV")));
        assert_eq!(frames.recv().await, Some(volume(-40.0)));
        assert_eq!(frames.recv().await, Some(volume(-39.0)));

        // The first revert would have fired at +2.0s; only the second one
        // does, at +2.5s.
        tokio::time::advance(Duration::from_millis(1600)).await;
        assert!(frames.try_recv().is_err());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(frames.recv().await, Some(status("TV")));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn durable_put_cancels_pending_revert() {
        let (frame_tx, mut frames) = mpsc::channel(16);
        let arbiter = DisplayArbiter::new(frame_tx);

        arbiter.put(status("TV")).await;
        arbiter
            .put_temporary(volume(-40.0), Duration::from_secs(2))
            .await;
        tokio::task::yield_now().await;
        // Durable replacement cancels the overlay's revert outright.
        arbiter.put(status("Phono")).await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(frames.recv().await, Some(status("TV")));
        assert_eq!(frames.recv().await, Some(volume(-40.0)));
        assert_eq!(frames.recv().await, Some(status("Phono")));
        assert!(frames.try_recv().is_err());
    }

    struct RecordingSink {
        rendered: Arc<StdMutex<Vec<DisplayContent>>>,
        blanks: Arc<StdMutex<usize>>,
    }

    impl DisplaySink for RecordingSink {
        fn render(&mut self, content: &DisplayContent) -> Result<(), crate::display::SinkError> {
            self.rendered.lock().unwrap().push(content.clone());
            Ok(())
        }

        fn blank(&mut self) -> Result<(), crate::display::SinkError> {
            *self.blanks.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn render_loop_coalesces_queued_frames() {
        let (frame_tx, frames) = mpsc::channel(16);
        let rendered = Arc::new(StdMutex::new(Vec::new()));
        let blanks = Arc::new(StdMutex::new(0));
        let sink = Box::new(RecordingSink {
            rendered: Arc::clone(&rendered),
            blanks: Arc::clone(&blanks),
        });

        // All three frames are queued before the loop gets to run, so the
        // two stale ones must never reach the sink.
        frame_tx.send(volume(-40.0)).await.unwrap();
        frame_tx.send(volume(-39.0)).await.unwrap();
        frame_tx.send(volume(-38.0)).await.unwrap();
        drop(frame_tx);

        run_render_loop(frames, sink, Duration::from_secs(600)).await;
        assert_eq!(rendered.lock().unwrap().clone(), vec![volume(-38.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn render_loop_blanks_when_idle() {
        let (frame_tx, frames) = mpsc::channel(16);
        let rendered = Arc::new(StdMutex::new(Vec::new()));
        let blanks = Arc::new(StdMutex::new(0));
        let sink = Box::new(RecordingSink {
            rendered: Arc::clone(&rendered),
            blanks: Arc::clone(&blanks),
        });

        let loop_task = tokio::spawn(run_render_loop(
            frames,
            sink,
            Duration::from_secs(600),
        ));
        // Let the loop arm its idle timer before advancing the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(601)).await;
        drop(frame_tx);
        loop_task.await.unwrap();

        assert_eq!(*blanks.lock().unwrap(), 1);
        assert!(rendered.lock().unwrap().is_empty());
    }
}
