//! The control core and its command loop.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, InputDefinition};
use crate::control::{AmpState, ControlCommand, ControlError, InputMode};
use crate::display::{DisplayArbiter, DisplayContent};
use crate::dsp::DspControl;
use crate::transport::TrackInfo;

pub const MIN_VOLUME: f32 = -80.0;
pub const MAX_VOLUME: f32 = 0.0;
pub const DIM_STEP: f32 = 20.0;

/// Which rendition of the current track the panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackView {
    Info,
    Art,
}

/// Configured gallery images with a wrapping cursor.
struct Gallery {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl Gallery {
    fn new(frames: Vec<PathBuf>) -> Self {
        Self { frames, cursor: 0 }
    }

    fn advance(&mut self) -> Option<PathBuf> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }
}

/// Owns the amplifier state, the DSP handle and the display arbiter.
///
/// Collaborator failures are logged and state is updated regardless: the
/// control loop must not wedge on a flaky engine, and declared state
/// converges on the next successful call.
pub struct ControlCore {
    inputs: Vec<InputDefinition>,
    configs_path: String,
    state: AmpState,
    dsp: Box<dyn DspControl>,
    display: DisplayArbiter,
    revert_delay: Duration,
    last_track: Option<TrackInfo>,
    track_view: TrackView,
    gallery: Gallery,
}

impl ControlCore {
    /// Connects to the engine and seeds state from it: the currently
    /// active config path is reverse-mapped to a configured (input, mode)
    /// pair. No match means the rig configuration is wrong and startup
    /// must not continue.
    pub async fn new(
        config: &Config,
        mut dsp: Box<dyn DspControl>,
        display: DisplayArbiter,
    ) -> Result<Self, ControlError> {
        let active = dsp.active_config_path()?;
        let relative = active
            .strip_prefix(&config.dsp.configs_path)
            .unwrap_or(active.as_str());

        let mut seeded = None;
        'inputs: for (index, input) in config.inputs.iter().enumerate() {
            for (slot, file) in input.configs.iter().enumerate() {
                if relative == file.as_str() {
                    seeded = Some((index, InputMode::from_slot(slot)));
                    break 'inputs;
                }
            }
        }
        let Some((active_input, input_mode)) = seeded else {
            return Err(ControlError::UnmappedDspConfig(active));
        };

        let state = AmpState {
            active_input,
            input_mode,
            volume_db: round_db(config.dsp.initial_volume.clamp(MIN_VOLUME, MAX_VOLUME)),
            dim_sign: 1,
        };
        if let Err(e) = dsp.set_volume(state.volume_db) {
            error!("failed to push initial volume: {e}");
        }
        info!("dsp connected. {state}");

        let core = Self {
            inputs: config.inputs.clone(),
            configs_path: config.dsp.configs_path.clone(),
            state,
            dsp,
            display,
            revert_delay: Duration::from_millis(config.display.revert_delay_ms),
            last_track: None,
            track_view: TrackView::Info,
            gallery: Gallery::new(config.display.gallery.clone()),
        };
        core.display.put(core.input_status()).await;
        Ok(core)
    }

    pub async fn handle(&mut self, command: ControlCommand) -> Result<(), ControlError> {
        debug!("handling {:?}", command);
        match command {
            ControlCommand::ChangeInput(index) => self.change_input(index).await,
            ControlCommand::NextInput { reverse } => self.next_input(reverse).await,
            ControlCommand::ChangeMode(mode) => self.change_input_mode(mode).await,
            ControlCommand::VolumeStep { delta } => self.volume_step(delta, true).await,
            ControlCommand::VolumeDim => self.volume_dim().await,
            ControlCommand::DisplayToggle => self.toggle_track_view().await,
            ControlCommand::GalleryAdvance => self.gallery_advance().await,
            ControlCommand::SongUpdate(track) => self.update_song_state(track).await,
        }
    }

    /// Selecting the already-active mode toggles back to DIRECT.
    pub async fn change_input_mode(&mut self, mode: InputMode) -> Result<(), ControlError> {
        self.state.input_mode = if self.state.input_mode == mode {
            InputMode::Direct
        } else {
            mode
        };
        self.apply_input_state().await;
        Ok(())
    }

    pub async fn change_input(&mut self, index: usize) -> Result<(), ControlError> {
        if index >= self.inputs.len() {
            return Err(ControlError::InvalidIndex {
                index,
                count: self.inputs.len(),
            });
        }
        self.state.active_input = index;
        self.apply_input_state().await;
        Ok(())
    }

    pub async fn next_input(&mut self, reverse: bool) -> Result<(), ControlError> {
        let count = self.inputs.len();
        let step = if reverse { count - 1 } else { 1 };
        self.state.active_input = (self.state.active_input + step) % count;
        self.apply_input_state().await;
        Ok(())
    }

    /// Pushes the (input, mode) config to the engine and refreshes the
    /// durable display content.
    async fn apply_input_state(&mut self) {
        let input = &self.inputs[self.state.active_input];
        let path = format!(
            "{}{}",
            self.configs_path,
            input.configs[self.state.input_mode.slot()]
        );
        info!("apply_input_state. {}. {}", self.state, path);
        if let Err(e) = self.dsp.set_config_path(&path) {
            error!("dsp set_config_path failed: {e}");
        }
        // Reload re-reads the pointer set above, so the order is fixed.
        if let Err(e) = self.dsp.reload() {
            error!("dsp reload failed: {e}");
        }
        let content = self.status_content();
        self.display.put(content).await;
    }

    /// Steps the volume on the one-decimal grid, clamped. A step that the
    /// clamp swallows entirely is a no-op: no engine call, no overlay.
    pub async fn volume_step(&mut self, delta: f32, reset_dim: bool) -> Result<(), ControlError> {
        if reset_dim {
            self.state.dim_sign = 1;
        }
        let next = round_db(self.state.volume_db + delta).clamp(MIN_VOLUME, MAX_VOLUME);
        if next == self.state.volume_db {
            return Ok(());
        }
        info!("volume_step. {next:.1}dB");
        if let Err(e) = self.dsp.set_volume(next) {
            error!("dsp set_volume failed: {e}");
        }
        self.state.volume_db = next;
        self.display
            .put_temporary(DisplayContent::Volume { db: next }, self.revert_delay)
            .await;
        Ok(())
    }

    /// Toggles between dimmed-by-a-fixed-offset and restored.
    pub async fn volume_dim(&mut self) -> Result<(), ControlError> {
        self.state.dim_sign = -self.state.dim_sign;
        let delta = f32::from(self.state.dim_sign) * DIM_STEP;
        info!("volume_dim. {}", self.state.dim_sign);
        self.volume_step(delta, false).await
    }

    pub async fn update_song_state(&mut self, track: TrackInfo) -> Result<(), ControlError> {
        info!("update_song_state. {} - {}", track.artist, track.title);
        self.last_track = Some(track);
        if self.active_is_streamer() {
            let content = self.status_content();
            self.display.put(content).await;
        }
        Ok(())
    }

    async fn toggle_track_view(&mut self) -> Result<(), ControlError> {
        self.track_view = match self.track_view {
            TrackView::Info => TrackView::Art,
            TrackView::Art => TrackView::Info,
        };
        if self.active_is_streamer() && self.last_track.is_some() {
            let content = self.status_content();
            self.display.put(content).await;
        }
        Ok(())
    }

    async fn gallery_advance(&mut self) -> Result<(), ControlError> {
        match self.gallery.advance() {
            Some(path) => {
                self.display
                    .put(DisplayContent::GalleryImage { path })
                    .await;
            }
            None => debug!("no gallery images configured"),
        }
        Ok(())
    }

    fn active_is_streamer(&self) -> bool {
        self.inputs[self.state.active_input].streamer
    }

    /// Durable content for the current state: the streamer input prefers
    /// track content when a track is known.
    fn status_content(&self) -> DisplayContent {
        if self.active_is_streamer() {
            if let Some(track) = &self.last_track {
                return self.track_content(track);
            }
        }
        self.input_status()
    }

    fn input_status(&self) -> DisplayContent {
        DisplayContent::InputStatus {
            input: self.inputs[self.state.active_input].name.clone(),
            mode: self.state.input_mode,
        }
    }

    fn track_content(&self, track: &TrackInfo) -> DisplayContent {
        match self.track_view {
            TrackView::Art => match &track.image_url {
                Some(url) => DisplayContent::AlbumArt { url: url.clone() },
                None => DisplayContent::NowPlaying {
                    track: track.clone(),
                },
            },
            TrackView::Info => DisplayContent::NowPlaying {
                track: track.clone(),
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &AmpState {
        &self.state
    }
}

fn round_db(db: f32) -> f32 {
    (db * 10.0).round() / 10.0
}

/// Runs the control loop in a background task.
pub struct ControlHandle {}

impl ControlHandle {
    pub fn spawn(mut core: ControlCore, mut commands: mpsc::Receiver<ControlCommand>) -> Self {
        tokio::spawn(async move {
            info!("control loop started");
            while let Some(command) = commands.recv().await {
                // Handlers run to completion before the next command is
                // accepted; apply_input_state depends on the mutation
                // right before it.
                if let Err(e) = core.handle(command).await {
                    warn!("command rejected: {e}");
                }
            }
            info!("control command channel closed, control loop stopping");
        });
        Self {}
    }
}
