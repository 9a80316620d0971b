//! DSP engine collaborator contract.
//!
//! The routing/volume engine is driven through a small config-path
//! protocol: point it at a config file, tell it to reload, push the main
//! volume. Calls are fire-and-forget; the control core never waits for an
//! acknowledgment and logs failures instead of unwinding.

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum DspError {
    #[error("dsp connection failed: {0}")]
    Connection(String),

    #[error("dsp rejected command: {0}")]
    Rejected(String),
}

/// Control surface of the routing/volume engine.
///
/// `reload` re-reads whatever config path was most recently set, so the
/// path must be updated before reload is issued.
pub trait DspControl: Send {
    fn active_config_path(&mut self) -> Result<String, DspError>;

    fn set_config_path(&mut self, path: &str) -> Result<(), DspError>;

    fn reload(&mut self) -> Result<(), DspError>;

    fn set_volume(&mut self, db: f32) -> Result<(), DspError>;
}

/// Log-backed stand-in for running without the engine attached.
///
/// Keeps the config pointer and volume so the rest of the system behaves
/// exactly as it would against the real engine.
// TODO: replace with the CamillaDSP websocket client.
pub struct DryRunDsp {
    config_path: String,
    volume: f32,
}

impl DryRunDsp {
    pub fn new(initial_config: String) -> Self {
        Self {
            config_path: initial_config,
            volume: 0.0,
        }
    }
}

impl DspControl for DryRunDsp {
    fn active_config_path(&mut self) -> Result<String, DspError> {
        Ok(self.config_path.clone())
    }

    fn set_config_path(&mut self, path: &str) -> Result<(), DspError> {
        info!("dsp config -> {path}");
        self.config_path = path.to_string();
        Ok(())
    }

    fn reload(&mut self) -> Result<(), DspError> {
        info!("dsp reload");
        Ok(())
    }

    fn set_volume(&mut self, db: f32) -> Result<(), DspError> {
        info!("dsp volume {:.1} -> {:.1} dB", self.volume, db);
        self.volume = db;
        Ok(())
    }
}
