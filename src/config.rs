//! Startup configuration.
//!
//! Everything tunable lives in one toml file loaded once at startup and
//! passed by reference into the subsystem constructors. There is no
//! process-wide mutable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no inputs configured")]
    NoInputs,

    #[error("polling interval must be greater than zero")]
    ZeroPollingInterval,
}

/// One selectable input with its three per-mode DSP configs
/// (DIRECT, EQ, EQ-ALT in that order).
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct InputDefinition {
    pub name: String,
    pub configs: [String; 3],
    /// The streamer input prefers track display over input status.
    #[serde(default)]
    pub streamer: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DspConfig {
    /// Directory prefix the engine's config files live under. The active
    /// path is reverse-mapped against this prefix at startup.
    pub configs_path: String,
    /// Volume pushed to the engine on connect, in dB.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
}

fn default_initial_volume() -> f32 {
    -40.0
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PlayerConfig {
    pub polling_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct GovernorConfig {
    /// Minimum spacing for discrete buttons.
    pub button_debounce_ms: u64,
    /// Burst headroom for held volume buttons.
    pub volume_bucket_capacity: u32,
    /// Period over which a full bucket refills.
    pub volume_bucket_refill_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            button_debounce_ms: 300,
            volume_bucket_capacity: 3,
            volume_bucket_refill_ms: 525,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DisplayConfig {
    /// How long overlays stay up before reverting to durable content.
    pub revert_delay_ms: u64,
    /// Idle window after which the panel blanks.
    pub idle_blank_secs: u64,
    /// Images for the gallery button, shown in order.
    pub gallery: Vec<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            revert_delay_ms: 2000,
            idle_blank_secs: 600,
            gallery: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct EncoderConfig {
    pub pin_a: u8,
    pub pin_b: u8,
    pub pin_sw: u8,
    /// Hardware glitch filter width; edges shorter than this never reach
    /// the decoder.
    pub glitch_filter_us: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            pin_a: 27,
            pin_b: 4,
            pin_sw: 25,
            glitch_filter_us: 300,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct RemoteConfig {
    /// Input device the kernel exposes the IR receiver as.
    pub device: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/input/event0"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub dsp: DspConfig,
    #[serde(rename = "input")]
    pub inputs: Vec<InputDefinition>,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("loading configuration from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        if self.player.polling_interval_ms == 0 {
            return Err(ConfigError::ZeroPollingInterval);
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("hifipanel").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [dsp]
        configs_path = "/home/pi/camilladsp/configs/"

        [[input]]
        name = "TV"
        configs = ["tv.yaml", "tv_eq.yaml", "tv_eq_alt.yaml"]

        [[input]]
        name = "Digital"
        configs = ["dig.yaml", "dig_eq.yaml", "dig_eq_alt.yaml"]
        streamer = true

        [governor]
        button_debounce_ms = 250
    "#;

    #[test]
    fn parses_sample_and_fills_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.inputs.len(), 2);
        assert!(config.inputs[1].streamer);
        assert!(!config.inputs[0].streamer);
        assert_eq!(config.dsp.initial_volume, -40.0);
        assert_eq!(config.governor.button_debounce_ms, 250);
        assert_eq!(config.governor.volume_bucket_capacity, 3);
        assert_eq!(config.player.polling_interval_ms, 1000);
        assert_eq!(config.display.revert_delay_ms, 2000);
        assert_eq!(config.encoder.pin_a, 27);
    }

    #[test]
    fn rejects_empty_input_list() {
        let config: Config = toml::from_str(
            r#"
            [dsp]
            configs_path = "/configs/"
            input = []
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoInputs)));
    }

    #[test]
    fn rejects_zero_polling_interval() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.player.polling_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroPollingInterval)
        ));
    }

    #[test]
    fn rejects_wrong_number_of_mode_configs() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [dsp]
            configs_path = "/configs/"

            [[input]]
            name = "TV"
            configs = ["only.yaml", "two.yaml"]
            "#,
        );
        assert!(result.is_err());
    }
}
