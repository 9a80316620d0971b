//! Media transport: single-flight command dispatch and track polling.
//!
//! Remote transport presses land in a one-slot [`TransportGate`]; the poll
//! machine drains it once per polling interval and refreshes track
//! metadata in the same cycle:
//!
//! ```text
//! RemoteDispatch ──request_op──► TransportGate ─┐
//!                                               ▼
//!                        Waiting ──► Draining ──► Refreshing ──► (repeat)
//!                                      │              │
//!                                  player op     track change ──► ControlCore
//! ```
//!
//! While an op sits in the slot, further requests are dropped, not queued:
//! a stuck player can cost one command, never a backlog of stale ones.

pub mod dispatcher;

pub use dispatcher::{PollHandle, TransportGate};

use tracing::info;

/// The closed transport vocabulary. `drain` matches exhaustively, so an
/// unhandled op cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Prev,
    Next,
    Play,
    Pause,
    Stop,
}

/// Track metadata as reported by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub album: String,
    pub artist: String,
    pub title: String,
    pub image_url: Option<String>,
    pub samplerate: Option<String>,
    pub current_index: usize,
    pub playlist_length: usize,
}

impl TrackInfo {
    /// Change detection compares the identifying fields only; position
    /// and artwork churn must not count as a track change.
    pub fn same_track(&self, other: &TrackInfo) -> bool {
        self.album == other.album && self.artist == other.artist && self.title == other.title
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player request failed: {0}")]
    Request(String),

    #[error("player unavailable: {0}")]
    Unavailable(String),
}

/// Control surface of the network media player.
pub trait MediaPlayer: Send {
    /// Polls current track metadata and playlist position.
    fn update(&mut self) -> Result<TrackInfo, PlayerError>;

    fn play(&mut self) -> Result<(), PlayerError>;

    fn pause(&mut self) -> Result<(), PlayerError>;

    fn stop(&mut self) -> Result<(), PlayerError>;

    /// Moves the playlist cursor by `offset` tracks.
    fn seek_relative(&mut self, offset: i32) -> Result<(), PlayerError>;
}

/// Log-backed stand-in for running without the media server attached.
// TODO: replace with the LMS jsonrpc client.
pub struct DryRunPlayer {
    index: usize,
    length: usize,
}

impl DryRunPlayer {
    pub fn new() -> Self {
        Self {
            index: 0,
            length: 3,
        }
    }
}

impl Default for DryRunPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlayer for DryRunPlayer {
    fn update(&mut self) -> Result<TrackInfo, PlayerError> {
        Ok(TrackInfo {
            album: "No Server".to_string(),
            artist: "Dry Run".to_string(),
            title: format!("Track {}", self.index + 1),
            image_url: None,
            samplerate: Some("44.1k".to_string()),
            current_index: self.index,
            playlist_length: self.length,
        })
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        info!("player play");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        info!("player pause");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlayerError> {
        info!("player stop");
        Ok(())
    }

    fn seek_relative(&mut self, offset: i32) -> Result<(), PlayerError> {
        let next = self.index as i64 + i64::from(offset);
        self.index = next.clamp(0, self.length as i64 - 1) as usize;
        info!("player seek -> track {}", self.index + 1);
        Ok(())
    }
}
