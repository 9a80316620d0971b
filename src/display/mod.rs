//! Display arbitration for the status panel.
//!
//! The arbiter decides *what* the panel shows and *when*; it never
//! interprets the content itself. Durable content (`put`) sticks until
//! replaced, overlays (`put_temporary`) revert to the durable base after a
//! delay unless something newer supersedes them:
//!
//! ```text
//! ControlCore ──put/put_temporary──► DisplayArbiter ──frames──► render loop ──► DisplaySink
//!                                        │
//!                                  single revert timer
//! ```
//!
//! The render loop is the only consumer. It coalesces queued frames so a
//! burst of updates only draws the newest one, and blanks the panel after
//! a long idle window.

pub mod arbiter;

pub use arbiter::{run_render_loop, DisplayArbiter};

use std::path::PathBuf;

use tracing::info;

use crate::control::InputMode;
use crate::transport::TrackInfo;

/// Everything the panel can show. The arbiter treats these as opaque; only
/// the sink gives them a visual shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayContent {
    InputStatus { input: String, mode: InputMode },
    Volume { db: f32 },
    NowPlaying { track: TrackInfo },
    AlbumArt { url: String },
    GalleryImage { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("display transfer failed: {0}")]
    Transfer(String),
}

/// Panel output driver. The real panel lives behind SPI; [`TermSink`]
/// stands in when the rig is not attached.
pub trait DisplaySink: Send {
    fn render(&mut self, content: &DisplayContent) -> Result<(), SinkError>;

    fn blank(&mut self) -> Result<(), SinkError>;
}

/// Renders frames as log lines. Useful on a dev box without the panel.
pub struct TermSink {}

impl DisplaySink for TermSink {
    fn render(&mut self, content: &DisplayContent) -> Result<(), SinkError> {
        match content {
            DisplayContent::InputStatus { input, mode } => {
                info!("[panel] input {input} ({mode})");
            }
            DisplayContent::Volume { db } => info!("[panel] {db:.1} dB"),
            DisplayContent::NowPlaying { track } => {
                info!(
                    "[panel] {} / {} / {}{}",
                    track.artist,
                    track.title,
                    track.album,
                    track
                        .samplerate
                        .as_deref()
                        .map(|rate| format!(" ({rate})"))
                        .unwrap_or_default()
                );
            }
            DisplayContent::AlbumArt { url } => info!("[panel] album art {url}"),
            DisplayContent::GalleryImage { path } => {
                info!("[panel] gallery {}", path.display());
            }
        }
        Ok(())
    }

    fn blank(&mut self) -> Result<(), SinkError> {
        info!("[panel] blank");
        Ok(())
    }
}
