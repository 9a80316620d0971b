use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hifipanel::config::Config;
use hifipanel::control::{ControlCore, ControlHandle};
use hifipanel::display::{self, DisplayArbiter, DisplaySink, TermSink};
use hifipanel::dsp::{DryRunDsp, DspControl};
use hifipanel::input::{EncoderHandle, RemoteDispatch, RemoteHandle};
use hifipanel::transport::{DryRunPlayer, MediaPlayer, PollHandle, TransportGate};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    // Display pipeline: arbiter feeds frames, the render loop draws them.
    let (frame_tx, frame_rx) = mpsc::channel(16);
    let arbiter = DisplayArbiter::new(frame_tx);
    let sink: Box<dyn DisplaySink> = Box::new(TermSink {});
    tokio::spawn(display::run_render_loop(
        frame_rx,
        sink,
        Duration::from_secs(config.display.idle_blank_secs),
    ));

    // Control core, seeded from the engine's active config.
    let initial_config = format!("{}{}", config.dsp.configs_path, config.inputs[0].configs[0]);
    let dsp: Box<dyn DspControl> = Box::new(DryRunDsp::new(initial_config));
    let core = ControlCore::new(&config, dsp, arbiter).await?;
    let (control_tx, control_rx) = mpsc::channel(64);
    let _control = ControlHandle::spawn(core, control_rx);

    // Transport gate plus the media poll loop draining it.
    let gate = Arc::new(TransportGate::new());
    let player: Box<dyn MediaPlayer> = Box::new(DryRunPlayer::new());
    let _poll = PollHandle::spawn(
        Arc::clone(&gate),
        player,
        control_tx.clone(),
        Duration::from_millis(config.player.polling_interval_ms),
    );

    // Input sources. Missing hardware is not fatal: the rig keeps running
    // with whichever sources are present.
    let (event_tx, event_rx) = mpsc::channel(64);
    let _encoder = match EncoderHandle::spawn(&config.encoder, event_tx.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("encoder unavailable, continuing without it: {e}");
            None
        }
    };
    let _remote = match RemoteHandle::spawn(&config.remote, event_tx.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("remote unavailable, continuing without it: {e}");
            None
        }
    };

    info!("hifipanel up");
    RemoteDispatch::new(&config.governor, control_tx, gate)
        .run(event_rx)
        .await;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging();
    Ok(())
}

fn setup_logging() {
    let level = match std::env::var("RUST_LOG").as_deref() {
        Ok("trace") => Level::TRACE,
        Ok("debug") => Level::DEBUG,
        Ok("warn") => Level::WARN,
        Ok("error") => Level::ERROR,
        _ => Level::INFO,
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
