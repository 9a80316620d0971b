//! Rotary encoder decoding and GPIO binding.
//!
//! The decoder turns the encoder's two phase-offset edge streams into
//! discrete up/down ticks by matching a rolling 4-symbol window against the
//! cyclic rotations of a reference sequence. Matching the whole window
//! instead of a single phase pair rejects bounce-induced false ticks; the
//! GPIO layer additionally runs a hardware glitch filter so sub-threshold
//! spikes never reach the decoder.

use std::time::Duration;

use rppal::gpio::{Event as GpioEvent, Gpio, InputPin, Trigger};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::input::{RemoteButton, RemoteEvent};

const SEQ_LENGTH: usize = 4;

// Rotations of the clockwise reference sequence and its mirror. A full
// detent emits four edges; matching any rotation tolerates the window
// starting mid-detent.
const SEQUENCE_UP: [&str; 4] = ["CdcD", "dcDC", "cDCd", "DCdc"];
const SEQUENCE_DOWN: [&str; 4] = ["CDcd", "DcdC", "cdCD", "dCDc"];

/// Encoder phase line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderChannel {
    A,
    B,
}

/// Edge direction after the glitch filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// One detected detent of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Up,
    Down,
}

/// Decodes quadrature edges into ticks.
///
/// Each (channel, edge) pair maps to one symbol: channel A emits `d`/`D`,
/// channel B emits `c`/`C`, lowercase on falling edges. The window starts
/// empty and only full windows ending in a rising edge are matched, so a
/// truncated or noisy transition emits nothing.
#[derive(Debug, Default)]
pub struct QuadratureDecoder {
    window: String,
}

impl QuadratureDecoder {
    pub fn new() -> Self {
        Self {
            window: String::with_capacity(SEQ_LENGTH * 2),
        }
    }

    pub fn on_edge(&mut self, channel: EncoderChannel, edge: Edge) -> Option<Tick> {
        let symbol = match (channel, edge) {
            (EncoderChannel::A, Edge::Falling) => 'd',
            (EncoderChannel::A, Edge::Rising) => 'D',
            (EncoderChannel::B, Edge::Falling) => 'c',
            (EncoderChannel::B, Edge::Rising) => 'C',
        };
        self.window.push(symbol);
        if self.window.len() > SEQ_LENGTH {
            let excess = self.window.len() - SEQ_LENGTH;
            self.window.drain(..excess);
        }

        if edge != Edge::Rising || self.window.len() < SEQ_LENGTH {
            return None;
        }
        if SEQUENCE_UP.contains(&self.window.as_str()) {
            Some(Tick::Up)
        } else if SEQUENCE_DOWN.contains(&self.window.as_str()) {
            Some(Tick::Down)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("gpio setup failed: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

enum EdgeSignal {
    Rotary(EncoderChannel, Trigger),
    Switch,
}

/// Owns the encoder GPIO pins and the decode task.
///
/// Rotation ticks become forced fine volume events: the mechanical detent
/// rate already bounds their frequency, so they bypass the governor. The
/// push switch goes through normal admission like any other button.
pub struct EncoderHandle {
    _pins: Vec<InputPin>,
}

impl EncoderHandle {
    pub fn spawn(
        config: &EncoderConfig,
        events: mpsc::Sender<RemoteEvent>,
    ) -> Result<Self, EncoderError> {
        let gpio = Gpio::new()?;
        let glitch_filter = Some(Duration::from_micros(config.glitch_filter_us));
        let (edge_tx, edge_rx) = mpsc::unbounded_channel();

        let mut pin_a = gpio.get(config.pin_a)?.into_input_pullup();
        let tx = edge_tx.clone();
        pin_a.set_async_interrupt(Trigger::Both, glitch_filter, move |event: GpioEvent| {
            let _ = tx.send(EdgeSignal::Rotary(EncoderChannel::A, event.trigger));
        })?;

        let mut pin_b = gpio.get(config.pin_b)?.into_input_pullup();
        let tx = edge_tx.clone();
        pin_b.set_async_interrupt(Trigger::Both, glitch_filter, move |event: GpioEvent| {
            let _ = tx.send(EdgeSignal::Rotary(EncoderChannel::B, event.trigger));
        })?;

        let mut pin_sw = gpio.get(config.pin_sw)?.into_input_pullup();
        pin_sw.set_async_interrupt(Trigger::FallingEdge, glitch_filter, move |_| {
            let _ = edge_tx.send(EdgeSignal::Switch);
        })?;

        info!(
            "encoder bound to gpio a={} b={} sw={}",
            config.pin_a, config.pin_b, config.pin_sw
        );
        tokio::spawn(decode_loop(edge_rx, events));

        Ok(Self {
            _pins: vec![pin_a, pin_b, pin_sw],
        })
    }
}

async fn decode_loop(
    mut edges: mpsc::UnboundedReceiver<EdgeSignal>,
    events: mpsc::Sender<RemoteEvent>,
) {
    let mut decoder = QuadratureDecoder::new();

    while let Some(signal) = edges.recv().await {
        let event = match signal {
            EdgeSignal::Rotary(channel, trigger) => {
                let edge = match trigger {
                    Trigger::RisingEdge => Edge::Rising,
                    Trigger::FallingEdge => Edge::Falling,
                    _ => continue,
                };
                match decoder.on_edge(channel, edge) {
                    Some(Tick::Up) => RemoteEvent::forced(RemoteButton::VolumeUpFine),
                    Some(Tick::Down) => RemoteEvent::forced(RemoteButton::VolumeDownFine),
                    None => continue,
                }
            }
            EdgeSignal::Switch => {
                debug!("encoder switch pressed");
                RemoteEvent::new(RemoteButton::DisplayToggle)
            }
        };
        if events.send(event).await.is_err() {
            warn!("input event channel closed, stopping encoder decode loop");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Clockwise from idle-high: A falls, B falls, A rises, B rises.
    const CLOCKWISE: [(EncoderChannel, Edge); 4] = [
        (EncoderChannel::A, Edge::Falling),
        (EncoderChannel::B, Edge::Falling),
        (EncoderChannel::A, Edge::Rising),
        (EncoderChannel::B, Edge::Rising),
    ];
    const COUNTER_CLOCKWISE: [(EncoderChannel, Edge); 4] = [
        (EncoderChannel::B, Edge::Falling),
        (EncoderChannel::A, Edge::Falling),
        (EncoderChannel::B, Edge::Rising),
        (EncoderChannel::A, Edge::Rising),
    ];

    fn feed(decoder: &mut QuadratureDecoder, edges: &[(EncoderChannel, Edge)]) -> Vec<Tick> {
        edges
            .iter()
            .filter_map(|&(channel, edge)| decoder.on_edge(channel, edge))
            .collect()
    }

    #[test]
    fn clockwise_detent_emits_one_up_tick() {
        let mut decoder = QuadratureDecoder::new();
        assert_eq!(feed(&mut decoder, &CLOCKWISE), vec![Tick::Up]);
    }

    #[test]
    fn counter_clockwise_detent_emits_one_down_tick() {
        let mut decoder = QuadratureDecoder::new();
        assert_eq!(feed(&mut decoder, &COUNTER_CLOCKWISE), vec![Tick::Down]);
    }

    #[test]
    fn truncated_detent_emits_nothing() {
        let mut decoder = QuadratureDecoder::new();
        assert!(feed(&mut decoder, &CLOCKWISE[..2]).is_empty());
    }

    #[test]
    fn interrupted_detent_emits_nothing() {
        let mut decoder = QuadratureDecoder::new();
        // Bounce in the middle of a clockwise detent breaks the window.
        let noisy = [
            CLOCKWISE[0],
            CLOCKWISE[1],
            (EncoderChannel::B, Edge::Rising),
            CLOCKWISE[2],
            CLOCKWISE[3],
        ];
        assert!(feed(&mut decoder, &noisy).is_empty());
    }
}
