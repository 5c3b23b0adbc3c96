//! MIDI transport
//!
//! Ports are resolved by (case-insensitive, substring) name because port
//! ordinals change whenever a device is plugged or unplugged.

use midir::{MidiInput, MidiOutput, MidiOutputConnection};
use std::any::Any;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::TransportError;
use crate::midi::{format_hex, Message};

const CLIENT_NAME: &str = "OBS-MIDI-GW";

/// Open input port; dropping it closes the port and stops callbacks
pub struct InputConnection {
    port: String,
    _guard: Box<dyn Any + Send>,
}

impl InputConnection {
    pub fn new(port: String, guard: impl Any + Send) -> Self {
        Self {
            port,
            _guard: Box::new(guard),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

/// Open output port
pub trait OutputConnection: Send {
    fn port(&self) -> &str;
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Source of MIDI port connections
pub trait Transport: Send + Sync {
    fn input_ports(&self) -> Result<Vec<String>, TransportError>;
    fn output_ports(&self) -> Result<Vec<String>, TransportError>;

    /// Open `port` and forward every parsed message into `tx`
    fn open_input(&self, port: &str, tx: mpsc::Sender<Message>) -> Result<InputConnection, TransportError>;

    fn open_output(&self, port: &str) -> Result<Box<dyn OutputConnection>, TransportError>;
}

/// midir backed transport
#[derive(Debug, Default, Clone, Copy)]
pub struct MidirTransport;

impl MidirTransport {
    pub fn new() -> Self {
        Self
    }
}

fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

struct MidirOutput {
    port: String,
    conn: MidiOutputConnection,
}

impl OutputConnection for MidirOutput {
    fn port(&self) -> &str {
        &self.port
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        trace!("MIDI out {}: {}", self.port, format_hex(bytes));
        self.conn
            .send(bytes)
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Transport for MidirTransport {
    fn input_ports(&self) -> Result<Vec<String>, TransportError> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        let midi_out = MidiOutput::new(&format!("{}-Scanner", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    fn open_input(&self, pattern: &str, tx: mpsc::Sender<Message>) -> Result<InputConnection, TransportError> {
        let midi_in = MidiInput::new(&format!("{}-Input", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;

        let (port, name) = midi_in
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_in.port_name(&port).ok()?;
                port_matches(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        debug!("Found input port '{}' matching '{}'", name, pattern);

        let port_name = name.clone();
        let conn = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| match Message::parse(data, &port_name) {
                    Some(message) => {
                        // Never block the MIDI thread
                        if tx.try_send(message).is_err() {
                            debug!("Inbound queue full or closed, dropping {}", format_hex(data));
                        }
                    }
                    None => trace!("Ignoring MIDI {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| TransportError::Connect {
                port: name.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened MIDI input '{}'", name);
        Ok(InputConnection::new(name, conn))
    }

    fn open_output(&self, pattern: &str) -> Result<Box<dyn OutputConnection>, TransportError> {
        let midi_out = MidiOutput::new(&format!("{}-Output", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;

        let (port, name) = midi_out
            .ports()
            .into_iter()
            .find_map(|port| {
                let name = midi_out.port_name(&port).ok()?;
                port_matches(&name, pattern).then_some((port, name))
            })
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| TransportError::Connect {
                port: name.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened MIDI output '{}'", name);
        Ok(Box::new(MidirOutput { port: name, conn }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_matching_is_case_insensitive_substring() {
        assert!(port_matches("X-Touch MINI 1", "x-touch mini"));
        assert!(port_matches("nanoKONTROL2 SLIDER/KNOB", "nanoKONTROL2"));
        assert!(!port_matches("LoopBe Internal MIDI", "X-Touch"));
    }

    #[test]
    fn test_input_connection_keeps_port_name() {
        let conn = InputConnection::new("Surface".to_string(), ());
        assert_eq!(conn.port(), "Surface");
    }
}
