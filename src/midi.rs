//! MIDI message types and value conversions
//!
//! Only the channel voice messages a control surface binds to are modelled:
//! Note On, Note Off and Control Change. Everything else is ignored on input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a bindable MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "Note On", alias = "note_on")]
    NoteOn,
    #[serde(rename = "Note Off", alias = "note_off")]
    NoteOff,
    #[serde(rename = "Control Change", alias = "control_change", alias = "cc")]
    ControlChange,
}

impl MessageKind {
    fn status_nibble(self) -> u8 {
        match self {
            MessageKind::NoteOff => 0x80,
            MessageKind::NoteOn => 0x90,
            MessageKind::ControlChange => 0xB0,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MessageKind::NoteOn => "Note On",
            MessageKind::NoteOff => "Note Off",
            MessageKind::ControlChange => "Control Change",
        };
        f.write_str(label)
    }
}

/// One control surface event, inbound or outbound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    /// Note or controller number (0-127)
    pub index: u8,
    /// Channel (0-15)
    pub channel: u8,
    /// Velocity or controller value (0-127)
    pub value: u8,
    /// Name of the port the message came from or goes to
    pub port: String,
}

impl Message {
    pub fn new(kind: MessageKind, index: u8, channel: u8, value: u8) -> Self {
        Self {
            kind,
            index: index & 0x7F,
            channel: channel & 0x0F,
            value: value & 0x7F,
            port: String::new(),
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Parse raw MIDI bytes received on `port`.
    ///
    /// Note On with velocity 0 is normalized to Note Off. Returns `None` for
    /// anything that is not a Note On/Off or Control Change.
    pub fn parse(data: &[u8], port: &str) -> Option<Self> {
        if data.len() < 3 || data[0] < 0x80 {
            return None;
        }

        let channel = data[0] & 0x0F;
        let index = data[1] & 0x7F;
        let value = data[2] & 0x7F;

        let kind = match data[0] & 0xF0 {
            0x80 => MessageKind::NoteOff,
            0x90 if value == 0 => MessageKind::NoteOff,
            0x90 => MessageKind::NoteOn,
            0xB0 => MessageKind::ControlChange,
            _ => return None,
        };

        Some(Self::new(kind, index, channel, value).with_port(port))
    }

    /// Encode to raw MIDI bytes
    pub fn encode(&self) -> [u8; 3] {
        [
            self.kind.status_nibble() | (self.channel & 0x0F),
            self.index & 0x7F,
            self.value & 0x7F,
        ]
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::NoteOn => write!(
                f,
                "NoteOn ch:{} n:{} v:{}",
                self.channel + 1,
                self.index,
                self.value
            ),
            MessageKind::NoteOff => write!(
                f,
                "NoteOff ch:{} n:{} v:{}",
                self.channel + 1,
                self.index,
                self.value
            ),
            MessageKind::ControlChange => write!(
                f,
                "CC ch:{} cc:{} v:{}",
                self.channel + 1,
                self.index,
                self.value
            ),
        }
    }
}

/// MIDI value conversion utilities
pub mod convert {
    /// Value sent to light an indicator
    pub const ON: u8 = 127;
    /// Value sent to turn an indicator off
    pub const OFF: u8 = 0;

    /// Normalize a 7-bit value to 0.0..=1.0
    pub fn normalize(value: u8) -> f64 {
        f64::from(value.min(127)) / 127.0
    }

    /// Map a 7-bit value linearly onto `[min, max]`
    pub fn map_to_range(min: f64, max: f64, value: u8) -> f64 {
        min + (max - min) * normalize(value)
    }

    /// Fader position to linear volume multiplier (cubic taper)
    pub fn to_volume_level(value: u8) -> f64 {
        normalize(value).powi(3)
    }

    /// Linear volume multiplier back to a fader position
    pub fn from_volume_level(level: f64) -> u8 {
        let position = level.clamp(0.0, 1.0).cbrt() * 127.0;
        position.round().clamp(0.0, 127.0) as u8
    }

    /// Boolean state to indicator value
    pub fn on_off(on: bool) -> u8 {
        if on {
            ON
        } else {
            OFF
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let msg = Message::parse(&[0x90, 60, 100], "Surface").unwrap();

        assert_eq!(msg.kind, MessageKind::NoteOn);
        assert_eq!(msg.index, 60);
        assert_eq!(msg.channel, 0);
        assert_eq!(msg.value, 100);
        assert_eq!(msg.port, "Surface");
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = Message::parse(&[0x90, 60, 0], "Surface").unwrap();
        assert_eq!(msg.kind, MessageKind::NoteOff);
        assert_eq!(msg.value, 0);
    }

    #[test]
    fn test_control_change() {
        let msg = Message::parse(&[0xB2, 7, 100], "Surface").unwrap();
        assert_eq!(msg, Message::new(MessageKind::ControlChange, 7, 2, 100).with_port("Surface"));
    }

    #[test]
    fn test_unsupported_messages_ignored() {
        assert!(Message::parse(&[0xE0, 0x00, 0x40], "x").is_none());
        assert!(Message::parse(&[0xC0, 5], "x").is_none());
        assert!(Message::parse(&[0xF8], "x").is_none());
        assert!(Message::parse(&[0x40, 1, 2], "x").is_none());
    }

    #[test]
    fn test_encode() {
        assert_eq!(Message::new(MessageKind::NoteOn, 60, 0, 100).encode(), [0x90, 60, 100]);
        assert_eq!(Message::new(MessageKind::NoteOff, 1, 3, 0).encode(), [0x83, 1, 0]);
        assert_eq!(Message::new(MessageKind::ControlChange, 7, 15, 127).encode(), [0xBF, 7, 127]);
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: MessageKind = serde_yaml::from_str("Control Change").unwrap();
        assert_eq!(kind, MessageKind::ControlChange);
        let kind: MessageKind = serde_yaml::from_str("note_on").unwrap();
        assert_eq!(kind, MessageKind::NoteOn);
        assert_eq!(serde_yaml::to_string(&MessageKind::NoteOff).unwrap().trim(), "Note Off");
    }

    #[test]
    fn test_volume_curve() {
        assert_eq!(convert::to_volume_level(0), 0.0);
        assert_eq!(convert::to_volume_level(127), 1.0);
        let level = convert::to_volume_level(64);
        assert!((level - (64.0f64 / 127.0).powi(3)).abs() < 1e-12);
        assert_eq!(convert::from_volume_level(level), 64);
        assert_eq!(convert::from_volume_level(2.0), 127);
    }

    #[test]
    fn test_map_to_range() {
        assert_eq!(convert::map_to_range(0.0, 360.0, 0), 0.0);
        assert_eq!(convert::map_to_range(0.0, 360.0, 127), 360.0);
        assert_eq!(convert::map_to_range(-30.0, 30.0, 127), 30.0);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x90, 0x3C, 0x7F]), "90 3C 7F");
    }
}
