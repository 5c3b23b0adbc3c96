//! Domain error types
//!
//! `anyhow` is used at the application edges (startup, config files); the
//! engine itself reports through these enums so callers can tell
//! configuration mistakes from OBS failures.

use crate::binding::CommandKind;

/// Failure talking to the controlled application
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("not connected to OBS")]
    NotConnected,

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("OBS request failed: {0}")]
    Request(String),
}

impl DriverError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        DriverError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Failure executing one binding's command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{command} binding is missing required field `{field}`")]
    MissingField {
        command: CommandKind,
        field: &'static str,
    },

    #[error("no implementation registered for {0}")]
    UnknownCommand(CommandKind),

    /// OBS is in a state where the command cannot apply
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Failure on the MIDI transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("failed to initialize MIDI backend: {0}")]
    Init(String),

    #[error("failed to connect to MIDI port '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("failed to send MIDI message: {0}")]
    Send(String),
}
