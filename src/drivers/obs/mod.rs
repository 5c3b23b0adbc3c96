//! OBS Studio WebSocket Driver
//!
//! Provides integration with OBS Studio (obs-websocket v5) for:
//! - Every request the command catalog issues ([`ControlledApp`])
//! - OBS events, normalized to [`ApplicationEvent`]s
//! - Automatic reconnection
//!
//! [`ControlledApp`]: super::ControlledApp
//! [`ApplicationEvent`]: crate::event::ApplicationEvent

mod connection;
mod control;
mod driver;
mod events;

pub use driver::ObsDriver;
