//! OBS MIDI GW
//!
//! Routes MIDI control surface input to OBS Studio commands and mirrors OBS
//! state changes back onto the surface (lit buttons, moving faders).

pub mod agent;
pub mod binding;
pub mod commands;
pub mod config;
pub mod directory;
pub mod drivers;
pub mod error;
pub mod event;
pub mod matcher;
pub mod midi;
pub mod paths;
pub mod sniffer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::RoutingAgent;
pub use binding::{Binding, CommandKind};
pub use directory::AgentDirectory;
pub use event::{ApplicationEvent, EventKind};
pub use midi::{Message, MessageKind};
