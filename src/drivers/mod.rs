//! Controlled application drivers
//!
//! Commands never talk to OBS directly: they go through [`ControlledApp`],
//! which names every entity by string and reports stale names as
//! [`DriverError::NotFound`].

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::error::DriverError;

pub mod obs;

pub use obs::ObsDriver;

pub type DriverResult<T> = Result<T, DriverError>;

/// Output pipelines of the controlled application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Stream,
    Record,
    ReplayBuffer,
}

/// Action applied to an [`Output`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Toggle,
    Start,
    Stop,
    Pause,
    Resume,
    Save,
}

/// Playback state of a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Playing,
    Paused,
    Stopped,
    Ended,
    Other,
}

/// Playback control for a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Play,
    Pause,
    Restart,
    Stop,
    Next,
    Previous,
}

/// Partial scene item transform; `None` fields are left unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ItemTransform {
    pub position: Option<(f64, f64)>,
    pub rotation: Option<f64>,
    pub scale: Option<(f64, f64)>,
}

/// Everything a command can ask of the controlled application
///
/// All methods take `&self` so implementations can be shared as
/// `Arc<dyn ControlledApp>`; use interior mutability for connection state.
#[async_trait]
pub trait ControlledApp: Send + Sync {
    // Scenes and transitions
    async fn program_scene(&self) -> DriverResult<String>;
    async fn set_program_scene(&self, scene: &str) -> DriverResult<()>;
    async fn preview_scene(&self) -> DriverResult<String>;
    async fn set_preview_scene(&self, scene: &str) -> DriverResult<()>;
    async fn studio_mode(&self) -> DriverResult<bool>;
    async fn set_studio_mode(&self, enabled: bool) -> DriverResult<()>;
    async fn set_current_transition(&self, transition: &str) -> DriverResult<()>;
    async fn set_transition_duration(&self, millis: u32) -> DriverResult<()>;
    /// Transition preview to program (studio mode)
    async fn trigger_transition(&self) -> DriverResult<()>;
    /// Position in 0.0..=1.0
    async fn set_tbar_position(&self, position: f64) -> DriverResult<()>;
    async fn set_scene_collection(&self, collection: &str) -> DriverResult<()>;
    async fn set_profile(&self, profile: &str) -> DriverResult<()>;

    // Audio
    /// Linear volume multiplier
    async fn volume(&self, source: &str) -> DriverResult<f64>;
    async fn set_volume(&self, source: &str, level: f64) -> DriverResult<()>;
    /// Returns the new mute state
    async fn toggle_mute(&self, source: &str) -> DriverResult<bool>;
    async fn set_muted(&self, source: &str, muted: bool) -> DriverResult<()>;
    async fn set_sync_offset(&self, source: &str, millis: i64) -> DriverResult<()>;

    // Outputs
    async fn output_active(&self, output: Output) -> DriverResult<bool>;
    async fn output_action(&self, output: Output, action: OutputAction) -> DriverResult<()>;

    // Filters
    async fn filter_enabled(&self, source: &str, filter: &str) -> DriverResult<bool>;
    async fn set_filter_enabled(&self, source: &str, filter: &str, enabled: bool) -> DriverResult<()>;
    async fn set_filter_settings(&self, source: &str, filter: &str, settings: Value) -> DriverResult<()>;
    async fn add_filter(&self, source: &str, filter: &str, kind: &str, settings: Value) -> DriverResult<()>;
    async fn remove_filter(&self, source: &str, filter: &str) -> DriverResult<()>;

    // Scene items
    async fn scene_item_visible(&self, scene: &str, source: &str) -> DriverResult<bool>;
    async fn set_scene_item_visible(&self, scene: &str, source: &str, visible: bool) -> DriverResult<()>;
    async fn set_scene_item_transform(
        &self,
        scene: &str,
        source: &str,
        transform: ItemTransform,
    ) -> DriverResult<()>;

    // Inputs
    /// Overlay `settings` on the input's current settings
    async fn set_input_settings(&self, input: &str, settings: Value) -> DriverResult<()>;
    async fn press_input_button(&self, input: &str, property: &str) -> DriverResult<()>;
    async fn save_screenshot(&self, source: &str, path: &Path) -> DriverResult<()>;

    // Media
    async fn media_state(&self, source: &str) -> DriverResult<MediaState>;
    async fn media_action(&self, source: &str, action: MediaAction) -> DriverResult<()>;

    async fn trigger_hotkey(&self, name: &str) -> DriverResult<()>;
}
