//! State change notifications from OBS, normalized

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys used in [`ApplicationEvent::fields`]
pub mod fields {
    pub const SOURCE_NAME: &str = "sourceName";
    pub const VOLUME: &str = "volume";
    pub const MUTED: &str = "muted";
    pub const SCENE_NAME: &str = "sceneName";
    pub const PREVIOUS_NAME: &str = "previousName";
    pub const NEW_NAME: &str = "newName";
    pub const NAME: &str = "name";
    pub const ENABLED: &str = "enabled";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    VolumeChanged,
    MuteChanged,
    SceneChanged,
    PreviewSceneChanged,
    StreamStarting,
    StreamStarted,
    StreamStopping,
    StreamStopped,
    RecordStarting,
    RecordStarted,
    RecordStopping,
    RecordStopped,
    RecordPaused,
    RecordResumed,
    SourceRenamed,
    SourceRemoved,
    ProfileChanged,
    SceneCollectionChanged,
    TransitionBegin,
    TransitionEnd,
    StudioModeChanged,
    FinishedLoading,
    Exiting,
}

impl EventKind {
    pub fn is_record(self) -> bool {
        matches!(
            self,
            EventKind::RecordStarted | EventKind::RecordStopped | EventKind::RecordStopping
        )
    }

    pub fn is_stream(self) -> bool {
        matches!(
            self,
            EventKind::StreamStarted | EventKind::StreamStopped | EventKind::StreamStopping
        )
    }

    pub fn is_scene(self) -> bool {
        matches!(self, EventKind::SceneChanged | EventKind::PreviewSceneChanged)
    }
}

/// One notification, with a kind-dependent field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl ApplicationEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn volume_changed(source: &str, level: f64) -> Self {
        Self::new(EventKind::VolumeChanged)
            .with(fields::SOURCE_NAME, source)
            .with(fields::VOLUME, level)
    }

    pub fn mute_changed(source: &str, muted: bool) -> Self {
        Self::new(EventKind::MuteChanged)
            .with(fields::SOURCE_NAME, source)
            .with(fields::MUTED, muted)
    }

    pub fn scene_changed(scene: &str) -> Self {
        Self::new(EventKind::SceneChanged).with(fields::SCENE_NAME, scene)
    }

    pub fn preview_scene_changed(scene: &str) -> Self {
        Self::new(EventKind::PreviewSceneChanged).with(fields::SCENE_NAME, scene)
    }

    pub fn source_renamed(previous: &str, new: &str) -> Self {
        Self::new(EventKind::SourceRenamed)
            .with(fields::PREVIOUS_NAME, previous)
            .with(fields::NEW_NAME, new)
    }

    pub fn source_removed(source: &str) -> Self {
        Self::new(EventKind::SourceRemoved).with(fields::SOURCE_NAME, source)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.str_field(fields::SOURCE_NAME)
    }

    pub fn scene_name(&self) -> Option<&str> {
        self.str_field(fields::SCENE_NAME)
    }
}
