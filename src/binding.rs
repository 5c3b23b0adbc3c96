//! Bindings between control surface triggers and OBS commands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::midi::{Message, MessageKind};

macro_rules! command_kinds {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Every command a binding can name
        ///
        /// Serialized with the identifiers used in saved configurations
        /// (`Set_Current_Scene`, `Toggle_Mute`, ...).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum CommandKind {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl CommandKind {
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$variant,)*];

            /// Configuration identifier of this command
            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$variant => $name,)*
                }
            }
        }
    };
}

command_kinds! {
    // Scenes and transitions
    SetCurrentScene => "Set_Current_Scene",
    SetPreviewScene => "Set_Preview_Scene",
    DoTransition => "Do_Transition",
    SetCurrentTransition => "Set_Current_Transition",
    SetTransitionDuration => "Set_Transition_Duration",
    SetCurrentSceneCollection => "Set_Current_Scene_Collection",
    SetSceneTransitionOverride => "Set_Scene_Transition_Override",
    StudioMode => "Studio_Mode",
    EnablePreview => "Enable_Preview",
    DisablePreview => "Disable_Preview",
    MoveTBar => "Move_T_Bar",
    // Audio
    SetVolume => "Set_Volume",
    ToggleMute => "Toggle_Mute",
    SetMute => "Set_Mute",
    SetSyncOffset => "Set_Sync_Offset",
    SetGainFilter => "Set_Gain_Filter",
    SetAudioMonitorType => "Set_Audio_Monitor_Type",
    // Outputs
    ToggleStartStopStreaming => "Toggle_Start_Stop_Streaming",
    StartStreaming => "Start_Streaming",
    StopStreaming => "Stop_Streaming",
    ToggleStartStopRecording => "Toggle_Start_Stop_Recording",
    StartRecording => "Start_Recording",
    StopRecording => "Stop_Recording",
    PauseRecording => "Pause_Recording",
    ResumeRecording => "Resume_Recording",
    UnpauseRecording => "Unpause_Recording",
    ToggleStartStopReplayBuffer => "Toggle_Start_Stop_Replay_Buffer",
    StartReplayBuffer => "Start_Replay_Buffer",
    StopReplayBuffer => "Stop_Replay_Buffer",
    SaveReplayBuffer => "Save_Replay_Buffer",
    ResetStats => "Reset_Stats",
    // Sources, scene items and filters
    EnableSourceFilter => "Enable_Source_Filter",
    DisableSourceFilter => "Disable_Source_Filter",
    ToggleSourceFilter => "Toggle_Source_Filter",
    SetSourceFilterVisibility => "Set_Source_Filter_Visibility",
    ToggleSourceVisibility => "Toggle_Source_Visibility",
    SetSceneItemRender => "Set_Scene_Item_Render",
    ResetSceneItem => "Reset_Scene_Item",
    SetSourceRotation => "Set_Source_Rotation",
    SetSourceScale => "Set_Source_Scale",
    SetSourcePosition => "Set_Source_Position",
    SetOpacity => "Set_Opacity",
    ToggleFadeSource => "Toggle_Fade_Source",
    SetBrowserSourceUrl => "Set_Browser_Source_URL",
    ReloadBrowserSource => "Reload_Browser_Source",
    SetTextGdiPlusText => "Set_Text_GDIPlus_Text",
    SetSourceName => "Set_Source_Name",
    SetSourceSettings => "Set_Source_Settings",
    SetSceneItemCrop => "Set_Scene_Item_Crop",
    SetSceneItemPosition => "Set_Scene_Item_Position",
    SetSceneItemTransform => "Set_Scene_Item_Transform",
    TakeScreenshot => "Take_Screenshot",
    TakeSourceScreenshot => "Take_Source_Screenshot",
    // Media
    PlayPauseMedia => "Play_Pause_Media",
    RestartMedia => "Restart_Media",
    StopMedia => "Stop_Media",
    NextMedia => "Next_Media",
    PreviousMedia => "Previous_Media",
    ScrubMedia => "Scrub_Media",
    SetMediaTime => "Set_Media_Time",
    // Misc
    SetCurrentProfile => "Set_Current_Profile",
    TriggerHotkey => "Trigger_Hotkey_By_Name",
}

/// Group of commands sharing one kind of surface feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackFamily {
    Volume,
    Mute,
    Scene,
    Record,
    Stream,
}

impl CommandKind {
    /// Feedback family, `None` for commands with no outbound feedback
    pub fn family(self) -> Option<FeedbackFamily> {
        use CommandKind::*;
        match self {
            SetVolume => Some(FeedbackFamily::Volume),
            ToggleMute | SetMute => Some(FeedbackFamily::Mute),
            SetCurrentScene | SetPreviewScene | DoTransition => Some(FeedbackFamily::Scene),
            ToggleStartStopRecording | StartRecording | StopRecording => {
                Some(FeedbackFamily::Record)
            }
            ToggleStartStopStreaming | StartStreaming | StopStreaming => {
                Some(FeedbackFamily::Stream)
            }
            _ => None,
        }
    }

    /// Human readable label ("Set Current Scene")
    pub fn label(self) -> String {
        self.name().replace('_', " ")
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(' ', "_");
        if normalized == "Trigger_Hotkey" {
            return Ok(CommandKind::TriggerHotkey);
        }
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown command '{}'", s))
    }
}

/// One control surface trigger bound to one command
///
/// The parameter fields are a flat union over every command kind; each
/// command reads the ones it needs and reports the missing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Owning device, filled in from the device entry when loaded
    #[serde(default, skip_serializing)]
    pub device_id: String,
    pub message_kind: MessageKind,
    pub index: u8,
    #[serde(default)]
    pub channel: u8,
    pub command: CommandKind,

    /// Fire only on this exact value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_filter: Option<u8>,
    /// Last value seen by an unfiltered binding; runtime only
    #[serde(skip)]
    pub last_value: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_max: Option<f64>,
    /// Transition duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_override: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_override: Option<bool>,
}

impl Binding {
    pub fn new(
        device_id: impl Into<String>,
        message_kind: MessageKind,
        index: u8,
        channel: u8,
        command: CommandKind,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            message_kind,
            index,
            channel,
            command,
            value_filter: None,
            last_value: None,
            scene: None,
            source: None,
            filter: None,
            transition: None,
            profile: None,
            scene_collection: None,
            hotkey: None,
            audio_source: None,
            media_source: None,
            range_min: None,
            range_max: None,
            duration: None,
            string_override: None,
            int_override: None,
            bool_override: None,
        }
    }

    /// True if kind, index and channel equal the message's
    pub fn trigger_matches(&self, message: &Message) -> bool {
        self.message_kind == message.kind
            && self.index == message.index
            && self.channel == message.channel
    }

    /// Value the command acts on: the filter value, or the last value seen
    pub fn value(&self) -> u8 {
        self.value_filter.or(self.last_value).unwrap_or(0)
    }

    /// Feedback message on this binding's trigger carrying `value`
    pub fn message(&self, value: u8) -> Message {
        Message::new(self.message_kind, self.index, self.channel, value)
    }

    /// Replace every name field equal to `old` with `new`
    ///
    /// Returns true if anything changed.
    pub fn rename_target(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for field in [
            &mut self.scene,
            &mut self.source,
            &mut self.audio_source,
            &mut self.media_source,
        ] {
            if field.as_deref() == Some(old) {
                *field = Some(new.to_string());
                changed = true;
            }
        }
        changed
    }

    /// True if the binding targets the source `name`
    pub fn targets_source(&self, name: &str) -> bool {
        [&self.source, &self.audio_source, &self.media_source]
            .iter()
            .any(|field| field.as_deref() == Some(name))
    }

    /// One line summary, e.g. "Set Volume of Mic using Control Change 7"
    pub fn describe(&self) -> String {
        let target = match self.command.family() {
            Some(FeedbackFamily::Volume) | Some(FeedbackFamily::Mute) => self
                .audio_source
                .as_deref()
                .or(self.source.as_deref()),
            Some(FeedbackFamily::Scene) => self.scene.as_deref(),
            _ => self
                .source
                .as_deref()
                .or(self.media_source.as_deref())
                .or(self.scene.as_deref())
                .or(self.hotkey.as_deref()),
        };

        let mut text = self.command.label();
        if let Some(target) = target {
            text.push_str(" of ");
            text.push_str(target);
        }
        text.push_str(&format!(" using {} {}", self.message_kind, self.index));
        if self.channel != 0 {
            text.push_str(&format!(" ch {}", self.channel + 1));
        }
        if let Some(value) = self.value_filter {
            text.push_str(&format!(" = {}", value));
        }
        text
    }
}
