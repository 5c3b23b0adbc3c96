//! obs-websocket events to application events

use obws::events::{Event, OutputState};

use crate::event::{fields, ApplicationEvent, EventKind};

/// Normalize one OBS event; `None` for events nothing reacts to
pub(super) fn translate(event: Event) -> Option<ApplicationEvent> {
    let translated = match event {
        Event::CurrentProgramSceneChanged { name, .. } => ApplicationEvent::scene_changed(&name),
        Event::CurrentPreviewSceneChanged { name, .. } => {
            ApplicationEvent::preview_scene_changed(&name)
        }
        Event::InputVolumeChanged { name, mul, .. } => {
            ApplicationEvent::volume_changed(&name, f64::from(mul))
        }
        Event::InputMuteStateChanged { name, muted, .. } => {
            ApplicationEvent::mute_changed(&name, muted)
        }
        Event::StreamStateChanged { state, .. } => ApplicationEvent::new(stream_kind(state)?),
        Event::RecordStateChanged { state, .. } => ApplicationEvent::new(record_kind(state)?),
        Event::InputNameChanged { old_name, new_name, .. }
        | Event::SceneNameChanged { old_name, new_name, .. } => {
            ApplicationEvent::source_renamed(&old_name, &new_name)
        }
        Event::InputRemoved { name, .. } => ApplicationEvent::source_removed(&name),
        Event::CurrentProfileChanged { name, .. } => {
            ApplicationEvent::new(EventKind::ProfileChanged).with(fields::NAME, name)
        }
        Event::CurrentSceneCollectionChanged { name, .. } => {
            ApplicationEvent::new(EventKind::SceneCollectionChanged).with(fields::NAME, name)
        }
        Event::SceneTransitionStarted { .. } => ApplicationEvent::new(EventKind::TransitionBegin),
        Event::SceneTransitionEnded { .. } => ApplicationEvent::new(EventKind::TransitionEnd),
        Event::StudioModeStateChanged { enabled, .. } => {
            ApplicationEvent::new(EventKind::StudioModeChanged).with(fields::ENABLED, enabled)
        }
        Event::ExitStarted => ApplicationEvent::new(EventKind::Exiting),
        _ => return None,
    };
    Some(translated)
}

fn stream_kind(state: OutputState) -> Option<EventKind> {
    match state {
        OutputState::Starting => Some(EventKind::StreamStarting),
        OutputState::Started => Some(EventKind::StreamStarted),
        OutputState::Stopping => Some(EventKind::StreamStopping),
        OutputState::Stopped => Some(EventKind::StreamStopped),
        _ => None,
    }
}

fn record_kind(state: OutputState) -> Option<EventKind> {
    match state {
        OutputState::Starting => Some(EventKind::RecordStarting),
        OutputState::Started => Some(EventKind::RecordStarted),
        OutputState::Stopping => Some(EventKind::RecordStopping),
        OutputState::Stopped => Some(EventKind::RecordStopped),
        OutputState::Paused => Some(EventKind::RecordPaused),
        OutputState::Resumed => Some(EventKind::RecordResumed),
        _ => None,
    }
}
