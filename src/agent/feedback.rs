//! Outbound feedback: OBS state changes to surface messages

use std::sync::atomic::Ordering;
use tracing::{debug, trace};

use crate::binding::FeedbackFamily;
use crate::event::{fields, ApplicationEvent, EventKind};
use crate::matcher;
use crate::midi::{convert, Message};

impl super::RoutingAgent {
    /// Handle one OBS event
    ///
    /// Returns true if the binding list changed (rename or removal) and
    /// should be saved.
    pub async fn on_application_event(&self, event: &ApplicationEvent) -> bool {
        match event.kind {
            EventKind::FinishedLoading => {
                self.loading.store(false, Ordering::SeqCst);
                self.sync_volumes().await;
                return false;
            }
            _ if self.is_loading() => {
                trace!("'{}' still loading, ignoring {:?}", self.name, event.kind);
                return false;
            }
            EventKind::SourceRenamed => return self.rename_source(event),
            EventKind::SourceRemoved => return self.remove_source(event),
            _ => {}
        }

        for message in self.feedback_for(event) {
            self.send_feedback(&message);
        }
        false
    }

    /// Feedback messages for `event`, updating the sticky scene indices
    fn feedback_for(&self, event: &ApplicationEvent) -> Vec<Message> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(idx) = matcher::outbound_match(&state.bindings, event) else {
            return Vec::new();
        };
        let binding = &state.bindings[idx];

        match binding.command.family() {
            Some(FeedbackFamily::Volume) => event
                .f64_field(fields::VOLUME)
                .map(|level| vec![binding.message(convert::from_volume_level(level))])
                .unwrap_or_default(),
            Some(FeedbackFamily::Mute) => event
                .bool_field(fields::MUTED)
                .map(|muted| vec![binding.message(convert::on_off(!muted))])
                .unwrap_or_default(),
            Some(FeedbackFamily::Scene) => {
                let sticky = if event.kind == EventKind::PreviewSceneChanged {
                    &mut state.last_active_preview_scene
                } else {
                    &mut state.last_active_scene
                };

                let mut messages = Vec::with_capacity(2);
                if let Some(previous) = sticky.filter(|p| *p != idx) {
                    if let Some(prev) = state.bindings.get(previous) {
                        messages.push(prev.message(convert::OFF));
                    }
                }
                messages.push(state.bindings[idx].message(convert::ON));
                *sticky = Some(idx);
                messages
            }
            Some(FeedbackFamily::Record) | Some(FeedbackFamily::Stream) => {
                // The record LED stays lit until the file is closed
                let on = matches!(
                    event.kind,
                    EventKind::StreamStarted | EventKind::RecordStarted | EventKind::RecordStopping
                );
                vec![binding.message(convert::on_off(on))]
            }
            None => Vec::new(),
        }
    }

    /// Point bindings at a renamed source; no feedback
    fn rename_source(&self, event: &ApplicationEvent) -> bool {
        if self.engine.state.is_shutting_down() {
            return false;
        }
        let (Some(old), Some(new)) = (
            event.str_field(fields::PREVIOUS_NAME),
            event.str_field(fields::NEW_NAME),
        ) else {
            return false;
        };

        let mut state = self.state.lock();
        let mut changed = 0;
        for binding in state.bindings.iter_mut() {
            if binding.rename_target(old, new) {
                changed += 1;
            }
        }
        if changed > 0 {
            debug!("'{}': {} bindings follow rename '{}' -> '{}'", self.name, changed, old, new);
        }
        changed > 0
    }

    /// Drop bindings that target a removed source
    fn remove_source(&self, event: &ApplicationEvent) -> bool {
        if self.engine.state.is_shutting_down() {
            return false;
        }
        let Some(name) = event.source_name() else {
            return false;
        };

        let mut state = self.state.lock();
        let doomed: Vec<usize> = state
            .bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.targets_source(name))
            .map(|(idx, _)| idx)
            .collect();

        for idx in doomed.iter().rev() {
            state.remove_at(*idx);
        }
        if !doomed.is_empty() {
            debug!("'{}': removed {} bindings for '{}'", self.name, doomed.len(), name);
        }
        !doomed.is_empty()
    }

    /// Move every volume fader to the current level
    async fn sync_volumes(&self) {
        let faders: Vec<(String, Message)> = self
            .state
            .lock()
            .bindings
            .iter()
            .filter(|b| b.command.family() == Some(FeedbackFamily::Volume))
            .filter_map(|b| Some((b.audio_source.clone()?, b.message(0))))
            .collect();

        for (source, template) in faders {
            match self.engine.app.volume(&source).await {
                Ok(level) => {
                    let value = convert::from_volume_level(level);
                    let message = Message::new(template.kind, template.index, template.channel, value);
                    self.send_feedback(&message);
                }
                Err(e) => debug!("No volume for '{}': {}", source, e),
            }
        }
    }
}
