//! Binding matching for both directions
//!
//! Inbound: every binding whose trigger matches fires, in order.
//! Outbound: the first binding of the event's feedback family wins, so one
//! state change lights at most one indicator.

use crate::binding::{Binding, FeedbackFamily};
use crate::event::{ApplicationEvent, EventKind};
use crate::midi::Message;

/// Indices of every binding the message fires, in sequence order
///
/// Unfiltered bindings record the message value as a side effect.
pub fn inbound_matches(bindings: &mut [Binding], message: &Message) -> Vec<usize> {
    let mut matched = Vec::new();
    for (idx, binding) in bindings.iter_mut().enumerate() {
        if !binding.trigger_matches(message) {
            continue;
        }
        match binding.value_filter {
            Some(expected) if expected != message.value => continue,
            Some(_) => {}
            None => binding.last_value = Some(message.value),
        }
        matched.push(idx);
    }
    matched
}

/// Index of the binding that gets feedback for `event`, if any
pub fn outbound_match(bindings: &[Binding], event: &ApplicationEvent) -> Option<usize> {
    bindings.iter().position(|b| feedback_applies(b, event))
}

fn feedback_applies(binding: &Binding, event: &ApplicationEvent) -> bool {
    let Some(family) = binding.command.family() else {
        return false;
    };

    match family {
        FeedbackFamily::Volume => {
            event.kind == EventKind::VolumeChanged && same_name(&binding.audio_source, event.source_name())
        }
        FeedbackFamily::Mute => {
            event.kind == EventKind::MuteChanged && same_name(&binding.audio_source, event.source_name())
        }
        FeedbackFamily::Scene => event.kind.is_scene() && same_name(&binding.scene, event.scene_name()),
        FeedbackFamily::Record => event.kind.is_record(),
        FeedbackFamily::Stream => event.kind.is_stream(),
    }
}

fn same_name(field: &Option<String>, name: Option<&str>) -> bool {
    matches!((field.as_deref(), name), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CommandKind;
    use crate::midi::MessageKind;
    use proptest::prelude::*;

    fn binding(kind: MessageKind, index: u8, command: CommandKind) -> Binding {
        Binding::new("Surface", kind, index, 0, command)
    }

    fn scene_binding(index: u8, scene: &str) -> Binding {
        Binding {
            scene: Some(scene.into()),
            ..binding(MessageKind::NoteOn, index, CommandKind::SetCurrentScene)
        }
    }

    #[test]
    fn test_inbound_returns_all_matches_in_order() {
        let mut bindings = vec![
            binding(MessageKind::NoteOn, 1, CommandKind::SetCurrentScene),
            binding(MessageKind::NoteOn, 2, CommandKind::ToggleMute),
            binding(MessageKind::NoteOn, 1, CommandKind::ToggleMute),
        ];
        let msg = Message::new(MessageKind::NoteOn, 1, 0, 127);
        assert_eq!(inbound_matches(&mut bindings, &msg), vec![0, 2]);
    }

    #[test]
    fn test_inbound_channel_and_kind_must_match() {
        let mut bindings = vec![binding(MessageKind::NoteOn, 1, CommandKind::StudioMode)];
        assert!(inbound_matches(&mut bindings, &Message::new(MessageKind::NoteOn, 1, 1, 127)).is_empty());
        assert!(inbound_matches(&mut bindings, &Message::new(MessageKind::ControlChange, 1, 0, 127)).is_empty());
    }

    #[test]
    fn test_filtered_binding_does_not_record_value() {
        let mut bindings = vec![Binding {
            value_filter: Some(127),
            ..binding(MessageKind::NoteOn, 1, CommandKind::StudioMode)
        }];
        assert_eq!(inbound_matches(&mut bindings, &Message::new(MessageKind::NoteOn, 1, 0, 127)), vec![0]);
        assert_eq!(bindings[0].last_value, None);
    }

    #[test]
    fn test_outbound_volume_requires_source_and_kind() {
        let bindings = vec![
            Binding {
                audio_source: Some("Desktop".into()),
                ..binding(MessageKind::ControlChange, 1, CommandKind::SetVolume)
            },
            Binding {
                audio_source: Some("Mic".into()),
                ..binding(MessageKind::ControlChange, 2, CommandKind::SetVolume)
            },
        ];
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::volume_changed("Mic", 0.5)), Some(1));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::mute_changed("Mic", true)), None);
    }

    #[test]
    fn test_outbound_mute_family() {
        let bindings = vec![Binding {
            audio_source: Some("Mic".into()),
            ..binding(MessageKind::NoteOn, 3, CommandKind::SetMute)
        }];
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::mute_changed("Mic", false)), Some(0));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::mute_changed("Aux", false)), None);
    }

    #[test]
    fn test_outbound_scene_first_match_only() {
        let bindings = vec![
            scene_binding(1, "Intro"),
            scene_binding(2, "Main"),
            scene_binding(3, "Main"),
        ];
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::scene_changed("Main")), Some(1));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::preview_scene_changed("Intro")), Some(0));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::scene_changed("Missing")), None);
    }

    #[test]
    fn test_outbound_output_families() {
        let bindings = vec![
            binding(MessageKind::NoteOn, 1, CommandKind::PauseRecording),
            binding(MessageKind::NoteOn, 2, CommandKind::StartStreaming),
            binding(MessageKind::NoteOn, 3, CommandKind::ToggleStartStopRecording),
        ];
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::new(EventKind::RecordStopping)), Some(2));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::new(EventKind::StreamStarted)), Some(1));
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::new(EventKind::RecordPaused)), None);
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::new(EventKind::StreamStarting)), None);
    }

    #[test]
    fn test_outbound_no_feedback_commands() {
        let bindings = vec![Binding {
            scene: Some("Intro".into()),
            ..binding(MessageKind::NoteOn, 1, CommandKind::ToggleSourceVisibility)
        }];
        assert_eq!(outbound_match(&bindings, &ApplicationEvent::scene_changed("Intro")), None);
    }

    fn message_kind() -> impl Strategy<Value = MessageKind> {
        prop_oneof![
            Just(MessageKind::NoteOn),
            Just(MessageKind::NoteOff),
            Just(MessageKind::ControlChange),
        ]
    }

    proptest! {
        #[test]
        fn prop_inbound_fires_iff_trigger_and_filter_match(
            b_kind in message_kind(),
            b_index in 0u8..4,
            b_channel in 0u8..2,
            filter in proptest::option::of(0u8..128),
            m_kind in message_kind(),
            m_index in 0u8..4,
            m_channel in 0u8..2,
            m_value in 0u8..128,
        ) {
            let mut bindings = vec![Binding {
                value_filter: filter,
                ..Binding::new("Surface", b_kind, b_index, b_channel, CommandKind::SetVolume)
            }];
            let msg = Message::new(m_kind, m_index, m_channel, m_value);

            let trigger = (b_kind, b_index, b_channel) == (m_kind, m_index, m_channel);
            let expected = trigger && filter.map_or(true, |v| v == m_value);
            let fired = !inbound_matches(&mut bindings, &msg).is_empty();

            prop_assert_eq!(fired, expected);
            if fired && filter.is_none() {
                prop_assert_eq!(bindings[0].last_value, Some(m_value));
            }
            if !fired {
                prop_assert_eq!(bindings[0].last_value, None);
            }
        }
    }
}
