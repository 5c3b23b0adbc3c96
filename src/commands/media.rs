//! Media source playback commands

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{required, Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::drivers::{MediaAction, MediaState};
use crate::error::CommandError;

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(PlayPauseMedia),
        Arc::new(MediaCommand(CommandKind::RestartMedia, MediaAction::Restart)),
        Arc::new(MediaCommand(CommandKind::StopMedia, MediaAction::Stop)),
        Arc::new(MediaCommand(CommandKind::NextMedia, MediaAction::Next)),
        Arc::new(MediaCommand(CommandKind::PreviousMedia, MediaAction::Previous)),
    ]
}

/// Play or pause depending on the current state; ended media restarts
struct PlayPauseMedia;

#[async_trait]
impl Command for PlayPauseMedia {
    fn kind(&self) -> CommandKind {
        CommandKind::PlayPauseMedia
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.media_source, "media_source")?;
        let action = match ctx.app.media_state(source).await? {
            MediaState::Playing => MediaAction::Pause,
            MediaState::Paused => MediaAction::Play,
            MediaState::Ended => MediaAction::Restart,
            state => {
                debug!("Media '{}' is {:?}, nothing to play or pause", source, state);
                return Ok(());
            }
        };
        ctx.app.media_action(source, action).await?;
        Ok(())
    }
}

struct MediaCommand(CommandKind, MediaAction);

#[async_trait]
impl Command for MediaCommand {
    fn kind(&self) -> CommandKind {
        self.0
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.media_source, "media_source")?;
        ctx.app.media_action(source, self.1).await?;
        Ok(())
    }
}
