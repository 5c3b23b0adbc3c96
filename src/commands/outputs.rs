//! Streaming, recording and replay buffer commands

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::drivers::{Output, OutputAction};
use crate::error::CommandError;

/// Precondition on the output's active state before acting
#[derive(Clone, Copy)]
enum Guard {
    None,
    /// Skip silently unless active
    Active,
    /// Skip silently if already active
    Inactive,
    /// Fail with a conflict unless active
    RequireActive,
}

struct OutputCommand {
    kind: CommandKind,
    output: Output,
    action: OutputAction,
    guard: Guard,
}

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    use CommandKind::*;
    use Output::*;
    use OutputAction::*;

    let table = [
        (ToggleStartStopStreaming, Stream, Toggle, Guard::None),
        (StartStreaming, Stream, Start, Guard::Inactive),
        (StopStreaming, Stream, Stop, Guard::Active),
        (ToggleStartStopRecording, Record, Toggle, Guard::None),
        (StartRecording, Record, Start, Guard::Inactive),
        (StopRecording, Record, Stop, Guard::Active),
        (PauseRecording, Record, Pause, Guard::Active),
        (ResumeRecording, Record, Resume, Guard::Active),
        (UnpauseRecording, Record, Resume, Guard::Active),
        (ToggleStartStopReplayBuffer, ReplayBuffer, Toggle, Guard::None),
        (StartReplayBuffer, ReplayBuffer, Start, Guard::Inactive),
        (StopReplayBuffer, ReplayBuffer, Stop, Guard::Active),
        (SaveReplayBuffer, ReplayBuffer, Save, Guard::RequireActive),
    ];

    table
        .into_iter()
        .map(|(kind, output, action, guard)| {
            Arc::new(OutputCommand {
                kind,
                output,
                action,
                guard,
            }) as Arc<dyn Command>
        })
        .collect()
}

#[async_trait]
impl Command for OutputCommand {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    async fn execute(&self, _binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let proceed = match self.guard {
            Guard::None => true,
            Guard::Active => ctx.app.output_active(self.output).await?,
            Guard::Inactive => !ctx.app.output_active(self.output).await?,
            Guard::RequireActive => {
                if !ctx.app.output_active(self.output).await? {
                    return Err(CommandError::Conflict(format!(
                        "{:?} is not active",
                        self.output
                    )));
                }
                true
            }
        };

        if !proceed {
            debug!("{} skipped, {:?} already in requested state", self.kind, self.output);
            return Ok(());
        }

        ctx.app.output_action(self.output, self.action).await?;
        Ok(())
    }
}
