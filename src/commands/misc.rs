//! Profile and hotkey commands

use async_trait::async_trait;
use std::sync::Arc;

use super::{required, Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::error::CommandError;

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    vec![Arc::new(SetCurrentProfile), Arc::new(TriggerHotkey)]
}

struct SetCurrentProfile;

#[async_trait]
impl Command for SetCurrentProfile {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCurrentProfile
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let profile = required(binding, &binding.profile, "profile")?;
        ctx.app.set_profile(profile).await?;
        Ok(())
    }
}

struct TriggerHotkey;

#[async_trait]
impl Command for TriggerHotkey {
    fn kind(&self) -> CommandKind {
        CommandKind::TriggerHotkey
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let hotkey = required(binding, &binding.hotkey, "hotkey")?;
        ctx.app.trigger_hotkey(hotkey).await?;
        Ok(())
    }
}
