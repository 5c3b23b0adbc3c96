//! Audio commands: volume, mute, sync offset, gain

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{required, switch_state, Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::error::CommandError;
use crate::midi::convert;

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(SetVolume),
        Arc::new(ToggleMute),
        Arc::new(SetMute),
        Arc::new(SetSyncOffset),
        Arc::new(SetGainFilter),
    ]
}

fn audio_source(binding: &Binding) -> Result<&str, CommandError> {
    match binding.audio_source.as_deref().filter(|s| !s.is_empty()) {
        Some(source) => Ok(source),
        None => required(binding, &binding.source, "audio_source"),
    }
}

/// Fader to volume through a cubic taper
struct SetVolume;

#[async_trait]
impl Command for SetVolume {
    fn kind(&self) -> CommandKind {
        CommandKind::SetVolume
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.audio_source, "audio_source")?;
        let level = convert::to_volume_level(binding.value());
        ctx.app.set_volume(source, level).await?;
        Ok(())
    }
}

struct ToggleMute;

#[async_trait]
impl Command for ToggleMute {
    fn kind(&self) -> CommandKind {
        CommandKind::ToggleMute
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.audio_source, "audio_source")?;
        ctx.app.toggle_mute(source).await?;
        Ok(())
    }
}

struct SetMute;

#[async_trait]
impl Command for SetMute {
    fn kind(&self) -> CommandKind {
        CommandKind::SetMute
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.audio_source, "audio_source")?;
        ctx.app.set_muted(source, switch_state(binding)).await?;
        Ok(())
    }
}

/// Value mapped to milliseconds in [range_min, range_max], default 0..1000
struct SetSyncOffset;

#[async_trait]
impl Command for SetSyncOffset {
    fn kind(&self) -> CommandKind {
        CommandKind::SetSyncOffset
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = audio_source(binding)?;
        let millis = convert::map_to_range(
            binding.range_min.unwrap_or(0.0),
            binding.range_max.unwrap_or(1000.0),
            binding.value(),
        );
        ctx.app.set_sync_offset(source, millis.round() as i64).await?;
        Ok(())
    }
}

/// Value mapped to dB on a gain filter, default -30..30
struct SetGainFilter;

#[async_trait]
impl Command for SetGainFilter {
    fn kind(&self) -> CommandKind {
        CommandKind::SetGainFilter
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = audio_source(binding)?;
        let filter = required(binding, &binding.filter, "filter")?;
        let db = convert::map_to_range(
            binding.range_min.unwrap_or(-30.0),
            binding.range_max.unwrap_or(30.0),
            binding.value(),
        );
        ctx.app
            .set_filter_settings(source, filter, json!({ "db": db }))
            .await?;
        Ok(())
    }
}
