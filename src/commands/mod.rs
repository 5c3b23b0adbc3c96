//! Command catalog
//!
//! Every [`CommandKind`] with an implementation maps to one stateless
//! [`Command`] in a registry built once at startup. A command is
//! parameterized only by the binding that fired it.

mod audio;
mod media;
mod misc;
mod outputs;
mod scenes;
mod sources;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::binding::{Binding, CommandKind};
use crate::drivers::ControlledApp;
use crate::error::CommandError;

pub use sources::{FADE_FILTER_KIND, FADE_FILTER_NAME, FADE_STEPS};

/// Process-wide flags shared by every agent
#[derive(Debug, Default)]
pub struct EngineState {
    shutting_down: AtomicBool,
    transitioning: AtomicBool,
    app_ready: AtomicBool,
}

impl EngineState {
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn set_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// The application came back after announcing its exit
    pub fn clear_shutting_down(&self) {
        self.shutting_down.store(false, Ordering::SeqCst);
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::SeqCst)
    }

    pub fn set_transitioning(&self, transitioning: bool) {
        self.transitioning.store(transitioning, Ordering::SeqCst);
    }

    /// True once the application reported it finished loading
    pub fn is_app_ready(&self) -> bool {
        self.app_ready.load(Ordering::SeqCst)
    }

    pub fn set_app_ready(&self, ready: bool) {
        self.app_ready.store(ready, Ordering::SeqCst);
    }
}

/// What a command may touch while executing
#[derive(Clone)]
pub struct DispatchContext {
    pub app: Arc<dyn ControlledApp>,
    pub engine: Arc<EngineState>,
    /// Flips to `true` when the dispatching agent is closed
    pub cancel: watch::Receiver<bool>,
}

/// One executable command kind
#[async_trait]
pub trait Command: Send + Sync {
    fn kind(&self) -> CommandKind;

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError>;
}

/// Read-only map from command kind to implementation
pub struct CommandRegistry {
    commands: HashMap<CommandKind, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Registry with every built-in command
    pub fn builtin() -> Self {
        let mut commands: HashMap<CommandKind, Arc<dyn Command>> = HashMap::new();
        let all = scenes::commands()
            .into_iter()
            .chain(audio::commands())
            .chain(outputs::commands())
            .chain(sources::commands())
            .chain(media::commands())
            .chain(misc::commands());
        for command in all {
            commands.insert(command.kind(), command);
        }
        Self { commands }
    }

    pub fn resolve(&self, kind: CommandKind) -> Result<Arc<dyn Command>, CommandError> {
        self.commands
            .get(&kind)
            .cloned()
            .ok_or(CommandError::UnknownCommand(kind))
    }

    pub fn is_registered(&self, kind: CommandKind) -> bool {
        self.commands.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Required string parameter, empty counts as missing
pub(crate) fn required<'a>(
    binding: &Binding,
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, CommandError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CommandError::MissingField {
            command: binding.command,
            field,
        }),
    }
}

/// Named scene, or the current program scene when none is set
pub(crate) async fn scene_or_current(
    binding: &Binding,
    ctx: &DispatchContext,
) -> Result<String, CommandError> {
    match binding.scene.as_deref() {
        Some(scene) if !scene.is_empty() => Ok(scene.to_string()),
        _ => Ok(ctx.app.program_scene().await?),
    }
}

/// Switch state taken from `bool_override`, else value above zero
pub(crate) fn switch_state(binding: &Binding) -> bool {
    binding.bool_override.unwrap_or(binding.value() > 0)
}
