//! Scene, transition and studio mode commands

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{required, Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::error::CommandError;
use crate::midi::convert;

/// Transition name meaning "keep whatever is selected"
pub const CURRENT_TRANSITION: &str = "Current Transition";
/// Scene name meaning "whatever is in preview"
pub const PREVIEW_SCENE: &str = "Preview Scene";

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(SetCurrentScene),
        Arc::new(SetPreviewScene),
        Arc::new(DoTransition),
        Arc::new(SetCurrentTransition),
        Arc::new(SetTransitionDuration),
        Arc::new(SetCurrentSceneCollection),
        Arc::new(StudioMode::Toggle),
        Arc::new(StudioMode::Enable),
        Arc::new(StudioMode::Disable),
        Arc::new(MoveTBar),
    ]
}

struct SetCurrentScene;

#[async_trait]
impl Command for SetCurrentScene {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCurrentScene
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let scene = required(binding, &binding.scene, "scene")?;
        ctx.app.set_program_scene(scene).await?;
        Ok(())
    }
}

struct SetPreviewScene;

#[async_trait]
impl Command for SetPreviewScene {
    fn kind(&self) -> CommandKind {
        CommandKind::SetPreviewScene
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let scene = required(binding, &binding.scene, "scene")?;
        if !ctx.app.studio_mode().await? {
            return Err(CommandError::Conflict(
                "cannot set preview scene, studio mode is not enabled".to_string(),
            ));
        }
        ctx.app.set_preview_scene(scene).await?;
        Ok(())
    }
}

/// Transition to a scene, optionally with a specific transition and duration
///
/// In studio mode the named scene (if any) is put in preview first and the
/// transition is triggered; otherwise the scene is switched directly.
struct DoTransition;

#[async_trait]
impl Command for DoTransition {
    fn kind(&self) -> CommandKind {
        CommandKind::DoTransition
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        if ctx.engine.is_transitioning() {
            debug!("Transition already in progress, ignoring {}", binding.describe());
            return Ok(());
        }

        if let Some(transition) = binding.transition.as_deref() {
            if !transition.is_empty() && transition != CURRENT_TRANSITION {
                ctx.app.set_current_transition(transition).await?;
            }
        }

        if let Some(millis) = binding.duration.filter(|ms| *ms > 0) {
            ctx.app.set_transition_duration(millis).await?;
        }

        let target = binding
            .scene
            .as_deref()
            .filter(|scene| !scene.is_empty() && *scene != PREVIEW_SCENE);

        if ctx.app.studio_mode().await? {
            if let Some(scene) = target {
                ctx.app.set_preview_scene(scene).await?;
            }
            ctx.app.trigger_transition().await?;
        } else {
            let scene = match target {
                Some(scene) => scene.to_string(),
                None => {
                    // Outside studio mode "Preview Scene" resolves to what is on screen
                    let requested = binding.scene.as_deref().unwrap_or_default();
                    if requested != PREVIEW_SCENE {
                        return Err(CommandError::MissingField {
                            command: binding.command,
                            field: "scene",
                        });
                    }
                    ctx.app.program_scene().await?
                }
            };
            ctx.app.set_program_scene(&scene).await?;
        }
        Ok(())
    }
}

struct SetCurrentTransition;

#[async_trait]
impl Command for SetCurrentTransition {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCurrentTransition
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let transition = required(binding, &binding.transition, "transition")?;
        ctx.app.set_current_transition(transition).await?;
        Ok(())
    }
}

struct SetTransitionDuration;

#[async_trait]
impl Command for SetTransitionDuration {
    fn kind(&self) -> CommandKind {
        CommandKind::SetTransitionDuration
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let millis = binding.duration.ok_or(CommandError::MissingField {
            command: binding.command,
            field: "duration",
        })?;
        ctx.app.set_transition_duration(millis).await?;
        Ok(())
    }
}

struct SetCurrentSceneCollection;

#[async_trait]
impl Command for SetCurrentSceneCollection {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCurrentSceneCollection
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let collection = required(binding, &binding.scene_collection, "scene_collection")?;
        ctx.app.set_scene_collection(collection).await?;
        Ok(())
    }
}

enum StudioMode {
    Toggle,
    Enable,
    Disable,
}

#[async_trait]
impl Command for StudioMode {
    fn kind(&self) -> CommandKind {
        match self {
            StudioMode::Toggle => CommandKind::StudioMode,
            StudioMode::Enable => CommandKind::EnablePreview,
            StudioMode::Disable => CommandKind::DisablePreview,
        }
    }

    async fn execute(&self, _binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let enabled = match self {
            StudioMode::Toggle => !ctx.app.studio_mode().await?,
            StudioMode::Enable => true,
            StudioMode::Disable => false,
        };
        ctx.app.set_studio_mode(enabled).await?;
        Ok(())
    }
}

/// Fader position to T-bar position, studio mode only
struct MoveTBar;

#[async_trait]
impl Command for MoveTBar {
    fn kind(&self) -> CommandKind {
        CommandKind::MoveTBar
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        if !ctx.app.studio_mode().await? {
            return Err(CommandError::Conflict(
                "T-bar only moves in studio mode".to_string(),
            ));
        }
        ctx.app
            .set_tbar_position(convert::normalize(binding.value()))
            .await?;
        Ok(())
    }
}
