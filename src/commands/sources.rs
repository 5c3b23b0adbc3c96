//! Source, scene item and filter commands

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{required, scene_or_current, switch_state, Command, DispatchContext};
use crate::binding::{Binding, CommandKind};
use crate::drivers::{ControlledApp, ItemTransform};
use crate::error::{CommandError, DriverError};
use crate::midi::convert;

/// Temporary filter added to a source while it fades
pub const FADE_FILTER_NAME: &str = "obs-midi-gw fade";
pub const FADE_FILTER_KIND: &str = "color_filter_v2";
/// Opacity updates per fade
pub const FADE_STEPS: u32 = 20;
const DEFAULT_FADE_MS: i64 = 500;

pub(super) fn commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(FilterSwitch::Enable),
        Arc::new(FilterSwitch::Disable),
        Arc::new(FilterSwitch::Toggle),
        Arc::new(FilterSwitch::FromValue),
        Arc::new(Visibility::Toggle),
        Arc::new(Visibility::FromValue),
        Arc::new(Transform::Reset),
        Arc::new(Transform::Rotation),
        Arc::new(Transform::Scale),
        Arc::new(Transform::Position),
        Arc::new(SetOpacity),
        Arc::new(ToggleFadeSource),
        Arc::new(InputSetting::BrowserUrl),
        Arc::new(InputSetting::GdiText),
        Arc::new(ReloadBrowserSource),
        Arc::new(Screenshot::Program),
        Arc::new(Screenshot::Source),
    ]
}

enum FilterSwitch {
    Enable,
    Disable,
    Toggle,
    FromValue,
}

#[async_trait]
impl Command for FilterSwitch {
    fn kind(&self) -> CommandKind {
        match self {
            FilterSwitch::Enable => CommandKind::EnableSourceFilter,
            FilterSwitch::Disable => CommandKind::DisableSourceFilter,
            FilterSwitch::Toggle => CommandKind::ToggleSourceFilter,
            FilterSwitch::FromValue => CommandKind::SetSourceFilterVisibility,
        }
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        let filter = required(binding, &binding.filter, "filter")?;
        let enabled = match self {
            FilterSwitch::Enable => true,
            FilterSwitch::Disable => false,
            FilterSwitch::Toggle => !ctx.app.filter_enabled(source, filter).await?,
            FilterSwitch::FromValue => switch_state(binding),
        };
        ctx.app.set_filter_enabled(source, filter, enabled).await?;
        Ok(())
    }
}

enum Visibility {
    Toggle,
    FromValue,
}

#[async_trait]
impl Command for Visibility {
    fn kind(&self) -> CommandKind {
        match self {
            Visibility::Toggle => CommandKind::ToggleSourceVisibility,
            Visibility::FromValue => CommandKind::SetSceneItemRender,
        }
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        let scene = scene_or_current(binding, ctx).await?;
        let visible = match self {
            Visibility::Toggle => !ctx.app.scene_item_visible(&scene, source).await?,
            Visibility::FromValue => switch_state(binding),
        };
        ctx.app.set_scene_item_visible(&scene, source, visible).await?;
        Ok(())
    }
}

/// Scene item transforms driven by the binding value
enum Transform {
    /// Back to no rotation, unit scale
    Reset,
    /// Degrees in [range_min, range_max], default 0..360
    Rotation,
    /// X scale up to range_min, Y scale up to range_max, both default 1
    Scale,
    /// X up to range_min, Y up to range_max, default 1920x1080
    Position,
}

#[async_trait]
impl Command for Transform {
    fn kind(&self) -> CommandKind {
        match self {
            Transform::Reset => CommandKind::ResetSceneItem,
            Transform::Rotation => CommandKind::SetSourceRotation,
            Transform::Scale => CommandKind::SetSourceScale,
            Transform::Position => CommandKind::SetSourcePosition,
        }
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        let scene = scene_or_current(binding, ctx).await?;
        let value = binding.value();

        let transform = match self {
            Transform::Reset => ItemTransform {
                rotation: Some(0.0),
                scale: Some((1.0, 1.0)),
                ..Default::default()
            },
            Transform::Rotation => ItemTransform {
                rotation: Some(convert::map_to_range(
                    binding.range_min.unwrap_or(0.0),
                    binding.range_max.unwrap_or(360.0),
                    value,
                )),
                ..Default::default()
            },
            Transform::Scale => ItemTransform {
                scale: Some((
                    convert::map_to_range(0.0, binding.range_min.unwrap_or(1.0), value),
                    convert::map_to_range(0.0, binding.range_max.unwrap_or(1.0), value),
                )),
                ..Default::default()
            },
            Transform::Position => ItemTransform {
                position: Some((
                    convert::map_to_range(0.0, binding.range_min.unwrap_or(1920.0), value),
                    convert::map_to_range(0.0, binding.range_max.unwrap_or(1080.0), value),
                )),
                ..Default::default()
            },
        };

        ctx.app
            .set_scene_item_transform(&scene, source, transform)
            .await?;
        Ok(())
    }
}

/// Opacity of a color filter, value mapped to 0..1
struct SetOpacity;

#[async_trait]
impl Command for SetOpacity {
    fn kind(&self) -> CommandKind {
        CommandKind::SetOpacity
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        let filter = required(binding, &binding.filter, "filter")?;
        let opacity = convert::normalize(binding.value());
        ctx.app
            .set_filter_settings(source, filter, json!({ "opacity": opacity }))
            .await?;
        Ok(())
    }
}

/// Fade a scene item in if hidden, out if visible
///
/// The fade runs on a background task for `int_override` ms (default 500)
/// and stops early when the owning agent is closed.
struct ToggleFadeSource;

#[async_trait]
impl Command for ToggleFadeSource {
    fn kind(&self) -> CommandKind {
        CommandKind::ToggleFadeSource
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?.to_string();
        let scene = scene_or_current(binding, ctx).await?;
        let fade_in = !ctx.app.scene_item_visible(&scene, &source).await?;
        let total_ms = binding.int_override.filter(|ms| *ms > 0).unwrap_or(DEFAULT_FADE_MS);

        let fade = Fade {
            app: Arc::clone(&ctx.app),
            scene,
            source,
            fade_in,
            step: Duration::from_millis((total_ms as u64) / u64::from(FADE_STEPS)),
        };
        tokio::spawn(fade.run(ctx.cancel.clone()));
        Ok(())
    }
}

/// Values copied out of the binding for a detached fade
struct Fade {
    app: Arc<dyn ControlledApp>,
    scene: String,
    source: String,
    fade_in: bool,
    step: Duration,
}

impl Fade {
    async fn run(self, mut cancel: watch::Receiver<bool>) {
        if let Err(e) = self.fade(&mut cancel).await {
            warn!("Fade of '{}' failed: {}", self.source, e);
        }
        if let Err(e) = self.app.remove_filter(&self.source, FADE_FILTER_NAME).await {
            debug!("Could not remove fade filter from '{}': {}", self.source, e);
        }
    }

    async fn fade(&self, cancel: &mut watch::Receiver<bool>) -> Result<(), DriverError> {
        let start = if self.fade_in { 0.0 } else { 1.0 };
        self.app
            .add_filter(
                &self.source,
                FADE_FILTER_NAME,
                FADE_FILTER_KIND,
                json!({ "opacity": start }),
            )
            .await?;

        if self.fade_in {
            self.app
                .set_scene_item_visible(&self.scene, &self.source, true)
                .await?;
        }

        for i in 1..=FADE_STEPS {
            if *cancel.borrow() {
                debug!("Fade of '{}' cancelled", self.source);
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.step) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        debug!("Fade of '{}' cancelled", self.source);
                        return Ok(());
                    }
                }
            }

            let progress = f64::from(i) / f64::from(FADE_STEPS);
            let opacity = if self.fade_in { progress } else { 1.0 - progress };
            self.app
                .set_filter_settings(&self.source, FADE_FILTER_NAME, json!({ "opacity": opacity }))
                .await?;
        }

        if !self.fade_in {
            self.app
                .set_scene_item_visible(&self.scene, &self.source, false)
                .await?;
        }
        Ok(())
    }
}

/// Text-like input settings from `string_override`
enum InputSetting {
    BrowserUrl,
    GdiText,
}

#[async_trait]
impl Command for InputSetting {
    fn kind(&self) -> CommandKind {
        match self {
            InputSetting::BrowserUrl => CommandKind::SetBrowserSourceUrl,
            InputSetting::GdiText => CommandKind::SetTextGdiPlusText,
        }
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        let text = required(binding, &binding.string_override, "string_override")?;
        let settings = match self {
            InputSetting::BrowserUrl => json!({ "url": text }),
            InputSetting::GdiText => json!({ "text": text }),
        };
        ctx.app.set_input_settings(source, settings).await?;
        Ok(())
    }
}

struct ReloadBrowserSource;

#[async_trait]
impl Command for ReloadBrowserSource {
    fn kind(&self) -> CommandKind {
        CommandKind::ReloadBrowserSource
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = required(binding, &binding.source, "source")?;
        ctx.app.press_input_button(source, "refreshnocache").await?;
        Ok(())
    }
}

enum Screenshot {
    /// Current program scene
    Program,
    /// Named source, falling back to the binding's scene
    Source,
}

#[async_trait]
impl Command for Screenshot {
    fn kind(&self) -> CommandKind {
        match self {
            Screenshot::Program => CommandKind::TakeScreenshot,
            Screenshot::Source => CommandKind::TakeSourceScreenshot,
        }
    }

    async fn execute(&self, binding: &Binding, ctx: &DispatchContext) -> Result<(), CommandError> {
        let source = match self {
            Screenshot::Program => ctx.app.program_scene().await?,
            Screenshot::Source => match binding.source.as_deref().filter(|s| !s.is_empty()) {
                Some(source) => source.to_string(),
                None => required(binding, &binding.scene, "source")?.to_string(),
            },
        };
        let path = screenshot_path(binding.string_override.as_deref(), &source);
        ctx.app.save_screenshot(&source, &path).await?;
        Ok(())
    }
}

/// `dir` (or the pictures directory) joined with a timestamped file name
fn screenshot_path(dir: Option<&str>, source: &str) -> PathBuf {
    let dir = dir
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::picture_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let stamp = chrono::Local::now().format("%Y-%m-%d %H-%M-%S");
    let name: String = source
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("Screenshot {} {}.png", name, stamp))
}
