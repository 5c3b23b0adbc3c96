//! `ControlledApp` over obs-websocket requests

use async_trait::async_trait;
use obws::requests::scene_items::{Position, Scale, SceneItemTransform};
use obws::responses::StatusCode;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, trace};

use super::driver::ObsDriver;
use crate::drivers::{
    ControlledApp, DriverResult, ItemTransform, MediaAction, MediaState, Output, OutputAction,
};
use crate::error::DriverError;

/// Map a request error; a missing resource becomes `NotFound` for `name`
fn request_error<'a>(kind: &'static str, name: &'a str) -> impl FnOnce(obws::Error) -> DriverError + 'a {
    move |e| match e {
        obws::Error::Api {
            code: StatusCode::ResourceNotFound,
            ..
        } => DriverError::not_found(kind, name),
        other => DriverError::Request(other.to_string()),
    }
}

fn other_error(e: obws::Error) -> DriverError {
    DriverError::Request(e.to_string())
}

impl ObsDriver {
    /// Scene item id for a source in a scene, cached per connection
    async fn item_id(&self, scene: &str, source: &str) -> DriverResult<i64> {
        let cache_key = format!("{}::{}", scene, source);
        if let Some(&id) = self.item_id_cache.read().get(&cache_key) {
            trace!("OBS item ID cache hit: {} -> {}", cache_key, id);
            return Ok(id);
        }

        let client = self.client().await?;
        let id = client
            .scene_items()
            .id(obws::requests::scene_items::Id {
                scene,
                source,
                search_offset: None,
            })
            .await
            .map_err(request_error("scene item", source))?;

        self.item_id_cache.write().insert(cache_key, id);
        Ok(id)
    }
}

#[async_trait]
impl ControlledApp for ObsDriver {
    async fn program_scene(&self) -> DriverResult<String> {
        let client = self.client().await?;
        client
            .scenes()
            .current_program_scene()
            .await
            .map_err(other_error)
    }

    async fn set_program_scene(&self, scene: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .scenes()
            .set_current_program_scene(scene)
            .await
            .map_err(request_error("scene", scene))
    }

    async fn preview_scene(&self) -> DriverResult<String> {
        let client = self.client().await?;
        client
            .scenes()
            .current_preview_scene()
            .await
            .map_err(other_error)
    }

    async fn set_preview_scene(&self, scene: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .scenes()
            .set_current_preview_scene(scene)
            .await
            .map_err(request_error("scene", scene))
    }

    async fn studio_mode(&self) -> DriverResult<bool> {
        let client = self.client().await?;
        client.ui().studio_mode_enabled().await.map_err(other_error)
    }

    async fn set_studio_mode(&self, enabled: bool) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .ui()
            .set_studio_mode_enabled(enabled)
            .await
            .map_err(other_error)
    }

    async fn set_current_transition(&self, transition: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .transitions()
            .set_current(transition)
            .await
            .map_err(request_error("transition", transition))
    }

    async fn set_transition_duration(&self, millis: u32) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .transitions()
            .set_current_duration(time::Duration::milliseconds(i64::from(millis)))
            .await
            .map_err(other_error)
    }

    async fn trigger_transition(&self) -> DriverResult<()> {
        let client = self.client().await?;
        client.transitions().trigger().await.map_err(other_error)
    }

    async fn set_tbar_position(&self, position: f64) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .transitions()
            .set_tbar_position(position as f32, None)
            .await
            .map_err(other_error)
    }

    async fn set_scene_collection(&self, collection: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .scene_collections()
            .set_current(collection)
            .await
            .map_err(request_error("scene collection", collection))
    }

    async fn set_profile(&self, profile: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .profiles()
            .set_current(profile)
            .await
            .map_err(request_error("profile", profile))
    }

    async fn volume(&self, source: &str) -> DriverResult<f64> {
        let client = self.client().await?;
        let volume = client
            .inputs()
            .volume(source)
            .await
            .map_err(request_error("input", source))?;
        Ok(f64::from(volume.mul))
    }

    async fn set_volume(&self, source: &str, level: f64) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .inputs()
            .set_volume(source, obws::requests::inputs::Volume::Mul(level as f32))
            .await
            .map_err(request_error("input", source))
    }

    async fn toggle_mute(&self, source: &str) -> DriverResult<bool> {
        let client = self.client().await?;
        client
            .inputs()
            .toggle_mute(source)
            .await
            .map_err(request_error("input", source))
    }

    async fn set_muted(&self, source: &str, muted: bool) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .inputs()
            .set_muted(source, muted)
            .await
            .map_err(request_error("input", source))
    }

    async fn set_sync_offset(&self, source: &str, millis: i64) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .inputs()
            .set_audio_sync_offset(source, time::Duration::milliseconds(millis))
            .await
            .map_err(request_error("input", source))
    }

    async fn output_active(&self, output: Output) -> DriverResult<bool> {
        let client = self.client().await?;
        let active = match output {
            Output::Stream => client.streaming().status().await.map(|s| s.active),
            Output::Record => client.recording().status().await.map(|s| s.active),
            Output::ReplayBuffer => client.replay_buffer().status().await,
        };
        active.map_err(other_error)
    }

    async fn output_action(&self, output: Output, action: OutputAction) -> DriverResult<()> {
        let client = self.client().await?;
        debug!("OBS {:?} {:?}", output, action);

        let result = match (output, action) {
            (Output::Stream, OutputAction::Toggle) => client.streaming().toggle().await.map(drop),
            (Output::Stream, OutputAction::Start) => client.streaming().start().await,
            (Output::Stream, OutputAction::Stop) => client.streaming().stop().await,
            (Output::Record, OutputAction::Toggle) => client.recording().toggle().await.map(drop),
            (Output::Record, OutputAction::Start) => client.recording().start().await,
            (Output::Record, OutputAction::Stop) => client.recording().stop().await.map(drop),
            (Output::Record, OutputAction::Pause) => client.recording().pause().await,
            (Output::Record, OutputAction::Resume) => client.recording().resume().await,
            (Output::ReplayBuffer, OutputAction::Toggle) => {
                client.replay_buffer().toggle().await.map(drop)
            }
            (Output::ReplayBuffer, OutputAction::Start) => client.replay_buffer().start().await,
            (Output::ReplayBuffer, OutputAction::Stop) => client.replay_buffer().stop().await,
            (Output::ReplayBuffer, OutputAction::Save) => client.replay_buffer().save().await,
            (output, action) => {
                return Err(DriverError::Request(format!(
                    "{:?} does not support {:?}",
                    output, action
                )))
            }
        };
        result.map_err(other_error)
    }

    async fn filter_enabled(&self, source: &str, filter: &str) -> DriverResult<bool> {
        let client = self.client().await?;
        let found = client
            .filters()
            .get(source, filter)
            .await
            .map_err(request_error("filter", filter))?;
        Ok(found.enabled)
    }

    async fn set_filter_enabled(&self, source: &str, filter: &str, enabled: bool) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .filters()
            .set_enabled(obws::requests::filters::SetEnabled {
                source,
                filter,
                enabled,
            })
            .await
            .map_err(request_error("filter", filter))
    }

    async fn set_filter_settings(&self, source: &str, filter: &str, settings: Value) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .filters()
            .set_settings(obws::requests::filters::SetSettings {
                source,
                filter,
                settings: &settings,
                overlay: Some(true),
            })
            .await
            .map_err(request_error("filter", filter))
    }

    async fn add_filter(&self, source: &str, filter: &str, kind: &str, settings: Value) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .filters()
            .create(obws::requests::filters::Create {
                source,
                filter,
                kind,
                settings: Some(&settings),
            })
            .await
            .map_err(request_error("source", source))
    }

    async fn remove_filter(&self, source: &str, filter: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .filters()
            .remove(source, filter)
            .await
            .map_err(request_error("filter", filter))
    }

    async fn scene_item_visible(&self, scene: &str, source: &str) -> DriverResult<bool> {
        let item_id = self.item_id(scene, source).await?;
        let client = self.client().await?;
        client
            .scene_items()
            .enabled(scene, item_id)
            .await
            .map_err(request_error("scene item", source))
    }

    async fn set_scene_item_visible(&self, scene: &str, source: &str, visible: bool) -> DriverResult<()> {
        let item_id = self.item_id(scene, source).await?;
        let client = self.client().await?;
        client
            .scene_items()
            .set_enabled(obws::requests::scene_items::SetEnabled {
                scene,
                item_id,
                enabled: visible,
            })
            .await
            .map_err(request_error("scene item", source))
    }

    async fn set_scene_item_transform(
        &self,
        scene: &str,
        source: &str,
        transform: ItemTransform,
    ) -> DriverResult<()> {
        let item_id = self.item_id(scene, source).await?;

        let mut obs_transform = SceneItemTransform::default();
        if let Some((x, y)) = transform.position {
            obs_transform.position = Some(Position {
                x: Some(x as f32),
                y: Some(y as f32),
                ..Default::default()
            });
        }
        obs_transform.rotation = transform.rotation.map(|r| r as f32);
        if let Some((x, y)) = transform.scale {
            obs_transform.scale = Some(Scale {
                x: Some(x as f32),
                y: Some(y as f32),
                ..Default::default()
            });
        }

        let client = self.client().await?;
        client
            .scene_items()
            .set_transform(obws::requests::scene_items::SetTransform {
                scene,
                item_id,
                transform: obs_transform,
            })
            .await
            .map_err(request_error("scene item", source))
    }

    async fn set_input_settings(&self, input: &str, settings: Value) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .inputs()
            .set_settings(obws::requests::inputs::SetSettings {
                input,
                settings: &settings,
                overlay: Some(true),
            })
            .await
            .map_err(request_error("input", input))
    }

    async fn press_input_button(&self, input: &str, property: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .inputs()
            .press_properties_button(input, property)
            .await
            .map_err(request_error("input", input))
    }

    async fn save_screenshot(&self, source: &str, path: &Path) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .sources()
            .save_screenshot(obws::requests::sources::SaveScreenshot {
                source,
                format: "png",
                file_path: path,
                width: None,
                height: None,
                compression_quality: None,
            })
            .await
            .map_err(request_error("source", source))?;
        debug!("Screenshot of '{}' saved to {}", source, path.display());
        Ok(())
    }

    async fn media_state(&self, source: &str) -> DriverResult<MediaState> {
        use obws::responses::media_inputs::MediaState as ObsState;

        let client = self.client().await?;
        let status = client
            .media_inputs()
            .status(source)
            .await
            .map_err(request_error("media source", source))?;
        Ok(match status.state {
            ObsState::Playing => MediaState::Playing,
            ObsState::Paused => MediaState::Paused,
            ObsState::Stopped => MediaState::Stopped,
            ObsState::Ended => MediaState::Ended,
            _ => MediaState::Other,
        })
    }

    async fn media_action(&self, source: &str, action: MediaAction) -> DriverResult<()> {
        use obws::common::MediaAction as ObsAction;

        let obs_action = match action {
            MediaAction::Play => ObsAction::Play,
            MediaAction::Pause => ObsAction::Pause,
            MediaAction::Restart => ObsAction::Restart,
            MediaAction::Stop => ObsAction::Stop,
            MediaAction::Next => ObsAction::Next,
            MediaAction::Previous => ObsAction::Previous,
        };
        let client = self.client().await?;
        client
            .media_inputs()
            .trigger_action(source, obs_action)
            .await
            .map_err(request_error("media source", source))
    }

    async fn trigger_hotkey(&self, name: &str) -> DriverResult<()> {
        let client = self.client().await?;
        client
            .hotkeys()
            .trigger_by_name(name)
            .await
            .map_err(request_error("hotkey", name))
    }
}
