//! Test doubles for the application and transport boundaries

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::commands::{DispatchContext, EngineState};
use crate::drivers::{
    ControlledApp, DriverResult, ItemTransform, MediaAction, MediaState, Output, OutputAction,
};
use crate::error::{DriverError, TransportError};
use crate::midi::Message;
use crate::transport::{InputConnection, OutputConnection, Transport};

#[derive(Default)]
struct AppState {
    studio_mode: bool,
    program_scene: String,
    preview_scene: String,
    volumes: HashMap<String, f64>,
    muted: HashMap<String, bool>,
    active_outputs: HashSet<String>,
    filters: HashMap<(String, String), bool>,
    visible: HashMap<(String, String), bool>,
    media: HashMap<String, MediaState>,
}

/// In-memory application that records every mutating call
#[derive(Default)]
pub struct RecordingApp {
    calls: Mutex<Vec<String>>,
    missing: Mutex<HashSet<String>>,
    state: Mutex<AppState>,
}

impl RecordingApp {
    pub fn new() -> Arc<Self> {
        let app = Self::default();
        app.state.lock().program_scene = "Scene".to_string();
        Arc::new(app)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Any request naming `name` fails with not found
    pub fn remove_entity(&self, name: &str) {
        self.missing.lock().insert(name.to_string());
    }

    pub fn set_studio_mode_state(&self, enabled: bool) {
        self.state.lock().studio_mode = enabled;
    }

    pub fn set_preview_scene_state(&self, scene: &str) {
        self.state.lock().preview_scene = scene.to_string();
    }

    pub fn set_volume_state(&self, source: &str, level: f64) {
        self.state.lock().volumes.insert(source.to_string(), level);
    }

    pub fn set_output_state(&self, output: Output, active: bool) {
        let mut state = self.state.lock();
        let key = format!("{:?}", output);
        if active {
            state.active_outputs.insert(key);
        } else {
            state.active_outputs.remove(&key);
        }
    }

    pub fn set_visible_state(&self, scene: &str, source: &str, visible: bool) {
        self.state
            .lock()
            .visible
            .insert((scene.to_string(), source.to_string()), visible);
    }

    pub fn set_filter_state(&self, source: &str, filter: &str, enabled: bool) {
        self.state
            .lock()
            .filters
            .insert((source.to_string(), filter.to_string()), enabled);
    }

    pub fn set_media_state(&self, source: &str, media: MediaState) {
        self.state.lock().media.insert(source.to_string(), media);
    }

    fn check(&self, kind: &'static str, names: &[&str]) -> DriverResult<()> {
        let missing = self.missing.lock();
        match names.iter().find(|name| missing.contains(**name)) {
            Some(name) => Err(DriverError::not_found(kind, *name)),
            None => Ok(()),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ControlledApp for RecordingApp {
    async fn program_scene(&self) -> DriverResult<String> {
        Ok(self.state.lock().program_scene.clone())
    }

    async fn set_program_scene(&self, scene: &str) -> DriverResult<()> {
        self.check("scene", &[scene])?;
        self.state.lock().program_scene = scene.to_string();
        self.record(format!("set_program_scene({})", scene));
        Ok(())
    }

    async fn preview_scene(&self) -> DriverResult<String> {
        Ok(self.state.lock().preview_scene.clone())
    }

    async fn set_preview_scene(&self, scene: &str) -> DriverResult<()> {
        self.check("scene", &[scene])?;
        self.state.lock().preview_scene = scene.to_string();
        self.record(format!("set_preview_scene({})", scene));
        Ok(())
    }

    async fn studio_mode(&self) -> DriverResult<bool> {
        Ok(self.state.lock().studio_mode)
    }

    async fn set_studio_mode(&self, enabled: bool) -> DriverResult<()> {
        self.state.lock().studio_mode = enabled;
        self.record(format!("set_studio_mode({})", enabled));
        Ok(())
    }

    async fn set_current_transition(&self, transition: &str) -> DriverResult<()> {
        self.check("transition", &[transition])?;
        self.record(format!("set_current_transition({})", transition));
        Ok(())
    }

    async fn set_transition_duration(&self, millis: u32) -> DriverResult<()> {
        self.record(format!("set_transition_duration({})", millis));
        Ok(())
    }

    async fn trigger_transition(&self) -> DriverResult<()> {
        self.record("trigger_transition".to_string());
        Ok(())
    }

    async fn set_tbar_position(&self, position: f64) -> DriverResult<()> {
        self.record(format!("set_tbar_position({:.3})", position));
        Ok(())
    }

    async fn set_scene_collection(&self, collection: &str) -> DriverResult<()> {
        self.check("scene collection", &[collection])?;
        self.record(format!("set_scene_collection({})", collection));
        Ok(())
    }

    async fn set_profile(&self, profile: &str) -> DriverResult<()> {
        self.check("profile", &[profile])?;
        self.record(format!("set_profile({})", profile));
        Ok(())
    }

    async fn volume(&self, source: &str) -> DriverResult<f64> {
        self.check("input", &[source])?;
        Ok(self.state.lock().volumes.get(source).copied().unwrap_or(1.0))
    }

    async fn set_volume(&self, source: &str, level: f64) -> DriverResult<()> {
        self.check("input", &[source])?;
        self.record(format!("set_volume({}, {:.6})", source, level));
        Ok(())
    }

    async fn toggle_mute(&self, source: &str) -> DriverResult<bool> {
        self.check("input", &[source])?;
        let muted = {
            let mut state = self.state.lock();
            let muted = state.muted.entry(source.to_string()).or_insert(false);
            *muted = !*muted;
            *muted
        };
        self.record(format!("toggle_mute({})", source));
        Ok(muted)
    }

    async fn set_muted(&self, source: &str, muted: bool) -> DriverResult<()> {
        self.check("input", &[source])?;
        self.state.lock().muted.insert(source.to_string(), muted);
        self.record(format!("set_muted({}, {})", source, muted));
        Ok(())
    }

    async fn set_sync_offset(&self, source: &str, millis: i64) -> DriverResult<()> {
        self.check("input", &[source])?;
        self.record(format!("set_sync_offset({}, {})", source, millis));
        Ok(())
    }

    async fn output_active(&self, output: Output) -> DriverResult<bool> {
        Ok(self
            .state
            .lock()
            .active_outputs
            .contains(&format!("{:?}", output)))
    }

    async fn output_action(&self, output: Output, action: OutputAction) -> DriverResult<()> {
        self.record(format!("output_action({:?}, {:?})", output, action));
        Ok(())
    }

    async fn filter_enabled(&self, source: &str, filter: &str) -> DriverResult<bool> {
        self.check("filter", &[source, filter])?;
        Ok(self
            .state
            .lock()
            .filters
            .get(&(source.to_string(), filter.to_string()))
            .copied()
            .unwrap_or(true))
    }

    async fn set_filter_enabled(&self, source: &str, filter: &str, enabled: bool) -> DriverResult<()> {
        self.check("filter", &[source, filter])?;
        self.record(format!("set_filter_enabled({}, {}, {})", source, filter, enabled));
        Ok(())
    }

    async fn set_filter_settings(&self, source: &str, filter: &str, settings: Value) -> DriverResult<()> {
        self.check("filter", &[source, filter])?;
        self.record(format!("set_filter_settings({}, {}, {})", source, filter, settings));
        Ok(())
    }

    async fn add_filter(&self, source: &str, filter: &str, kind: &str, _settings: Value) -> DriverResult<()> {
        self.check("source", &[source])?;
        self.record(format!("add_filter({}, {}, {})", source, filter, kind));
        Ok(())
    }

    async fn remove_filter(&self, source: &str, filter: &str) -> DriverResult<()> {
        self.check("source", &[source])?;
        self.record(format!("remove_filter({}, {})", source, filter));
        Ok(())
    }

    async fn scene_item_visible(&self, scene: &str, source: &str) -> DriverResult<bool> {
        self.check("scene item", &[scene, source])?;
        Ok(self
            .state
            .lock()
            .visible
            .get(&(scene.to_string(), source.to_string()))
            .copied()
            .unwrap_or(true))
    }

    async fn set_scene_item_visible(&self, scene: &str, source: &str, visible: bool) -> DriverResult<()> {
        self.check("scene item", &[scene, source])?;
        self.state
            .lock()
            .visible
            .insert((scene.to_string(), source.to_string()), visible);
        self.record(format!("set_scene_item_visible({}, {}, {})", scene, source, visible));
        Ok(())
    }

    async fn set_scene_item_transform(
        &self,
        scene: &str,
        source: &str,
        transform: ItemTransform,
    ) -> DriverResult<()> {
        self.check("scene item", &[scene, source])?;
        self.record(format!(
            "set_scene_item_transform({}, {}, {:?})",
            scene, source, transform
        ));
        Ok(())
    }

    async fn set_input_settings(&self, input: &str, settings: Value) -> DriverResult<()> {
        self.check("input", &[input])?;
        self.record(format!("set_input_settings({}, {})", input, settings));
        Ok(())
    }

    async fn press_input_button(&self, input: &str, property: &str) -> DriverResult<()> {
        self.check("input", &[input])?;
        self.record(format!("press_input_button({}, {})", input, property));
        Ok(())
    }

    async fn save_screenshot(&self, source: &str, path: &Path) -> DriverResult<()> {
        self.check("source", &[source])?;
        self.record(format!("save_screenshot({}, {})", source, path.display()));
        Ok(())
    }

    async fn media_state(&self, source: &str) -> DriverResult<MediaState> {
        self.check("media source", &[source])?;
        Ok(self
            .state
            .lock()
            .media
            .get(source)
            .copied()
            .unwrap_or(MediaState::Stopped))
    }

    async fn media_action(&self, source: &str, action: MediaAction) -> DriverResult<()> {
        self.check("media source", &[source])?;
        self.record(format!("media_action({}, {:?})", source, action));
        Ok(())
    }

    async fn trigger_hotkey(&self, name: &str) -> DriverResult<()> {
        self.check("hotkey", &[name])?;
        self.record(format!("trigger_hotkey({})", name));
        Ok(())
    }
}

/// Dispatch context over `app`; keep the sender alive for the test's duration
pub fn context(app: &Arc<RecordingApp>) -> (DispatchContext, watch::Sender<bool>) {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let app: Arc<dyn ControlledApp> = app.clone();
    let ctx = DispatchContext {
        app,
        engine: Arc::new(EngineState::default()),
        cancel: cancel_rx,
    };
    (ctx, cancel_tx)
}

/// Transport whose ports exist unless marked missing
#[derive(Default)]
pub struct MockTransport {
    inputs: Mutex<HashMap<String, mpsc::Sender<Message>>>,
    sent: Arc<Mutex<Vec<(String, [u8; 3])>>>,
    missing: Mutex<HashSet<String>>,
    input_opens: AtomicUsize,
    output_opens: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn remove_port(&self, port: &str) {
        self.missing.lock().insert(port.to_string());
    }

    /// Deliver raw bytes on `port` as the MIDI callback would
    pub fn inject(&self, port: &str, data: &[u8]) -> bool {
        let inputs = self.inputs.lock();
        match (inputs.get(port), Message::parse(data, port)) {
            (Some(tx), Some(message)) => tx.try_send(message).is_ok(),
            _ => false,
        }
    }

    /// Raw messages sent on `port`, in order
    pub fn sent(&self, port: &str) -> Vec<[u8; 3]> {
        self.sent
            .lock()
            .iter()
            .filter(|(p, _)| p == port)
            .map(|(_, bytes)| *bytes)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    pub fn input_opens(&self) -> usize {
        self.input_opens.load(Ordering::SeqCst)
    }

    pub fn output_opens(&self) -> usize {
        self.output_opens.load(Ordering::SeqCst)
    }

    fn check(&self, port: &str) -> Result<(), TransportError> {
        if self.missing.lock().contains(port) {
            Err(TransportError::PortNotFound(port.to_string()))
        } else {
            Ok(())
        }
    }
}

struct MockOutput {
    port: String,
    sent: Arc<Mutex<Vec<(String, [u8; 3])>>>,
}

impl OutputConnection for MockOutput {
    fn port(&self) -> &str {
        &self.port
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut raw = [0u8; 3];
        for (dst, src) in raw.iter_mut().zip(bytes) {
            *dst = *src;
        }
        self.sent.lock().push((self.port.clone(), raw));
        Ok(())
    }
}

impl Transport for MockTransport {
    fn input_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.inputs.lock().keys().cloned().collect())
    }

    fn output_ports(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    fn open_input(&self, port: &str, tx: mpsc::Sender<Message>) -> Result<InputConnection, TransportError> {
        self.check(port)?;
        self.input_opens.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().insert(port.to_string(), tx);
        Ok(InputConnection::new(port.to_string(), ()))
    }

    fn open_output(&self, port: &str) -> Result<Box<dyn OutputConnection>, TransportError> {
        self.check(port)?;
        self.output_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockOutput {
            port: port.to_string(),
            sent: Arc::clone(&self.sent),
        }))
    }
}
