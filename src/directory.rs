//! Agent directory - every device's routing agent, keyed by device name
//!
//! Owns the agents' lifecycle (load, reload, attach, detach, shutdown),
//! fans OBS events out to every agent and persists binding changes.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::agent::{Engine, RoutingAgent};
use crate::config::{AppConfig, DeviceConfig, ObsConfig};
use crate::event::{ApplicationEvent, EventKind};
use crate::midi::Message;

pub struct AgentDirectory {
    engine: Engine,
    /// Insertion order is the order devices are saved in
    agents: RwLock<Vec<Arc<RoutingAgent>>>,
    obs: Mutex<ObsConfig>,
    config_path: Option<PathBuf>,
    /// Set by `shutdown`; a closed directory never leaves shutdown again
    closed: AtomicBool,
}

impl AgentDirectory {
    pub fn new(engine: Engine, config_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            agents: RwLock::new(Vec::new()),
            obs: Mutex::new(ObsConfig::default()),
            config_path,
            closed: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Replace every agent with the devices in `config`
    ///
    /// Old agents are closed before the new ones open their ports.
    pub fn load(&self, config: &AppConfig) {
        let previous = std::mem::take(&mut *self.agents.write());
        for agent in &previous {
            agent.close();
        }

        *self.obs.lock() = config.obs.clone();
        let agents: Vec<Arc<RoutingAgent>> = config
            .devices
            .iter()
            .map(|device| RoutingAgent::spawn(device, self.engine.clone()))
            .collect();

        info!("Loaded {} devices", agents.len());
        *self.agents.write() = agents;
    }

    /// Re-read the config file and rebuild all agents
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            debug!("No config file, nothing to reload");
            return Ok(());
        };
        let config = AppConfig::load(path).await?;
        self.load(&config);
        Ok(())
    }

    /// Current devices and bindings as a config document
    pub fn snapshot(&self) -> AppConfig {
        AppConfig {
            obs: self.obs.lock().clone(),
            devices: self.agents().iter().map(|a| a.to_config()).collect(),
        }
    }

    /// Write the current state to the config file, if there is one
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        self.snapshot()
            .save(path)
            .await
            .with_context(|| format!("Failed to save bindings to {}", path.display()))
    }

    /// Add an agent for a newly connected device
    pub fn attach(&self, device: DeviceConfig) -> Result<Arc<RoutingAgent>> {
        if self.agent(&device.name).is_some() {
            anyhow::bail!("Device '{}' is already attached", device.name);
        }
        let agent = RoutingAgent::spawn(&device, self.engine.clone());
        self.agents.write().push(Arc::clone(&agent));
        Ok(agent)
    }

    /// Close and forget the agent for `name`
    pub fn detach(&self, name: &str) -> bool {
        let removed = {
            let mut agents = self.agents.write();
            agents
                .iter()
                .position(|a| a.name() == name)
                .map(|idx| agents.remove(idx))
        };
        match removed {
            Some(agent) => {
                agent.close();
                true
            }
            None => false,
        }
    }

    pub fn agent(&self, name: &str) -> Option<Arc<RoutingAgent>> {
        self.agents.read().iter().find(|a| a.name() == name).cloned()
    }

    /// Snapshot of the agents, so no lock is held while they run
    pub fn agents(&self) -> Vec<Arc<RoutingAgent>> {
        self.agents.read().clone()
    }

    pub fn device_names(&self) -> Vec<String> {
        self.agents.read().iter().map(|a| a.name().to_string()).collect()
    }

    /// Dispatch a message as if it came from `device`'s input
    pub async fn on_inbound(&self, device: &str, message: Message) {
        match self.agent(device) {
            Some(agent) => agent.on_inbound(message).await,
            None => debug!("Message for unknown device '{}': {}", device, message),
        }
    }

    /// Apply process-wide effects of `event`, then hand it to every agent
    pub async fn broadcast(&self, event: &ApplicationEvent) {
        let state = &self.engine.state;
        match event.kind {
            EventKind::Exiting => {
                info!("OBS is exiting");
                state.set_shutting_down();
                state.set_app_ready(false);
                state.set_transitioning(false);
            }
            EventKind::TransitionBegin => state.set_transitioning(true),
            EventKind::TransitionEnd => state.set_transitioning(false),
            EventKind::FinishedLoading => {
                // A transition cut off by a disconnect never reports its end
                state.set_transitioning(false);
                state.set_app_ready(true);
                if !self.closed.load(Ordering::SeqCst) {
                    state.clear_shutting_down();
                }
            }
            EventKind::ProfileChanged | EventKind::SceneCollectionChanged => {
                info!("{:?}, reloading bindings", event.kind);
                if let Err(e) = self.reload().await {
                    warn!("Reload failed, keeping current bindings: {:#}", e);
                }
                return;
            }
            _ => {}
        }

        let mut changed = false;
        for agent in self.agents() {
            changed |= agent.on_application_event(event).await;
        }

        if changed {
            if let Err(e) = self.save().await {
                warn!("{:#}", e);
            }
        }
    }

    pub fn subscribe_monitor(&self) -> broadcast::Receiver<Message> {
        self.engine.monitor.subscribe()
    }

    /// Flag shutdown, then close every agent
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.engine.state.set_shutting_down();
        let agents = std::mem::take(&mut *self.agents.write());
        for agent in &agents {
            agent.close();
        }
        info!("Closed {} devices", agents.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{Binding, CommandKind};
    use crate::drivers::ControlledApp;
    use crate::midi::MessageKind;
    use crate::testing::{MockTransport, RecordingApp};
    use crate::transport::Transport;
    use tempfile::TempDir;

    fn mute(device: &str, index: u8, source: &str) -> Binding {
        Binding {
            audio_source: Some(source.into()),
            ..Binding::new(device, MessageKind::NoteOn, index, 0, CommandKind::ToggleMute)
        }
    }

    fn scene(device: &str, index: u8, name: &str) -> Binding {
        Binding {
            scene: Some(name.into()),
            ..Binding::new(device, MessageKind::NoteOn, index, 0, CommandKind::SetCurrentScene)
        }
    }

    fn device(name: &str, hooks: Vec<Binding>) -> DeviceConfig {
        DeviceConfig {
            enabled: true,
            bidirectional: true,
            hooks,
            ..DeviceConfig::new(name)
        }
    }

    fn directory(
        config_path: Option<PathBuf>,
    ) -> (AgentDirectory, Arc<RecordingApp>, Arc<MockTransport>) {
        let app = RecordingApp::new();
        let transport = MockTransport::new();
        let dyn_app: Arc<dyn ControlledApp> = app.clone();
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let engine = Engine::new(dyn_app, dyn_transport);
        engine.state.set_app_ready(true);
        (AgentDirectory::new(engine, config_path), app, transport)
    }

    fn two_devices() -> AppConfig {
        AppConfig {
            devices: vec![
                device("A", vec![scene("A", 1, "Intro"), mute("A", 2, "Mic")]),
                device("B", vec![scene("B", 5, "Intro")]),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_creates_agents_in_order() {
        let (dir, _app, _) = directory(None);
        dir.load(&two_devices());

        assert_eq!(dir.device_names(), vec!["A", "B"]);
        assert_eq!(dir.agent("A").unwrap().bindings()[0].device_id, "A");
        assert!(dir.agent("C").is_none());
    }

    #[tokio::test]
    async fn test_reload_closes_previous_agents() {
        let (dir, _app, _) = directory(None);
        dir.load(&two_devices());
        let old = dir.agent("A").unwrap();

        dir.load(&AppConfig {
            devices: vec![device("C", Vec::new())],
            ..Default::default()
        });

        assert!(!old.is_input_open());
        assert_eq!(dir.device_names(), vec!["C"]);
    }

    #[tokio::test]
    async fn test_attach_rejects_duplicates_and_detach_closes() {
        let (dir, _app, _) = directory(None);
        let agent = dir.attach(device("A", Vec::new())).unwrap();

        assert!(dir.attach(device("A", Vec::new())).is_err());
        assert!(dir.detach("A"));
        assert!(!dir.detach("A"));
        assert!(!agent.is_input_open());
    }

    #[tokio::test]
    async fn test_inbound_routes_to_named_device_only() {
        let (dir, app, _) = directory(None);
        dir.load(&AppConfig {
            devices: vec![
                device("A", vec![mute("A", 1, "Mic")]),
                device("B", vec![mute("B", 1, "Desktop")]),
            ],
            ..Default::default()
        });

        dir.on_inbound("B", Message::new(MessageKind::NoteOn, 1, 0, 127))
            .await;
        dir.on_inbound("Z", Message::new(MessageKind::NoteOn, 1, 0, 127))
            .await;

        assert_eq!(app.calls(), vec!["toggle_mute(Desktop)"]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_agent() {
        let (dir, _app, transport) = directory(None);
        dir.load(&two_devices());

        dir.broadcast(&ApplicationEvent::scene_changed("Intro")).await;

        assert_eq!(transport.sent("A"), vec![[0x90, 1, 127]]);
        assert_eq!(transport.sent("B"), vec![[0x90, 5, 127]]);
    }

    #[tokio::test]
    async fn test_transition_flags_follow_events() {
        let (dir, _app, _) = directory(None);

        dir.broadcast(&ApplicationEvent::new(EventKind::TransitionBegin))
            .await;
        assert!(dir.engine().state.is_transitioning());
        dir.broadcast(&ApplicationEvent::new(EventKind::TransitionEnd))
            .await;
        assert!(!dir.engine().state.is_transitioning());
    }

    #[tokio::test]
    async fn test_exiting_blocks_removal() {
        let (dir, _app, _) = directory(None);
        dir.load(&two_devices());

        dir.broadcast(&ApplicationEvent::new(EventKind::Exiting)).await;
        dir.broadcast(&ApplicationEvent::source_removed("Mic")).await;

        assert_eq!(dir.agent("A").unwrap().bindings().len(), 2);
    }

    #[tokio::test]
    async fn test_reconnect_after_exit_resumes() {
        let (dir, _app, _) = directory(None);
        dir.load(&two_devices());

        dir.broadcast(&ApplicationEvent::new(EventKind::Exiting)).await;
        assert!(!dir.engine().state.is_app_ready());
        dir.broadcast(&ApplicationEvent::new(EventKind::FinishedLoading))
            .await;

        assert!(!dir.engine().state.is_shutting_down());
        dir.broadcast(&ApplicationEvent::source_removed("Mic")).await;
        assert_eq!(dir.agent("A").unwrap().bindings().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_mid_transition_allows_transitions() {
        let (dir, app, _) = directory(None);
        let transition = Binding {
            scene: Some("Main".into()),
            ..Binding::new("A", MessageKind::NoteOn, 9, 0, CommandKind::DoTransition)
        };
        dir.load(&AppConfig {
            devices: vec![device("A", vec![transition])],
            ..Default::default()
        });

        dir.broadcast(&ApplicationEvent::new(EventKind::TransitionBegin))
            .await;
        dir.broadcast(&ApplicationEvent::new(EventKind::Exiting)).await;
        dir.broadcast(&ApplicationEvent::new(EventKind::FinishedLoading))
            .await;

        assert!(!dir.engine().state.is_transitioning());
        app.clear_calls();
        dir.on_inbound("A", Message::new(MessageKind::NoteOn, 9, 0, 127))
            .await;
        assert_eq!(app.calls(), vec!["set_program_scene(Main)"]);
    }

    #[tokio::test]
    async fn test_fader_moves_after_save_keep_snapshot_equal_to_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let (dir, _app, _) = directory(Some(path.clone()));
        let fader = Binding {
            audio_source: Some("Mic".into()),
            ..Binding::new("A", MessageKind::ControlChange, 7, 0, CommandKind::SetVolume)
        };
        dir.load(&AppConfig {
            devices: vec![device("A", vec![fader])],
            ..Default::default()
        });

        dir.save().await?;
        dir.on_inbound("A", Message::new(MessageKind::ControlChange, 7, 0, 40))
            .await;

        assert_eq!(dir.agent("A").unwrap().bindings()[0].last_value, Some(40));
        assert_eq!(AppConfig::load(&path).await?, dir.snapshot());
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_is_saved() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let (dir, _app, _) = directory(Some(path.clone()));
        dir.load(&two_devices());

        dir.broadcast(&ApplicationEvent::source_renamed("Mic", "Voice"))
            .await;

        let saved = AppConfig::load(&path).await?;
        assert_eq!(saved.devices.len(), 2);
        assert_eq!(saved.devices[0].hooks[1].audio_source.as_deref(), Some("Voice"));
        assert!(saved.devices[0].enabled);
        Ok(())
    }

    #[tokio::test]
    async fn test_saved_config_reloads_to_equal_bindings() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        let (dir, _app, _) = directory(Some(path.clone()));
        dir.load(&two_devices());
        let before = dir.agent("A").unwrap().bindings();

        dir.save().await?;
        dir.reload().await?;

        assert_eq!(dir.agent("A").unwrap().bindings(), before);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_flags_and_closes() {
        let (dir, _app, _) = directory(None);
        dir.load(&two_devices());
        let agent = dir.agent("B").unwrap();

        dir.shutdown();

        assert!(dir.engine().state.is_shutting_down());
        assert!(dir.device_names().is_empty());
        assert!(!agent.is_output_open());

        dir.broadcast(&ApplicationEvent::new(EventKind::FinishedLoading))
            .await;
        assert!(dir.engine().state.is_shutting_down());
    }
}
