//! OBS Driver core struct and initialization

use obws::Client as ObsClient;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::config::ObsConfig;
use crate::event::ApplicationEvent;

/// OBS Studio WebSocket driver
///
/// Cheap to clone for background tasks: every piece of state is shared.
pub struct ObsDriver {
    pub(super) host: String,
    pub(super) port: u16,
    pub(super) password: Option<String>,

    pub(super) client: Arc<RwLock<Option<ObsClient>>>,

    /// "scene::source" -> scene item id
    pub(super) item_id_cache: Arc<parking_lot::RwLock<HashMap<String, i64>>>,

    /// Normalized OBS events for the directory
    pub(super) events_tx: mpsc::Sender<ApplicationEvent>,

    pub(super) reconnect_count: Arc<Mutex<usize>>,
    pub(super) shutdown_flag: Arc<Mutex<bool>>,
}

impl ObsDriver {
    pub fn new(
        host: String,
        port: u16,
        password: Option<String>,
        events_tx: mpsc::Sender<ApplicationEvent>,
    ) -> Self {
        Self {
            host,
            port,
            password,
            client: Arc::new(RwLock::new(None)),
            item_id_cache: Arc::new(parking_lot::RwLock::new(HashMap::new())),
            events_tx,
            reconnect_count: Arc::new(Mutex::new(0)),
            shutdown_flag: Arc::new(Mutex::new(false)),
        }
    }

    pub fn from_config(config: &ObsConfig, events_tx: mpsc::Sender<ApplicationEvent>) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.password.clone(),
            events_tx,
        )
    }

    /// Connect, or keep retrying in the background if OBS is not up yet
    pub async fn start(&self) {
        if let Err(e) = self.connect().await {
            warn!("OBS not reachable at {}:{} ({:#}), retrying", self.host, self.port, e);
            let driver = self.clone_for_task();
            tokio::spawn(async move {
                driver.schedule_reconnect().await;
            });
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_some()
    }

    /// Stop reconnecting and close the connection
    pub async fn shutdown(&self) {
        *self.shutdown_flag.lock() = true;
        if self.client.write().await.take().is_some() {
            info!("OBS connection closed");
        }
    }

    /// Share all state with a background task
    pub(super) fn clone_for_task(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            client: Arc::clone(&self.client),
            item_id_cache: Arc::clone(&self.item_id_cache),
            events_tx: self.events_tx.clone(),
            reconnect_count: Arc::clone(&self.reconnect_count),
            shutdown_flag: Arc::clone(&self.shutdown_flag),
        }
    }
}
