//! OBS connection management and event handling
//!
//! Handles WebSocket connection, reconnection and the event listener.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::RwLockReadGuard;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use super::driver::ObsDriver;
use super::events;
use crate::drivers::DriverResult;
use crate::error::DriverError;
use crate::event::{ApplicationEvent, EventKind};

const MAX_RECONNECT_DELAY_MS: usize = 30_000;

impl ObsDriver {
    /// The connected client, or `NotConnected`
    pub(super) async fn client(&self) -> DriverResult<RwLockReadGuard<'_, obws::Client>> {
        let guard = self.client.read().await;
        RwLockReadGuard::try_map(guard, Option::as_ref).map_err(|_| DriverError::NotConnected)
    }

    /// Connect to OBS WebSocket and start listening for events
    pub(super) async fn connect(&self) -> Result<()> {
        info!("Connecting to OBS at {}:{}", self.host, self.port);

        let client = obws::Client::connect(self.host.clone(), self.port, self.password.clone())
            .await
            .context("Failed to connect to OBS WebSocket")?;

        let version = client.general().version().await.ok();
        *self.client.write().await = Some(client);
        *self.reconnect_count.lock() = 0;
        self.item_id_cache.write().clear();

        self.spawn_event_listener();

        match version {
            Some(v) => info!(
                "OBS WebSocket connected (OBS {}, websocket {})",
                v.obs_version, v.obs_web_socket_version
            ),
            None => info!("OBS WebSocket connected"),
        }

        // OBS is already up when we can connect: release startup suppression
        self.emit(ApplicationEvent::new(EventKind::FinishedLoading))
            .await;
        Ok(())
    }

    async fn emit(&self, event: ApplicationEvent) {
        if self.events_tx.send(event).await.is_err() {
            debug!("OBS event receiver gone");
        }
    }

    /// Spawn background task to forward OBS events
    pub(super) fn spawn_event_listener(&self) {
        let driver = self.clone_for_task();

        tokio::spawn(async move {
            use tokio_stream::StreamExt;

            let events = {
                let guard = driver.client.read().await;
                match guard.as_ref().map(|c| c.events()) {
                    Some(Ok(stream)) => stream,
                    Some(Err(e)) => {
                        warn!("Failed to get OBS event stream: {}", e);
                        return;
                    }
                    None => return,
                }
            };

            tokio::pin!(events);
            while let Some(event) = events.next().await {
                if *driver.shutdown_flag.lock() {
                    return;
                }

                let Some(event) = events::translate(event) else {
                    continue;
                };
                trace!("OBS event {:?}", event.kind);

                if matches!(event.kind, EventKind::SourceRenamed | EventKind::SourceRemoved) {
                    driver.item_id_cache.write().clear();
                }
                driver.emit(event).await;
            }

            warn!("OBS event stream closed");
            *driver.client.write().await = None;

            if !*driver.shutdown_flag.lock() {
                let reconnect = driver.clone_for_task();
                tokio::spawn(async move {
                    reconnect.schedule_reconnect().await;
                });
            }
        });
    }

    /// Reconnect with linear backoff, capped at 30 s
    pub(super) async fn schedule_reconnect(&self) {
        loop {
            if *self.shutdown_flag.lock() {
                return;
            }

            let retry_count = {
                let mut count = self.reconnect_count.lock();
                *count += 1;
                *count
            };

            let delay_ms = std::cmp::min(MAX_RECONNECT_DELAY_MS, 1000 * retry_count);
            debug!("OBS reconnect #{} in {}ms", retry_count, delay_ms);
            sleep(Duration::from_millis(delay_ms as u64)).await;

            if *self.shutdown_flag.lock() {
                return;
            }

            match self.connect().await {
                Ok(()) => {
                    info!("OBS reconnection successful");
                    return;
                }
                Err(e) => debug!("OBS reconnect #{} failed: {:#}", retry_count, e),
            }
        }
    }
}
