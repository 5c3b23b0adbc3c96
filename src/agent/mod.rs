//! Routing agent - one control surface, its ports and its bindings
//!
//! The agent is driven from two sides:
//! - inbound MIDI from its own input port (see `inbound`)
//! - OBS state changes broadcast to every agent (see `feedback`)
//!
//! Both paths take the same per-agent lock around the binding list and the
//! sticky scene indices; the lock is never held across an await.

mod feedback;
mod inbound;


use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::commands::{CommandRegistry, DispatchContext, EngineState};
use crate::config::DeviceConfig;
use crate::drivers::ControlledApp;
use crate::midi::Message;
use crate::transport::{InputConnection, OutputConnection, Transport};

/// Pending inbound messages per device before new ones are dropped
const INBOUND_QUEUE: usize = 256;
const MONITOR_CAPACITY: usize = 256;

/// Collaborators shared by every agent
#[derive(Clone)]
pub struct Engine {
    pub app: Arc<dyn ControlledApp>,
    pub registry: Arc<CommandRegistry>,
    pub state: Arc<EngineState>,
    pub transport: Arc<dyn Transport>,
    /// Every inbound message of every device, matched or not
    pub monitor: broadcast::Sender<Message>,
}

impl Engine {
    pub fn new(app: Arc<dyn ControlledApp>, transport: Arc<dyn Transport>) -> Self {
        let (monitor, _) = broadcast::channel(MONITOR_CAPACITY);
        Self {
            app,
            registry: Arc::new(CommandRegistry::builtin()),
            state: Arc::new(EngineState::default()),
            transport,
            monitor,
        }
    }
}

/// Binding list plus the bindings last lit for each exclusive family
#[derive(Debug, Default)]
pub(crate) struct AgentState {
    pub(crate) bindings: Vec<Binding>,
    pub(crate) last_active_scene: Option<usize>,
    pub(crate) last_active_preview_scene: Option<usize>,
}

impl AgentState {
    /// Remove one binding, keeping the sticky indices pointing at the same bindings
    fn remove_at(&mut self, idx: usize) -> Binding {
        for sticky in [&mut self.last_active_scene, &mut self.last_active_preview_scene] {
            *sticky = match *sticky {
                Some(i) if i == idx => None,
                Some(i) if i > idx => Some(i - 1),
                other => other,
            };
        }
        self.bindings.remove(idx)
    }

    fn reset_sticky(&mut self) {
        self.last_active_scene = None;
        self.last_active_preview_scene = None;
    }
}

#[derive(Default)]
struct Connection {
    enabled: bool,
    bidirectional: bool,
    input: Option<InputConnection>,
    output: Option<Box<dyn OutputConnection>>,
}

/// Per-device owner of connection state and bindings
pub struct RoutingAgent {
    name: String,
    outname: Option<String>,
    engine: Engine,
    pub(crate) state: Mutex<AgentState>,
    connection: Mutex<Connection>,
    /// Feedback is suppressed until OBS reports it finished loading
    loading: AtomicBool,
    inbound_tx: mpsc::Sender<Message>,
    cancel: watch::Sender<bool>,
}

impl RoutingAgent {
    /// Create the agent, start its inbound worker and open the configured ports
    pub fn spawn(config: &DeviceConfig, engine: Engine) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (cancel, cancel_rx) = watch::channel(false);

        let bindings = config
            .hooks
            .iter()
            .cloned()
            .map(|mut binding| {
                binding.device_id = config.name.clone();
                binding
            })
            .collect();

        let loading = !engine.state.is_app_ready();
        let agent = Arc::new(Self {
            name: config.name.clone(),
            outname: config.outname.clone(),
            engine,
            state: Mutex::new(AgentState {
                bindings,
                ..Default::default()
            }),
            connection: Mutex::new(Connection::default()),
            loading: AtomicBool::new(loading),
            inbound_tx,
            cancel,
        });

        Self::spawn_worker(Arc::downgrade(&agent), inbound_rx, cancel_rx);

        agent.set_enabled(config.enabled);
        agent.set_bidirectional(config.bidirectional);
        info!(
            "Device '{}' ready ({} bindings, enabled={}, bidirectional={})",
            agent.name,
            agent.state.lock().bindings.len(),
            config.enabled,
            config.bidirectional
        );
        agent
    }

    /// Dispatch this device's messages one at a time, in arrival order
    fn spawn_worker(
        agent: Weak<Self>,
        mut rx: mpsc::Receiver<Message>,
        mut cancel: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => {
                        let Some(message) = message else { break };
                        let Some(agent) = agent.upgrade() else { break };
                        agent.on_inbound(message).await;
                    }
                    _ = cancel.changed() => break,
                }
            }
            debug!("Inbound worker stopped");
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_port(&self) -> &str {
        self.outname
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn is_enabled(&self) -> bool {
        self.connection.lock().enabled
    }

    pub fn is_bidirectional(&self) -> bool {
        self.connection.lock().bidirectional
    }

    pub fn is_input_open(&self) -> bool {
        self.connection.lock().input.is_some()
    }

    pub fn is_output_open(&self) -> bool {
        self.connection.lock().output.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Enable or disable inbound dispatch, opening or closing the input port
    ///
    /// Opening an open port does nothing. A failed open is logged and the
    /// port stays closed until the next enable.
    pub fn set_enabled(&self, enabled: bool) {
        let mut conn = self.connection.lock();
        conn.enabled = enabled;

        if !enabled {
            if conn.input.take().is_some() {
                info!("Closed MIDI input for '{}'", self.name);
            }
            return;
        }
        if conn.input.is_some() {
            return;
        }

        match self
            .engine
            .transport
            .open_input(&self.name, self.inbound_tx.clone())
        {
            Ok(input) => {
                debug!("'{}' listening on '{}'", self.name, input.port());
                conn.input = Some(input);
            }
            Err(e) => warn!("Cannot open input for '{}': {}", self.name, e),
        }
    }

    /// Enable or disable feedback, opening or closing the output port
    pub fn set_bidirectional(&self, bidirectional: bool) {
        let mut conn = self.connection.lock();
        conn.bidirectional = bidirectional;

        if !bidirectional {
            if conn.output.take().is_some() {
                info!("Closed MIDI output for '{}'", self.name);
            }
            return;
        }
        if conn.output.is_some() {
            return;
        }

        match self.engine.transport.open_output(self.output_port()) {
            Ok(output) => conn.output = Some(output),
            Err(e) => warn!("Cannot open output for '{}': {}", self.name, e),
        }
    }

    /// Write one feedback message if bidirectional and the output is open
    ///
    /// A send failure closes the output.
    pub(crate) fn send_feedback(&self, message: &Message) {
        let mut conn = self.connection.lock();
        if !conn.bidirectional {
            return;
        }
        let Some(output) = conn.output.as_mut() else {
            return;
        };

        match output.send(&message.encode()) {
            Ok(()) => debug!("→ {} {}", self.name, message),
            Err(e) => {
                warn!("Feedback to '{}' failed, closing output: {}", self.name, e);
                conn.output = None;
            }
        }
    }

    pub(crate) fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            app: Arc::clone(&self.engine.app),
            engine: Arc::clone(&self.engine.state),
            cancel: self.cancel.subscribe(),
        }
    }

    // ---- Binding management ----

    /// Snapshot of the bindings in table order
    pub fn bindings(&self) -> Vec<Binding> {
        self.state.lock().bindings.clone()
    }

    pub fn add_binding(&self, mut binding: Binding) {
        binding.device_id = self.name.clone();
        self.state.lock().bindings.push(binding);
    }

    pub fn remove_binding(&self, idx: usize) -> Option<Binding> {
        let mut state = self.state.lock();
        (idx < state.bindings.len()).then(|| state.remove_at(idx))
    }

    /// Replace the binding at `idx`; returns false if out of range
    pub fn replace_binding(&self, idx: usize, mut binding: Binding) -> bool {
        binding.device_id = self.name.clone();
        let mut state = self.state.lock();
        match state.bindings.get_mut(idx) {
            Some(slot) => {
                *slot = binding;
                true
            }
            None => false,
        }
    }

    /// Replace the whole list (clear then rebuild)
    pub fn set_bindings(&self, bindings: Vec<Binding>) {
        let mut state = self.state.lock();
        state.bindings = bindings
            .into_iter()
            .map(|mut binding| {
                binding.device_id = self.name.clone();
                binding
            })
            .collect();
        state.reset_sticky();
    }

    pub fn clear_bindings(&self) {
        self.set_bindings(Vec::new());
    }

    /// Current settings and bindings, as saved in the config file
    ///
    /// Runtime-only binding fields are cleared, so the result equals what
    /// loading the saved file gives back.
    pub fn to_config(&self) -> DeviceConfig {
        let (enabled, bidirectional) = {
            let conn = self.connection.lock();
            (conn.enabled, conn.bidirectional)
        };
        let hooks = self
            .bindings()
            .into_iter()
            .map(|mut binding| {
                binding.device_id.clear();
                binding.last_value = None;
                binding
            })
            .collect();
        DeviceConfig {
            name: self.name.clone(),
            outname: self.outname.clone(),
            enabled,
            bidirectional,
            hooks,
        }
    }

    /// Stop the worker and any fades, then release both ports
    pub fn close(&self) {
        self.cancel.send_replace(true);
        let mut conn = self.connection.lock();
        conn.input = None;
        conn.output = None;
        info!("Device '{}' closed", self.name);
    }
}
