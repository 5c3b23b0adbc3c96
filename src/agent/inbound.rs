//! Inbound dispatch: surface message to commands

use tracing::{debug, error, info, trace, warn};

use crate::binding::Binding;
use crate::error::CommandError;
use crate::matcher;
use crate::midi::Message;

impl super::RoutingAgent {
    /// Handle one message from this agent's surface
    ///
    /// Every matching binding fires, in table order. A failing binding is
    /// logged and does not stop the others.
    pub async fn on_inbound(&self, message: Message) {
        if !self.is_enabled() {
            return;
        }

        // Monitors see all traffic; no receivers is fine
        let _ = self.engine.monitor.send(message.clone());

        if self.engine.state.is_shutting_down() {
            return;
        }

        let fired: Vec<Binding> = {
            let mut state = self.state.lock();
            let matched = matcher::inbound_matches(&mut state.bindings, &message);
            matched
                .into_iter()
                .map(|idx| state.bindings[idx].clone())
                .collect()
        };

        if fired.is_empty() {
            trace!("← {} {} (no binding)", self.name, message);
            return;
        }

        debug!("← {} {} ({} bindings)", self.name, message, fired.len());
        for binding in &fired {
            self.execute(binding).await;
        }
    }

    async fn execute(&self, binding: &Binding) {
        let result = match self.engine.registry.resolve(binding.command) {
            Ok(command) => command.execute(binding, &self.dispatch_context()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("'{}': {}", self.name, binding.describe()),
            Err(e @ CommandError::UnknownCommand(_)) => {
                error!("'{}': {} failed: {}", self.name, binding.describe(), e)
            }
            Err(e @ CommandError::Conflict(_)) => {
                info!("'{}': {} skipped: {}", self.name, binding.describe(), e)
            }
            Err(e) => warn!("'{}': {} failed: {}", self.name, binding.describe(), e),
        }
    }
}
