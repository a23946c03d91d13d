use std::sync::{Arc, OnceLock, Weak};

use reverie_core::{config::Config, error::ReverieError};

use crate::{host::PluginHost, scheduler::WakeScheduler};

/// Shared services handed to every plugin constructor.
///
/// The host is bound after construction, so plugins reach it through
/// [`HostContext::host`] at call time, never while being built.
#[derive(Clone)]
pub struct HostContext {
    config: Arc<Config>,
    scheduler: Arc<WakeScheduler>,
    dev_mode: bool,
    host: Arc<OnceLock<Weak<PluginHost>>>,
}

impl HostContext {
    pub fn new(config: Arc<Config>, scheduler: Arc<WakeScheduler>, dev_mode: bool) -> Self {
        Self {
            config,
            scheduler,
            dev_mode,
            host: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<WakeScheduler> {
        &self.scheduler
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Bind the host once it exists. Returns `false` if one was already bound.
    pub fn bind_host(&self, host: &Arc<PluginHost>) -> bool {
        self.host.set(Arc::downgrade(host)).is_ok()
    }

    /// The running host, for plugins that dispatch to other plugins.
    pub fn host(&self) -> Result<Arc<PluginHost>, ReverieError> {
        self.host
            .get()
            .and_then(Weak::upgrade)
            .ok_or(ReverieError::HostUnavailable)
    }
}
