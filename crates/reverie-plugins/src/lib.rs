pub mod context;
pub mod host;
pub mod registry;
pub mod scheduler;

pub use context::HostContext;
pub use host::{Broadcast, BroadcastEvent, BroadcastReport, PluginHost};
pub use registry::{PluginCatalog, PluginConstructor, PluginDescriptor, PluginRegistry};
pub use scheduler::{TickOutcome, WakePhase, WakeScheduler};
