use crate::capability::CapabilityName;
use thiserror::Error;

/// Top-level error type for Reverie.
#[derive(Debug, Error)]
pub enum ReverieError {
    /// A plugin package could not be loaded, constructed, or validated.
    #[error("plugin load error: {0}")]
    PluginLoad(String),

    /// Single-responder dispatch found no plugin implementing the capability.
    #[error("no plugin implements {0}")]
    NoCapablePlugin(CapabilityName),

    /// A plugin capability returned an error or panicked.
    #[error("plugin {plugin} failed: {message}")]
    PluginInvocation { plugin: String, message: String },

    /// The plugin host has not been bound to the context yet, or is gone.
    #[error("plugin host unavailable")]
    HostUnavailable,

    /// Error from a language-model provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a chat backend.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
