//! Plugins compiled into the binary, keyed by entry point.
//!
//! A plugin directory `<root>/<type>/<name>/` picks its constructor through
//! `entry` in its `plugin.toml`, or `<type>/<name>` when it has none.

pub mod matrix_messenger;
pub mod standard_api;
pub mod web_api;

use reverie_plugins::PluginCatalog;

pub fn catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with("bots/standard_api", standard_api::StandardApi::create)
        .with(
            "chat_interfaces/matrix_messenger",
            matrix_messenger::MatrixMessenger::create,
        )
        .with("user_interfaces/web_api", web_api::WebApi::create)
}
