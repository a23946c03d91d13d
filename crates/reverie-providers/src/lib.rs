//! # reverie-providers
//!
//! Language-model clients for Reverie.

pub mod chat_completions;

pub use chat_completions::ChatCompletionsClient;
