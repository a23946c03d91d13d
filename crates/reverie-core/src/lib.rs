//! # reverie-core
//!
//! Core types, capability traits, configuration, and error handling for the
//! Reverie agent runtime.

pub mod capability;
pub mod config;
pub mod error;
pub mod message;
pub mod schedule;
pub mod traits;
