//! # reverie-channels
//!
//! Chat backend clients for Reverie.

pub mod matrix;

pub use matrix::MatrixClient;
