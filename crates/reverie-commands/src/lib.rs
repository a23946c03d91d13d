//! Text command protocol between a language model and its host.
//!
//! A model reply such as `send_message(message="hi", receiver_room_id="!r:x")`
//! is parsed ([`grammar`]), bound to a declared signature ([`binder`]) and run
//! against a [`CommandTarget`] ([`dispatch`]).

pub mod binder;
pub mod dispatch;
pub mod error;
pub mod grammar;

pub use binder::{BoundArgs, Param, ParamKind, Signature};
pub use dispatch::{run_command, CommandTarget, Outcome};
pub use error::CommandError;
pub use grammar::{parse, ParsedCommand};
