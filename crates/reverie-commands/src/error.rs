use thiserror::Error;

/// Why a model-issued command was not run.
///
/// The `Display` text is what the model sees, so it reads like an
/// interpreter diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no command found, expected name(arg, key=\"value\")")]
    NotACommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}() takes {max} positional arguments but {given} were given")]
    Arity {
        command: String,
        max: usize,
        given: usize,
    },

    #[error("{command}() missing required arguments: {}", .missing.join(", "))]
    MissingArguments {
        command: String,
        missing: Vec<String>,
    },

    #[error("{command}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { command: String, name: String },

    #[error("invalid value for '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// The command ran and failed.
    #[error("{0}")]
    Invocation(String),
}
