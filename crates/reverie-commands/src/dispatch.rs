use async_trait::async_trait;
use std::future::Future;
use tracing::{info, warn};

use crate::binder::{bind, resolve, BoundArgs, Signature};
use crate::error::CommandError;
use crate::grammar::parse;

/// Something that exposes `_<command>` methods to model text.
#[async_trait]
pub trait CommandTarget: Send + Sync {
    /// Command table, one signature per `_<command>` method.
    fn commands(&self) -> &[Signature];

    /// Run the method with arguments already bound to its signature.
    async fn invoke(&self, method: &str, args: BoundArgs) -> Result<(), CommandError>;
}

/// What happened to one piece of model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command ran to completion.
    Invoked(String),
    /// The text was rejected; the callback already received the diagnostic.
    Rejected(CommandError),
}

/// Parse, bind and invoke a command from model text.
///
/// Every failure is logged and handed to `on_invalid` as a diagnostic string.
pub async fn run_command<T, F, Fut>(target: &T, text: &str, on_invalid: F) -> Outcome
where
    T: CommandTarget + ?Sized,
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let command = match prepare(target, text) {
        Ok(prepared) => prepared,
        Err(e) => return reject(e, on_invalid).await,
    };
    let (method, args) = command;
    let name = args.command().to_string();

    info!("Running command {name}");
    match target.invoke(&method, args).await {
        Ok(()) => Outcome::Invoked(name),
        Err(e) => reject(e, on_invalid).await,
    }
}

fn prepare<T: CommandTarget + ?Sized>(
    target: &T,
    text: &str,
) -> Result<(String, BoundArgs), CommandError> {
    let parsed = parse(text)?;
    let signature = resolve(target.commands(), &parsed.name)?;
    let args = bind(signature, parsed)?;
    Ok((signature.method.clone(), args))
}

async fn reject<F, Fut>(error: CommandError, on_invalid: F) -> Outcome
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = ()>,
{
    warn!("Invalid command: {error}");
    on_invalid(error.to_string()).await;
    Outcome::Rejected(error)
}
