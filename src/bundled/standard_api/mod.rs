//! The standard bot: talks to a chat-completions model and acts on the
//! command each reply contains.
//!
//! Every event (startup, wake-up, incoming message) opens a conversation.
//! The model answers with one command; commands that produce a result feed
//! it back as the next prompt, until the model pauses itself with
//! `timeout()` / `wake_at()` or keeps answering with invalid commands.

mod commands;
mod profile;


use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reverie_commands::{run_command, BoundArgs, CommandError, CommandTarget, Outcome, Signature};
use reverie_core::{
    error::ReverieError,
    message::{ChatMessage, ModelMessage, Role},
    schedule::{DreamSignal, ScheduleKind},
    traits::{Dream, ModelClient, NewMessageCallback, OnScheduledWakeup, OnStartup, Plugin},
};
use reverie_memory::Store;
use reverie_plugins::{HostContext, PluginHost};
use reverie_providers::ChatCompletionsClient;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct StandardApi {
    name: String,
    ctx: HostContext,
    model: Arc<dyn ModelClient>,
    memory_path: PathBuf,
    memory: OnceCell<Store>,
    commands: Vec<Signature>,
    context_messages: usize,
    max_invalid_replies: u32,
    dream_log_every: Duration,
}

impl StandardApi {
    pub fn new(
        ctx: HostContext,
        name: &str,
        model: Arc<dyn ModelClient>,
        memory_path: PathBuf,
    ) -> Self {
        let config = ctx.config();
        let context_messages = config.model.context_messages;
        let max_invalid_replies = config.bot.max_invalid_replies;
        let dream_log_every = Duration::from_secs(config.bot.dream_log_secs.max(1));
        Self {
            name: name.to_string(),
            ctx,
            model,
            memory_path,
            memory: OnceCell::new(),
            commands: commands::command_table(),
            context_messages,
            max_invalid_replies,
            dream_log_every,
        }
    }

    /// Catalog constructor: the configured model, memory under the data dir.
    pub fn create(ctx: &HostContext, name: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        let config = ctx.config();
        let model = ChatCompletionsClient::from_config(&config.model);
        let memory_path = config.data_dir().join("memory").join(format!("{name}.json"));
        Ok(Arc::new(Self::new(ctx.clone(), name, Arc::new(model), memory_path)))
    }

    /// The memory store, opened on first use.
    async fn memory(&self) -> Result<&Store, ReverieError> {
        self.memory
            .get_or_try_init(|| Store::open(self.memory_path.clone()))
            .await
    }

    fn host(&self) -> Result<Arc<PluginHost>, ReverieError> {
        self.ctx.host()
    }

    /// One model round trip.
    ///
    /// Re-plans the idle wake-up, records the prompt, asks the model with the
    /// command guide plus the recent window, and records the reply.
    async fn exchange(&self, prompt: &str) -> Result<String, ReverieError> {
        let scheduler = self.ctx.scheduler();
        scheduler.schedule_in(ScheduleKind::Planned, scheduler.idle_timeout_secs());

        let memory = self.memory().await?;
        let (bot_name, window) = memory
            .update(|m| {
                m.add_message(Role::User, prompt, Utc::now());
                (m.bot_name.clone(), m.last_messages(self.context_messages))
            })
            .await?;

        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(ModelMessage::new(
            Role::System,
            profile::initial_prompt(bot_name.as_deref(), &self.commands),
        ));
        messages.extend(window);

        let reply = self.model.complete(&messages).await?;
        debug!("{} <- {}: {reply}", self.name, self.model.name());
        memory
            .update(|m| m.add_message(Role::Assistant, &reply, Utc::now()))
            .await?;
        Ok(reply)
    }

    /// Talk to the model until it stops asking for more.
    async fn converse(&self, prompt: String) -> Result<(), ReverieError> {
        let mut next = Some(prompt);
        let mut invalid_streak = 0u32;

        while let Some(prompt) = next.take() {
            let reply = self.exchange(&prompt).await?;
            let turn = Turn {
                bot: self,
                follow_up: OnceLock::new(),
            };
            let mut diagnostic = None;
            let outcome = run_command(&turn, &reply, |d| {
                diagnostic = Some(d);
                std::future::ready(())
            })
            .await;

            match outcome {
                Outcome::Invoked(_) => {
                    invalid_streak = 0;
                    next = turn.follow_up.into_inner();
                }
                Outcome::Rejected(e) => {
                    invalid_streak += 1;
                    if invalid_streak >= self.max_invalid_replies {
                        warn!(
                            "{}: {invalid_streak} invalid replies in a row, waiting for the next event",
                            self.name
                        );
                        break;
                    }
                    let diagnostic = diagnostic.unwrap_or_else(|| e.to_string());
                    next = Some(profile::invalid_command(&diagnostic));
                }
            }
        }
        Ok(())
    }

    async fn guide(&self) -> Result<String, ReverieError> {
        let memory = self.memory().await?;
        let bot_name = memory.read(|m| m.bot_name.clone()).await;
        Ok(profile::initial_prompt(bot_name.as_deref(), &self.commands))
    }
}

/// Command target for a single model reply. Holds the follow-up prompt the
/// command produced, if any.
struct Turn<'a> {
    bot: &'a StandardApi,
    follow_up: OnceLock<String>,
}

#[async_trait]
impl CommandTarget for Turn<'_> {
    fn commands(&self) -> &[Signature] {
        &self.bot.commands
    }

    async fn invoke(&self, method: &str, args: BoundArgs) -> Result<(), CommandError> {
        if let Some(prompt) = self.bot.execute(method, args).await? {
            let _ = self.follow_up.set(prompt);
        }
        Ok(())
    }
}

#[async_trait]
impl OnStartup for StandardApi {
    async fn on_startup(&self) -> Result<(), ReverieError> {
        info!("{}: starting conversation", self.name);
        let guide = self.guide().await?;
        self.converse(guide).await
    }
}

#[async_trait]
impl OnScheduledWakeup for StandardApi {
    async fn on_scheduled_wakeup(&self) -> Result<(), ReverieError> {
        let scheduler = self.ctx.scheduler();
        let prompt = match scheduler.fired_schedule() {
            Some(fired) if fired.kind == ScheduleKind::Planned => {
                profile::woke_after(fired.sleep_duration)
            }
            _ => profile::no_activity(scheduler.idle_timeout_secs()),
        };
        self.converse(prompt).await
    }
}

#[async_trait]
impl NewMessageCallback for StandardApi {
    async fn new_message_callback(&self, message: ChatMessage) -> Result<(), ReverieError> {
        self.converse(profile::new_message(&message)).await
    }
}

#[async_trait]
impl Dream for StandardApi {
    async fn dream(&self, mut signal: DreamSignal) -> Result<(), ReverieError> {
        let mut ticker = tokio::time::interval(self.dream_log_every);
        loop {
            tokio::select! {
                _ = signal.woken() => break,
                _ = ticker.tick() => info!("{} is dreaming", self.name),
            }
        }
        info!("{} woke up from its dream", self.name);
        Ok(())
    }
}

impl Plugin for StandardApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_on_startup(&self) -> Option<&dyn OnStartup> {
        Some(self)
    }

    fn as_on_scheduled_wakeup(&self) -> Option<&dyn OnScheduledWakeup> {
        Some(self)
    }

    fn as_new_message_callback(&self) -> Option<&dyn NewMessageCallback> {
        Some(self)
    }

    fn as_dream(&self) -> Option<&dyn Dream> {
        Some(self)
    }
}
