//! Commands the model can issue.

use chrono::{DateTime, Utc};
use reverie_commands::{BoundArgs, CommandError, Signature};
use reverie_core::{error::ReverieError, schedule::ScheduleKind};
use reverie_memory::{parse_date, Period};
use serde::Serialize;
use tracing::info;

use super::{profile, StandardApi};

pub(super) fn command_table() -> Vec<Signature> {
    vec![
        Signature::new("_help"),
        Signature::new("_set_my_name").required("bot_name"),
        Signature::new("_get_my_name"),
        Signature::new("_timeout").required("seconds"),
        Signature::new("_wake_at").required("date"),
        Signature::new("_send_message")
            .required("message")
            .required("receiver_room_id")
            .optional("receiver_user_id"),
        Signature::new("_request_rooms_list"),
        Signature::new("_request_room_history")
            .required("room_id")
            .required("from_date")
            .required("to_date"),
        Signature::new("_get_users").required("room_id"),
        Signature::new("_store_summary")
            .required("interval")
            .required("start_time")
            .required("summary"),
        Signature::new("_get_summary")
            .required("interval")
            .required("start_time"),
        Signature::new("_store_mind_map").required("text"),
        Signature::new("_get_mind_map"),
    ]
}

fn invocation(e: ReverieError) -> CommandError {
    CommandError::Invocation(e.to_string())
}

fn date_arg(args: &BoundArgs, name: &str) -> Result<DateTime<Utc>, CommandError> {
    parse_date(args.require(name)?).map_err(|e| CommandError::InvalidArgument {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value).map_err(|e| invocation(e.into()))
}

/// Follow-up prompt for the model, if the command produced one.
type Reply = Result<Option<String>, CommandError>;

impl StandardApi {
    /// Run a bound command.
    pub(super) async fn execute(&self, method: &str, args: BoundArgs) -> Reply {
        match method {
            "_help" => self.guide().await.map(Some).map_err(invocation),
            "_set_my_name" => self.set_my_name(&args).await,
            "_get_my_name" => self.get_my_name().await,
            "_timeout" => self.timeout(&args),
            "_wake_at" => self.wake_at(&args),
            "_send_message" => self.send_message(&args).await,
            "_request_rooms_list" => self.request_rooms_list().await,
            "_request_room_history" => self.request_room_history(&args).await,
            "_get_users" => self.get_users(&args).await,
            "_store_summary" => self.store_summary(&args).await,
            "_get_summary" => self.get_summary(&args).await,
            "_store_mind_map" => self.store_mind_map(&args).await,
            "_get_mind_map" => self.get_mind_map().await,
            other => Err(CommandError::UnknownCommand(
                other.trim_start_matches('_').to_string(),
            )),
        }
    }

    /// The name can be chosen once. It is also pushed to the chat backend.
    async fn set_my_name(&self, args: &BoundArgs) -> Reply {
        let name = args.require("bot_name")?.trim().to_string();
        if name.is_empty() {
            return Err(CommandError::InvalidArgument {
                name: "bot_name".into(),
                message: "must not be empty".into(),
            });
        }

        let memory = self.memory().await.map_err(invocation)?;
        let stored = memory
            .update(|m| {
                if m.bot_name.is_some() {
                    return false;
                }
                m.bot_name = Some(name.clone());
                true
            })
            .await
            .map_err(invocation)?;
        if !stored {
            return Ok(Some(profile::NAME_ALREADY_SET.to_string()));
        }
        info!("{} is now called {name}", self.name);

        let host = self.host().map_err(invocation)?;
        match host.set_chat_user_name(&name).await {
            Ok(resp) => {
                if let Some(error) = resp.error_message {
                    return Ok(Some(profile::chat_name_failed(&error)));
                }
            }
            Err(ReverieError::NoCapablePlugin(_)) => info!("No chat backend to rename"),
            Err(e) => return Ok(Some(profile::chat_name_failed(&e.to_string()))),
        }
        Ok(Some(profile::my_name(&name)))
    }

    async fn get_my_name(&self) -> Reply {
        let memory = self.memory().await.map_err(invocation)?;
        let name = memory.read(|m| m.bot_name.clone()).await;
        Ok(Some(match name {
            Some(name) => profile::my_name(&name),
            None => profile::NAME_NOT_SET.to_string(),
        }))
    }

    fn timeout(&self, args: &BoundArgs) -> Reply {
        let seconds: u64 = args.parse("seconds")?;
        self.ctx.scheduler().schedule_in(ScheduleKind::Planned, seconds);
        Ok(None)
    }

    fn wake_at(&self, args: &BoundArgs) -> Reply {
        let at = date_arg(args, "date")?;
        self.ctx.scheduler().schedule_at(at);
        Ok(None)
    }

    async fn send_message(&self, args: &BoundArgs) -> Reply {
        let text = args.require("message")?;
        let room_id = args.require("receiver_room_id")?;
        let user_id = args.get("receiver_user_id");

        let host = self.host().map_err(invocation)?;
        let prompt = match host.send_message(text, room_id, user_id).await {
            Ok(resp) if resp.success => profile::MESSAGE_SENT.to_string(),
            Ok(resp) => profile::message_failed(resp.error.as_deref().unwrap_or("unknown error")),
            Err(e) => profile::message_failed(&e.to_string()),
        };
        Ok(Some(prompt))
    }

    async fn request_rooms_list(&self) -> Reply {
        let host = self.host().map_err(invocation)?;
        let prompt = match host.get_rooms_list().await {
            Ok(list) => profile::rooms_list(&to_json(&list.rooms)?),
            Err(e) => profile::request_failed("request_rooms_list", &e.to_string()),
        };
        Ok(Some(prompt))
    }

    /// Both dates are inclusive; `to_date` covers its whole day.
    async fn request_room_history(&self, args: &BoundArgs) -> Reply {
        let room_id = args.require("room_id")?;
        let from = date_arg(args, "from_date")?;
        let to = date_arg(args, "to_date")?;
        let end = to
            .date_naive()
            .and_hms_opt(23, 59, 59)
            .map_or(to.timestamp(), |dt| dt.and_utc().timestamp());

        let host = self.host().map_err(invocation)?;
        let prompt = match host.get_room_history(room_id, from.timestamp(), end).await {
            Ok(summary) => profile::room_history(&to_json(&summary.history)?),
            Err(e) => profile::request_failed("request_room_history", &e.to_string()),
        };
        Ok(Some(prompt))
    }

    async fn get_users(&self, args: &BoundArgs) -> Reply {
        let room_id = args.require("room_id")?;
        let host = self.host().map_err(invocation)?;
        let prompt = match host.get_users(room_id).await {
            Ok(users) => profile::users(&to_json(&users.users)?),
            Err(e) => profile::request_failed("get_users", &e.to_string()),
        };
        Ok(Some(prompt))
    }

    async fn store_summary(&self, args: &BoundArgs) -> Reply {
        let Ok(period) = args.require("interval")?.parse::<Period>() else {
            return Ok(Some(profile::invalid_interval()));
        };
        let Ok(start) = parse_date(args.require("start_time")?) else {
            return Ok(Some(profile::INVALID_START_TIME.to_string()));
        };
        let summary = args.require("summary")?;

        let memory = self.memory().await.map_err(invocation)?;
        memory
            .update(|m| m.set_periodic_summary(period, start.timestamp(), summary))
            .await
            .map_err(invocation)?;
        Ok(Some(profile::SUMMARY_STORED.to_string()))
    }

    async fn get_summary(&self, args: &BoundArgs) -> Reply {
        let Ok(period) = args.require("interval")?.parse::<Period>() else {
            return Ok(Some(profile::invalid_interval()));
        };
        let Ok(start) = parse_date(args.require("start_time")?) else {
            return Ok(Some(profile::INVALID_START_TIME.to_string()));
        };

        let memory = self.memory().await.map_err(invocation)?;
        let text = memory
            .read(|m| {
                m.periodic_summary(period, start.timestamp())
                    .map(|s| s.summary_text.clone())
            })
            .await;
        Ok(Some(match text {
            Some(text) => profile::summary(&text),
            None => profile::SUMMARY_EMPTY.to_string(),
        }))
    }

    async fn store_mind_map(&self, args: &BoundArgs) -> Reply {
        let text = args.require("text")?.to_string();
        let memory = self.memory().await.map_err(invocation)?;
        memory
            .update(|m| m.mind_map = Some(text))
            .await
            .map_err(invocation)?;
        Ok(Some(profile::MIND_MAP_STORED.to_string()))
    }

    async fn get_mind_map(&self) -> Reply {
        let memory = self.memory().await.map_err(invocation)?;
        let text = memory.read(|m| m.mind_map.clone()).await;
        Ok(Some(match text {
            Some(text) => profile::mind_map(&text),
            None => profile::MIND_MAP_EMPTY.to_string(),
        }))
    }
}
