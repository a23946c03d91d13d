//! Matrix chat backend.
//!
//! Logs in on startup and forwards every text message from other users to
//! the `NewMessageCallback` plugins. Also answers the chat queries bots make.

use std::sync::Arc;

use async_trait::async_trait;
use reverie_channels::MatrixClient;
use reverie_core::{
    error::ReverieError,
    message::{RoomList, RoomSummary, RoomUsers, SendMessageResponse, SetUserNameResponse},
    traits::{GetRoomHistory, GetRoomsList, GetUsers, OnStartup, Plugin, SendMessage, SetChatUserName},
};
use reverie_plugins::{BroadcastEvent, HostContext};
use tracing::{error, info, warn};

const BOT_SUFFIX: &str = " (bot)";

pub struct MatrixMessenger {
    name: String,
    ctx: HostContext,
    client: Arc<MatrixClient>,
}

impl MatrixMessenger {
    pub fn new(ctx: HostContext, name: &str) -> Self {
        let client = Arc::new(MatrixClient::new(&ctx.config().matrix));
        Self {
            name: name.to_string(),
            ctx,
            client,
        }
    }

    pub fn create(ctx: &HostContext, name: &str) -> Result<Arc<dyn Plugin>, ReverieError> {
        Ok(Arc::new(Self::new(ctx.clone(), name)))
    }
}

/// Display name shown on the chat, marking the account as a bot.
fn display_name(name: &str) -> String {
    if name.ends_with(BOT_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{BOT_SUFFIX}")
    }
}

#[async_trait]
impl OnStartup for MatrixMessenger {
    /// Runs for as long as the sync loop delivers messages.
    async fn on_startup(&self) -> Result<(), ReverieError> {
        if !self.ctx.config().matrix.has_credentials() {
            error!(
                "{}: matrix.user_name and matrix.password must be set, staying offline",
                self.name
            );
            return Ok(());
        }

        self.client.login().await?;
        let mut messages = self.client.clone().start_sync().await?;
        let host = self.ctx.host()?;
        info!("{}: listening for messages", self.name);

        while let Some(message) = messages.recv().await {
            info!(
                "{}: message from {} in {}",
                self.name, message.sender_id, message.room_name
            );
            host.broadcast(BroadcastEvent::NewMessage(message));
        }
        warn!("{}: sync loop ended", self.name);
        Ok(())
    }
}

#[async_trait]
impl SendMessage for MatrixMessenger {
    async fn send_message(
        &self,
        text: &str,
        room_id: &str,
        user_id: Option<&str>,
    ) -> Result<SendMessageResponse, ReverieError> {
        let body = match user_id {
            Some(user) if !user.is_empty() => format!("{user}: {text}"),
            _ => text.to_string(),
        };
        match self.client.send_text(room_id, &body).await {
            Ok(()) => Ok(SendMessageResponse::sent()),
            Err(e) => {
                warn!("{}: send to {room_id} failed: {e}", self.name);
                Ok(SendMessageResponse::failed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl GetRoomsList for MatrixMessenger {
    async fn get_rooms_list(&self) -> Result<RoomList, ReverieError> {
        let mut rooms = Vec::new();
        for room_id in self.client.joined_rooms().await? {
            let name = self.client.room_name(&room_id).await;
            let users = match self.client.joined_members(&room_id).await {
                Ok(users) => users,
                Err(e) => {
                    warn!("{}: no members for {room_id}: {e}", self.name);
                    Vec::new()
                }
            };
            rooms.push(RoomSummary {
                room_id,
                name,
                users,
                history: Vec::new(),
            });
        }
        Ok(RoomList { rooms })
    }
}

#[async_trait]
impl GetRoomHistory for MatrixMessenger {
    async fn get_room_history(
        &self,
        room_id: &str,
        start: i64,
        end: i64,
    ) -> Result<RoomSummary, ReverieError> {
        let history = self.client.messages(room_id, start, end).await?;
        Ok(RoomSummary {
            room_id: room_id.to_string(),
            name: self.client.room_name(room_id).await,
            users: Vec::new(),
            history,
        })
    }
}

#[async_trait]
impl GetUsers for MatrixMessenger {
    async fn get_users(&self, room_id: &str) -> Result<RoomUsers, ReverieError> {
        Ok(RoomUsers {
            users: self.client.joined_members(room_id).await?,
        })
    }
}

#[async_trait]
impl SetChatUserName for MatrixMessenger {
    async fn set_chat_user_name(
        &self,
        new_name: &str,
    ) -> Result<SetUserNameResponse, ReverieError> {
        let name = display_name(new_name);
        match self.client.set_displayname(&name).await {
            Ok(()) => {
                info!("{}: display name set to {name}", self.name);
                Ok(SetUserNameResponse {
                    name,
                    error_message: None,
                })
            }
            Err(e) => Ok(SetUserNameResponse {
                name,
                error_message: Some(e.to_string()),
            }),
        }
    }
}

impl Plugin for MatrixMessenger {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_on_startup(&self) -> Option<&dyn OnStartup> {
        Some(self)
    }

    fn as_send_message(&self) -> Option<&dyn SendMessage> {
        Some(self)
    }

    fn as_get_rooms_list(&self) -> Option<&dyn GetRoomsList> {
        Some(self)
    }

    fn as_get_room_history(&self) -> Option<&dyn GetRoomHistory> {
        Some(self)
    }

    fn as_get_users(&self) -> Option<&dyn GetUsers> {
        Some(self)
    }

    fn as_set_chat_user_name(&self) -> Option<&dyn SetChatUserName> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::{capability::CapabilityName, config::Config, traits::capabilities_of};
    use reverie_plugins::WakeScheduler;

    fn messenger() -> MatrixMessenger {
        let config = Config::default();
        let scheduler = Arc::new(WakeScheduler::from_config(&config.agent));
        MatrixMessenger::new(HostContext::new(Arc::new(config), scheduler, false), "matrix")
    }

    #[test]
    fn test_display_name_suffix() {
        assert_eq!(display_name("Nyx"), "Nyx (bot)");
        assert_eq!(display_name("Nyx (bot)"), "Nyx (bot)");
    }

    #[test]
    fn test_capabilities() {
        let caps = capabilities_of(&messenger());
        assert!(caps.contains(CapabilityName::OnStartup));
        assert!(caps.contains(CapabilityName::SendMessage));
        assert!(caps.contains(CapabilityName::SetChatUserName));
        assert!(!caps.contains(CapabilityName::NewMessageCallback));
        assert!(!caps.contains(CapabilityName::Dream));
        assert_eq!(caps.len(), 6);
    }

    #[tokio::test]
    async fn test_startup_without_credentials_stays_offline() {
        let plugin = messenger();
        plugin.on_startup().await.unwrap();
        assert!(!plugin.client.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_send_before_login_reports_failure() {
        let resp = messenger()
            .send_message("hi", "!room:example.org", None)
            .await
            .unwrap();
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("not logged in"));
    }

    #[tokio::test]
    async fn test_rename_before_login_reports_error() {
        let resp = messenger().set_chat_user_name("Nyx").await.unwrap();
        assert_eq!(resp.name, "Nyx (bot)");
        assert!(resp.error_message.is_some());
    }
}
