use crate::{
    capability::{CapabilityName, CapabilitySet},
    error::ReverieError,
    message::{
        ChatMessage, ModelMessage, RoomList, RoomSummary, RoomUsers, SendMessageResponse,
        SetUserNameResponse,
    },
    schedule::DreamSignal,
};
use async_trait::async_trait;

/// Called once when the runtime boots.
#[async_trait]
pub trait OnStartup: Send + Sync {
    async fn on_startup(&self) -> Result<(), ReverieError>;
}

/// Called when the sleep timeout is reached or a planned wake-up is due.
#[async_trait]
pub trait OnScheduledWakeup: Send + Sync {
    async fn on_scheduled_wakeup(&self) -> Result<(), ReverieError>;
}

/// Called for every message a chat backend plugin receives.
#[async_trait]
pub trait NewMessageCallback: Send + Sync {
    async fn new_message_callback(&self, message: ChatMessage) -> Result<(), ReverieError>;
}

/// Background work while waiting for the next wake-up.
#[async_trait]
pub trait Dream: Send + Sync {
    async fn dream(&self, signal: DreamSignal) -> Result<(), ReverieError>;
}

/// Registers HTTP routes on the web front-end.
pub trait Api: Send + Sync {
    fn routes(&self) -> axum::Router;
}

#[async_trait]
pub trait SendMessage: Send + Sync {
    async fn send_message(
        &self,
        text: &str,
        room_id: &str,
        user_id: Option<&str>,
    ) -> Result<SendMessageResponse, ReverieError>;
}

#[async_trait]
pub trait GetRoomsList: Send + Sync {
    async fn get_rooms_list(&self) -> Result<RoomList, ReverieError>;
}

#[async_trait]
pub trait GetRoomHistory: Send + Sync {
    /// History of `room_id` between two unix timestamps (seconds).
    async fn get_room_history(
        &self,
        room_id: &str,
        start: i64,
        end: i64,
    ) -> Result<RoomSummary, ReverieError>;
}

#[async_trait]
pub trait GetUsers: Send + Sync {
    async fn get_users(&self, room_id: &str) -> Result<RoomUsers, ReverieError>;
}

#[async_trait]
pub trait SetChatUserName: Send + Sync {
    async fn set_chat_user_name(&self, new_name: &str)
        -> Result<SetUserNameResponse, ReverieError>;
}

/// Base plugin contract.
///
/// Every accessor defaults to `None`. A plugin opts into a capability by
/// implementing the capability trait and returning `Some(self)` from the
/// matching accessor. The host reads the accessors once at registration.
pub trait Plugin: Send + Sync {
    /// Human-readable instance name (the plugin directory name).
    fn name(&self) -> &str;

    fn as_on_startup(&self) -> Option<&dyn OnStartup> {
        None
    }
    fn as_on_scheduled_wakeup(&self) -> Option<&dyn OnScheduledWakeup> {
        None
    }
    fn as_new_message_callback(&self) -> Option<&dyn NewMessageCallback> {
        None
    }
    fn as_dream(&self) -> Option<&dyn Dream> {
        None
    }
    fn as_api(&self) -> Option<&dyn Api> {
        None
    }
    fn as_send_message(&self) -> Option<&dyn SendMessage> {
        None
    }
    fn as_get_rooms_list(&self) -> Option<&dyn GetRoomsList> {
        None
    }
    fn as_get_room_history(&self) -> Option<&dyn GetRoomHistory> {
        None
    }
    fn as_get_users(&self) -> Option<&dyn GetUsers> {
        None
    }
    fn as_set_chat_user_name(&self) -> Option<&dyn SetChatUserName> {
        None
    }
}

/// Whether `plugin` exposes `capability`.
pub fn implements(plugin: &dyn Plugin, capability: CapabilityName) -> bool {
    match capability {
        CapabilityName::OnStartup => plugin.as_on_startup().is_some(),
        CapabilityName::OnScheduledWakeup => plugin.as_on_scheduled_wakeup().is_some(),
        CapabilityName::NewMessageCallback => plugin.as_new_message_callback().is_some(),
        CapabilityName::Dream => plugin.as_dream().is_some(),
        CapabilityName::Api => plugin.as_api().is_some(),
        CapabilityName::SendMessage => plugin.as_send_message().is_some(),
        CapabilityName::GetRoomsList => plugin.as_get_rooms_list().is_some(),
        CapabilityName::GetRoomHistory => plugin.as_get_room_history().is_some(),
        CapabilityName::GetUsers => plugin.as_get_users().is_some(),
        CapabilityName::SetChatUserName => plugin.as_set_chat_user_name().is_some(),
    }
}

/// Compute the full capability set of a plugin.
pub fn capabilities_of(plugin: &dyn Plugin) -> CapabilitySet {
    CapabilityName::ALL
        .into_iter()
        .filter(|c| implements(plugin, *c))
        .collect()
}

/// Language-model backend.
///
/// Every model API (OpenAI-compatible endpoints, local servers, etc.)
/// implements this trait to provide a uniform interface.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[ModelMessage]) -> Result<String, ReverieError>;
}
