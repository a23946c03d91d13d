//! Matrix client-server API (v3) request and response types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub identifier: LoginIdentifier<'a>,
    pub password: &'a str,
    pub initial_device_display_name: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginIdentifier<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub errcode: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncRooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JoinedRoom {
    #[serde(default)]
    pub state: EventList,
    #[serde(default)]
    pub timeline: EventList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventList {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub origin_server_ts: i64,
}

impl RawEvent {
    /// Body of an `m.room.message` with `msgtype` `m.text`.
    pub fn text_body(&self) -> Option<&str> {
        if self.kind != "m.room.message" || self.content["msgtype"] != "m.text" {
            return None;
        }
        self.content["body"].as_str()
    }

    /// New name carried by an `m.room.name` state event.
    pub fn room_name(&self) -> Option<&str> {
        if self.kind != "m.room.name" {
            return None;
        }
        self.content["name"].as_str().filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinedRoomsResponse {
    pub joined_rooms: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinedMembersResponse {
    #[serde(default)]
    pub joined: HashMap<String, MemberProfile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberProfile {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoomNameContent {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub chunk: Vec<RawEvent>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextContent<'a> {
    pub msgtype: &'static str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DisplayNameRequest<'a> {
    pub displayname: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DisplayNameResponse {
    pub displayname: Option<String>,
}
