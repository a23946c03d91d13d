//! Matrix client-server API client.
//!
//! Password login, `/sync` long polling, room and profile queries.
//! Docs: <https://spec.matrix.org/v1.10/client-server-api/>

mod polling;
pub(crate) mod types;

#[cfg(test)]
mod tests;

pub use polling::localpart;

use chrono::{DateTime, Utc};
use reverie_core::{
    config::MatrixConfig,
    error::ReverieError,
    message::{ChatUser, RoomEvent},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use types::*;
use urlencoding::encode;
use uuid::Uuid;

/// Most pages walked backwards when collecting room history.
const MAX_HISTORY_PAGES: usize = 10;
const HISTORY_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    user_id: String,
}

/// Client for one Matrix account.
pub struct MatrixClient {
    client: reqwest::Client,
    server: String,
    user_name: String,
    password: String,
    session: RwLock<Option<Session>>,
    /// Room names seen in sync or fetched from state.
    room_names: Mutex<HashMap<String, String>>,
}

impl MatrixClient {
    pub fn new(config: &MatrixConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            server: config.server.trim_end_matches('/').to_string(),
            user_name: config.user_name.clone(),
            password: config.password.clone(),
            session: RwLock::new(None),
            room_names: Mutex::new(HashMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/_matrix/client/v3{path}", self.server)
    }

    async fn session(&self) -> Result<Session, ReverieError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| ReverieError::Channel("matrix: not logged in".into()))
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Fully qualified id of the logged-in user.
    pub async fn user_id(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.user_id.clone())
    }

    /// Log in with the configured password.
    pub async fn login(&self) -> Result<(), ReverieError> {
        let body = LoginRequest {
            kind: "m.login.password",
            identifier: LoginIdentifier {
                kind: "m.id.user",
                user: &self.user_name,
            },
            password: &self.password,
            initial_device_display_name: "reverie",
        };
        let resp = self
            .client
            .post(self.url("/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReverieError::Channel(format!("matrix login failed: {e}")))?;
        let login: LoginResponse = decode(resp, "login").await?;

        info!("matrix: logged in as {}", login.user_id);
        *self.session.write().await = Some(Session {
            access_token: login.access_token,
            user_id: login.user_id,
        });
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, ReverieError> {
        let session = self.session().await?;
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&session.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ReverieError::Channel(format!("matrix {what} failed: {e}")))?;
        decode(resp, what).await
    }

    async fn put<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> Result<T, ReverieError> {
        let session = self.session().await?;
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(&session.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ReverieError::Channel(format!("matrix {what} failed: {e}")))?;
        decode(resp, what).await
    }

    /// One `/sync` call. `timeout_ms` is how long the server may hold the request.
    pub(crate) async fn sync(
        &self,
        since: Option<&str>,
        timeout_ms: u64,
    ) -> Result<SyncResponse, ReverieError> {
        let mut query = vec![("timeout", timeout_ms.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }
        let session = self.session().await?;
        let resp = self
            .client
            .get(self.url("/sync"))
            .bearer_auth(&session.access_token)
            .query(&query)
            .timeout(std::time::Duration::from_millis(timeout_ms + 10_000))
            .send()
            .await
            .map_err(|e| ReverieError::Channel(format!("matrix sync failed: {e}")))?;
        decode(resp, "sync").await
    }

    pub async fn joined_rooms(&self) -> Result<Vec<String>, ReverieError> {
        let rooms: JoinedRoomsResponse = self.get("/joined_rooms", &[], "joined_rooms").await?;
        Ok(rooms.joined_rooms)
    }

    /// Room name from cache or room state, falling back to the room id.
    pub async fn room_name(&self, room_id: &str) -> String {
        if let Some(name) = self.room_names.lock().await.get(room_id) {
            return name.clone();
        }
        let path = format!("/rooms/{}/state/m.room.name", encode(room_id));
        match self.get::<RoomNameContent>(&path, &[], "room name").await {
            Ok(content) => {
                self.remember_room_name(room_id, &content.name).await;
                content.name
            }
            Err(e) => {
                debug!("matrix: no name for {room_id}: {e}");
                room_id.to_string()
            }
        }
    }

    pub(crate) async fn remember_room_name(&self, room_id: &str, name: &str) {
        self.room_names
            .lock()
            .await
            .insert(room_id.to_string(), name.to_string());
    }

    pub async fn joined_members(&self, room_id: &str) -> Result<Vec<ChatUser>, ReverieError> {
        let path = format!("/rooms/{}/joined_members", encode(room_id));
        let members: JoinedMembersResponse = self.get(&path, &[], "joined_members").await?;
        let mut users: Vec<ChatUser> = members
            .joined
            .into_iter()
            .map(|(id, profile)| ChatUser {
                name: profile
                    .display_name
                    .unwrap_or_else(|| localpart(&id).to_string()),
                id,
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    /// Text messages sent between `start` and `end` (unix seconds), oldest first.
    pub async fn messages(
        &self,
        room_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<RoomEvent>, ReverieError> {
        let path = format!("/rooms/{}/messages", encode(room_id));
        let mut collected = Vec::new();
        let mut from: Option<String> = None;

        for _ in 0..MAX_HISTORY_PAGES {
            let mut query = vec![
                ("dir", "b".to_string()),
                ("limit", HISTORY_PAGE_SIZE.to_string()),
            ];
            if let Some(from) = &from {
                query.push(("from", from.clone()));
            }
            let page: MessagesResponse = self.get(&path, &query, "messages").await?;
            let reached_start = page
                .chunk
                .last()
                .map_or(true, |e| e.origin_server_ts / 1000 < start);
            collected.extend(history_in_range(&page.chunk, start, end));

            match page.end {
                Some(token) if !reached_start => from = Some(token),
                _ => break,
            }
        }

        collected.reverse();
        Ok(collected)
    }

    /// Send a plain text message.
    pub async fn send_text(&self, room_id: &str, body: &str) -> Result<(), ReverieError> {
        let path = format!(
            "/rooms/{}/send/m.room.message/{}",
            encode(room_id),
            Uuid::new_v4()
        );
        let content = TextContent {
            msgtype: "m.text",
            body,
        };
        let _: serde_json::Value = self.put(&path, &content, "send").await?;
        Ok(())
    }

    pub async fn set_displayname(&self, name: &str) -> Result<(), ReverieError> {
        let session = self.session().await?;
        let path = format!("/profile/{}/displayname", encode(&session.user_id));
        let _: serde_json::Value = self
            .put(&path, &DisplayNameRequest { displayname: name }, "set displayname")
            .await?;
        Ok(())
    }

    pub async fn displayname(&self) -> Result<Option<String>, ReverieError> {
        let session = self.session().await?;
        let path = format!("/profile/{}/displayname", encode(&session.user_id));
        let resp: DisplayNameResponse = self.get(&path, &[], "get displayname").await?;
        Ok(resp.displayname)
    }
}

/// Decode a JSON response, turning Matrix error bodies into channel errors.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T, ReverieError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| {
                format!(
                    "{} {}",
                    e.errcode.unwrap_or_default(),
                    e.error.unwrap_or_default()
                )
            })
            .unwrap_or(text);
        return Err(ReverieError::Channel(format!(
            "matrix {what} returned {status}: {}",
            detail.trim()
        )));
    }
    resp.json()
        .await
        .map_err(|e| ReverieError::Channel(format!("matrix {what}: failed to parse response: {e}")))
}

/// Text events of a newest-first chunk whose timestamp lies in `[start, end]` seconds.
pub(crate) fn history_in_range(chunk: &[RawEvent], start: i64, end: i64) -> Vec<RoomEvent> {
    chunk
        .iter()
        .filter(|e| (start..=end).contains(&(e.origin_server_ts / 1000)))
        .filter_map(|e| {
            let body = e.text_body()?;
            Some(RoomEvent {
                sender: e.sender.clone(),
                content: body.to_string(),
                timestamp: DateTime::<Utc>::from_timestamp_millis(e.origin_server_ts)?,
            })
        })
        .collect()
}
