//! `/sync` long-polling loop.

use super::types::SyncResponse;
use super::MatrixClient;
use reverie_core::message::ChatMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const SYNC_TIMEOUT_MS: u64 = 30_000;

/// A text message found in a sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncText {
    pub room_id: String,
    pub sender: String,
    pub body: String,
}

/// `@alice:example.org` -> `alice`.
pub fn localpart(user_id: &str) -> &str {
    let id = user_id.strip_prefix('@').unwrap_or(user_id);
    id.split_once(':').map_or(id, |(local, _)| local)
}

/// Text messages from other users, in timeline order per room.
pub(crate) fn text_messages(sync: &SyncResponse, own_user_id: &str) -> Vec<SyncText> {
    let mut rooms: Vec<_> = sync.rooms.join.iter().collect();
    rooms.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = Vec::new();
    for (room_id, room) in rooms {
        for event in &room.timeline.events {
            if event.sender == own_user_id {
                continue;
            }
            if let Some(body) = event.text_body() {
                out.push(SyncText {
                    room_id: room_id.clone(),
                    sender: event.sender.clone(),
                    body: body.to_string(),
                });
            }
        }
    }
    out
}

/// Room names announced in a sync batch (latest wins).
pub(crate) fn room_names(sync: &SyncResponse) -> Vec<(String, String)> {
    let mut names = Vec::new();
    for (room_id, room) in &sync.rooms.join {
        let latest = room
            .state
            .events
            .iter()
            .chain(&room.timeline.events)
            .filter_map(|e| e.room_name())
            .last();
        if let Some(name) = latest {
            names.push((room_id.clone(), name.to_string()));
        }
    }
    names
}

impl MatrixClient {
    async fn absorb_names(&self, sync: &SyncResponse) {
        for (room_id, name) in room_names(sync) {
            self.remember_room_name(&room_id, &name).await;
        }
    }

    /// Start long polling. Messages from other users arrive on the receiver.
    ///
    /// History from before the call is skipped. The loop ends when the
    /// receiver is dropped.
    pub async fn start_sync(
        self: Arc<Self>,
    ) -> Result<mpsc::Receiver<ChatMessage>, reverie_core::error::ReverieError> {
        let own_user_id = self.user_id().await.unwrap_or_default();
        let initial = self.sync(None, 0).await?;
        self.absorb_names(&initial).await;
        let skipped = text_messages(&initial, &own_user_id).len();
        info!("matrix: sync started, skipped {skipped} old messages");

        let (tx, rx) = mpsc::channel(64);
        let mut since = initial.next_batch;

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;
            loop {
                let batch = match self.sync(Some(&since), SYNC_TIMEOUT_MS).await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("matrix sync error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };
                backoff_secs = 1;
                self.absorb_names(&batch).await;

                for text in text_messages(&batch, &own_user_id) {
                    let room_name = self.room_name(&text.room_id).await;
                    let message = ChatMessage {
                        sender_name: localpart(&text.sender).to_string(),
                        sender_id: text.sender,
                        text: text.body,
                        room_name,
                        room_id: text.room_id,
                    };
                    if tx.send(message).await.is_err() {
                        warn!("matrix: message receiver dropped, stopping sync");
                        return;
                    }
                }
                since = batch.next_batch;
            }
        });

        Ok(rx)
    }
}
