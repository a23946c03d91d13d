use super::polling::{room_names, text_messages, SyncText};
use super::*;

const SYNC: &str = r#"{
  "next_batch": "s72595_4483_1934",
  "rooms": {
    "join": {
      "!lobby:example.org": {
        "state": {
          "events": [
            {"type": "m.room.name", "sender": "@admin:example.org", "content": {"name": "Old lobby"}, "origin_server_ts": 1}
          ]
        },
        "timeline": {
          "events": [
            {"type": "m.room.name", "sender": "@admin:example.org", "content": {"name": "Lobby"}, "origin_server_ts": 2},
            {"type": "m.room.message", "sender": "@alice:example.org", "content": {"msgtype": "m.text", "body": "hello bot"}, "origin_server_ts": 1704067200000},
            {"type": "m.room.message", "sender": "@reverie:example.org", "content": {"msgtype": "m.text", "body": "my own echo"}, "origin_server_ts": 1704067201000},
            {"type": "m.room.message", "sender": "@bob:example.org", "content": {"msgtype": "m.image", "body": "cat.png"}, "origin_server_ts": 1704067202000},
            {"type": "m.reaction", "sender": "@bob:example.org", "content": {}, "origin_server_ts": 1704067203000},
            {"type": "m.room.message", "sender": "@bob:example.org", "content": {"msgtype": "m.text", "body": "second"}, "origin_server_ts": 1704067204000}
          ]
        }
      }
    }
  }
}"#;

#[test]
fn test_text_messages_skip_own_and_non_text() {
    let sync: types::SyncResponse = serde_json::from_str(SYNC).unwrap();
    let texts = text_messages(&sync, "@reverie:example.org");
    assert_eq!(
        texts,
        vec![
            SyncText {
                room_id: "!lobby:example.org".into(),
                sender: "@alice:example.org".into(),
                body: "hello bot".into(),
            },
            SyncText {
                room_id: "!lobby:example.org".into(),
                sender: "@bob:example.org".into(),
                body: "second".into(),
            },
        ]
    );
}

#[test]
fn test_room_name_latest_wins() {
    let sync: types::SyncResponse = serde_json::from_str(SYNC).unwrap();
    assert_eq!(
        room_names(&sync),
        vec![("!lobby:example.org".to_string(), "Lobby".to_string())]
    );
}

#[test]
fn test_empty_sync_parses() {
    let sync: types::SyncResponse = serde_json::from_str(r#"{"next_batch":"s1"}"#).unwrap();
    assert!(text_messages(&sync, "@me:x").is_empty());
    assert_eq!(sync.next_batch, "s1");
}

#[test]
fn test_history_in_range_filters_time_and_type() {
    let sync: types::SyncResponse = serde_json::from_str(SYNC).unwrap();
    let mut chunk = sync.rooms.join["!lobby:example.org"].timeline.events.clone();
    chunk.reverse();

    let history = history_in_range(&chunk, 1_704_067_201, 1_704_067_210);
    let bodies: Vec<&str> = history.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(bodies, vec!["second", "my own echo"]);
    assert_eq!(history[0].timestamp.timestamp(), 1_704_067_204);
}

#[test]
fn test_localpart() {
    assert_eq!(localpart("@alice:example.org"), "alice");
    assert_eq!(localpart("bob"), "bob");
}

#[test]
fn test_url_layout() {
    let client = MatrixClient::new(&MatrixConfig {
        server: "https://matrix.example.org/".into(),
        user_name: "reverie".into(),
        password: "secret".into(),
    });
    assert_eq!(
        client.url("/joined_rooms"),
        "https://matrix.example.org/_matrix/client/v3/joined_rooms"
    );
}

#[tokio::test]
async fn test_calls_require_login() {
    let client = MatrixClient::new(&MatrixConfig::default());
    assert!(!client.is_logged_in().await);
    let err = client.joined_rooms().await.unwrap_err();
    assert!(matches!(err, ReverieError::Channel(_)));
}
