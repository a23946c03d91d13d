use super::*;
use chrono::TimeZone;
use reverie_core::message::Role;
use tempfile::TempDir;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
}

#[tokio::test]
async fn test_open_missing_file_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let store = Store::open(tmp.path().join("nested/bot_memory.json"))
        .await
        .unwrap();
    assert_eq!(store.read(|m| m.clone()).await, BotMemory::default());
    assert!(tmp.path().join("nested").is_dir());
}

#[tokio::test]
async fn test_update_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bot_memory.json");

    let store = Store::open(&path).await.unwrap();
    store
        .update(|m| {
            m.bot_name = Some("Nyx".into());
            m.mind_map = Some("people: alice".into());
            m.set_periodic_summary(Period::Weekly, 1_704_067_200, "quiet week");
            m.add_message(Role::User, "hello", t(0));
            m.add_message(Role::Assistant, "help()", t(1));
        })
        .await
        .unwrap();
    assert!(!path.with_extension("json.tmp").exists());

    let reopened = Store::open(&path).await.unwrap();
    let memory = reopened.read(|m| m.clone()).await;
    assert_eq!(memory.bot_name.as_deref(), Some("Nyx"));
    assert_eq!(memory.mind_map.as_deref(), Some("people: alice"));
    assert_eq!(
        memory
            .periodic_summary(Period::Weekly, 1_704_067_200)
            .map(|s| s.summary_text.as_str()),
        Some("quiet week")
    );
    assert_eq!(memory.messages.len(), 2);
    assert_eq!(memory.messages[1].message.role, Role::Assistant);
}

#[tokio::test]
async fn test_corrupt_file_is_memory_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bot_memory.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Store::open(&path).await.err().unwrap();
    assert!(matches!(err, ReverieError::Memory(_)));
}

#[test]
fn test_last_messages_window() {
    let mut memory = BotMemory::default();
    for i in 0..5 {
        memory.add_message(Role::User, &format!("m{i}"), t(i));
    }
    let window: Vec<String> = memory
        .last_messages(3)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(window, vec!["m2", "m3", "m4"]);
    assert_eq!(memory.last_messages(10).len(), 5);
    assert!(memory.last_messages(0).is_empty());
}

#[test]
fn test_summary_overwrite_and_lookup() {
    let mut memory = BotMemory::default();
    memory.set_periodic_summary(Period::Daily, 10, "first");
    memory.set_periodic_summary(Period::Daily, 10, "second");
    memory.set_periodic_summary(Period::Monthly, 10, "month");

    assert_eq!(
        memory.periodic_summary(Period::Daily, 10).unwrap().summary_text,
        "second"
    );
    assert!(memory.periodic_summary(Period::Yearly, 10).is_none());
    assert!(memory.periodic_summary(Period::Daily, 11).is_none());
}

#[test]
fn test_period_from_str() {
    assert_eq!("daily".parse::<Period>().unwrap(), Period::Daily);
    assert_eq!(" Yearly ".parse::<Period>().unwrap(), Period::Yearly);
    assert!("hourly".parse::<Period>().is_err());
}

#[test]
fn test_parse_date_formats() {
    assert_eq!(
        parse_date("2024-01-01").unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        parse_date("2024-01-01 13:45").unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 13, 45, 0).unwrap()
    );
    assert!(parse_date("01/02/2024").is_err());
}
