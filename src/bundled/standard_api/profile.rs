//! Prompt texts the bot feeds to the model.

use reverie_commands::Signature;
use reverie_core::message::ChatMessage;
use reverie_memory::Period;

/// What each command is for, keyed by command name.
const COMMAND_HELP: &[(&str, &str)] = &[
    ("help", "Displays this guide."),
    (
        "set_my_name",
        "Assigns a unique and entertaining name for yourself (e.g. ChatMaster3000). Can only be used once.",
    ),
    ("get_my_name", "Retrieves your assigned name if forgotten."),
    (
        "timeout",
        "Pauses activity for the given number of seconds, then resumes with a wake up message.",
    ),
    (
        "wake_at",
        "Pauses activity until the given date (YYYY-MM-DD or YYYY-MM-DD HH:MM, UTC).",
    ),
    (
        "send_message",
        "Sends a message to a room, optionally addressed to one user.",
    ),
    (
        "request_rooms_list",
        "Retrieves the rooms you are in with their names and members.",
    ),
    (
        "request_room_history",
        "Retrieves past messages of a room between two dates (YYYY-MM-DD).",
    ),
    ("get_users", "Lists the members of a room with their names and ids."),
    (
        "store_summary",
        "Stores a summary for an interval (daily, weekly, monthly, yearly) starting at a date.",
    ),
    ("get_summary", "Retrieves a previously stored summary."),
    (
        "store_mind_map",
        "Saves key points and reminders about your role; memory starts empty.",
    ),
    ("get_mind_map", "Retrieves your mind map."),
];

const GUIDELINES: &str = "\
Guidelines

    Use send_message() for all responses, always naming the receiver_room_id.
    Use timeout() or wake_at() when there is nothing to do, instead of waiting for replies.
    Use store_summary() and store_mind_map() regularly to keep context in long conversations.
    Keep track of messages that need a follow-up.
    Keep an eye on user activity and invite quieter participants to engage.

Reminder: answer with exactly one command per reply.";

/// The command guide. Shown at startup and on `help()`.
pub fn initial_prompt(bot_name: Option<&str>, commands: &[Signature]) -> String {
    let mut out = String::from(
        "You are an AI assistant in a messaging app with a dynamic number of participants, \
         including both humans and bots.\n\
         Below are your available commands and guidelines for managing conversations.\n\n",
    );
    if let Some(name) = bot_name {
        out.push_str(&format!("Your name: {name}\n\n"));
    }

    out.push_str(
        "Commands\n\n    Important: use only these commands and the exact syntax in every response.\n\n",
    );
    for signature in commands {
        let name = signature.command();
        if name == "set_my_name" && bot_name.is_some() {
            continue;
        }
        let help = COMMAND_HELP
            .iter()
            .find(|(command, _)| *command == name)
            .map_or("", |(_, help)| help);
        out.push_str(&format!("    {}: {help}\n", signature.usage()));
    }

    out.push('\n');
    out.push_str(GUIDELINES);
    out
}

pub fn no_activity(idle_secs: u64) -> String {
    format!("woke up after {} of inactivity", human_duration(idle_secs))
}

pub fn woke_after(secs: u64) -> String {
    format!("woke up after a planned pause of {}", human_duration(secs))
}

pub fn new_message(message: &ChatMessage) -> String {
    format!(
        "new message:\nsender name: {}\nsender id: {}\nroom_name: {}\nroom_id: {}\nmessage:\n{}",
        message.sender_name, message.sender_id, message.room_name, message.room_id, message.text
    )
}

pub fn invalid_command(diagnostic: &str) -> String {
    format!(
        "error: {diagnostic}\nYou are an AI assistant, please use the proper syntax.\n\
         Answer with \"help()\" if you want to see the available commands."
    )
}

pub const MESSAGE_SENT: &str = "Message sent successfully";

pub fn message_failed(error: &str) -> String {
    format!("Failed to send message error: {error}")
}

pub fn rooms_list(rooms_json: &str) -> String {
    format!("Room List:\n{rooms_json}")
}

pub fn room_history(history_json: &str) -> String {
    format!("Room History:\n{history_json}")
}

pub fn users(users_json: &str) -> String {
    format!("Users:\n{users_json}")
}

pub fn request_failed(command: &str, error: &str) -> String {
    format!("{command} failed: {error}")
}

pub const SUMMARY_STORED: &str = "summary stored successfully";
pub const SUMMARY_EMPTY: &str = "summary is empty";
pub const MIND_MAP_STORED: &str = "mind_map stored successfully";
pub const MIND_MAP_EMPTY: &str = "mind map is empty";
pub const NAME_ALREADY_SET: &str = "error: name already taken";
pub const NAME_NOT_SET: &str = "error: you have no name yet, use set_my_name()";
pub const INVALID_START_TIME: &str =
    "start time is invalid, should be YYYY-MM-DD or YYYY-MM-DD HH:MM";

pub fn invalid_interval() -> String {
    let valid: Vec<&str> = Period::ALL.iter().map(|p| p.as_str()).collect();
    format!("the interval is not valid, valid are: {}", valid.join(", "))
}

pub fn my_name(name: &str) -> String {
    format!("Your name is: {name}")
}

pub fn chat_name_failed(error: &str) -> String {
    format!("error setting name on chat app:\n{error}")
}

pub fn summary(text: &str) -> String {
    format!("Summary:\n{text}")
}

pub fn mind_map(text: &str) -> String {
    format!("Mind map:\n{text}")
}

/// `90061` -> `1 day 1 hour 1 minute 1 second`.
fn human_duration(secs: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "day"), (3_600, "hour"), (60, "minute"), (1, "second")];
    if secs == 0 {
        return "0 seconds".to_string();
    }
    let mut left = secs;
    let mut parts = Vec::new();
    for (size, unit) in UNITS {
        let n = left / size;
        left %= size;
        if n > 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {unit}{plural}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(0), "0 seconds");
        assert_eq!(human_duration(86_400), "1 day");
        assert_eq!(human_duration(90_061), "1 day 1 hour 1 minute 1 second");
        assert_eq!(human_duration(7_320), "2 hours 2 minutes");
    }

    #[test]
    fn test_initial_prompt_hides_set_my_name_once_named() {
        let table = vec![
            Signature::new("_help"),
            Signature::new("_set_my_name").required("bot_name"),
        ];
        let unnamed = initial_prompt(None, &table);
        assert!(unnamed.contains("set_my_name(bot_name): Assigns"));
        assert!(unnamed.contains("help(): Displays this guide."));

        let named = initial_prompt(Some("Nyx"), &table);
        assert!(named.contains("Your name: Nyx"));
        assert!(!named.contains("set_my_name"));
    }

    #[test]
    fn test_invalid_interval_lists_periods() {
        assert_eq!(
            invalid_interval(),
            "the interval is not valid, valid are: daily, weekly, monthly, yearly"
        );
    }
}
