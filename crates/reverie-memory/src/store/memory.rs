//! What the bot remembers between runs.

use chrono::{DateTime, Utc};
use reverie_core::message::{ModelMessage, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Length of the span a periodic summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    pub const ALL: [Period; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("expected one of daily, weekly, monthly, yearly, got '{s}'")
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicSummary {
    pub period: Period,
    /// Unix timestamp (seconds) of the start of the period.
    pub period_start: i64,
    pub summary_text: String,
}

/// A model conversation turn with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub message: ModelMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMemory {
    /// Chosen by the model itself, at most once.
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub mind_map: Option<String>,
    #[serde(default)]
    pub periodic_summaries: BTreeMap<Period, BTreeMap<i64, PeriodicSummary>>,
    /// Oldest first.
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

impl BotMemory {
    /// Store (or overwrite) the summary of the period starting at `start`.
    pub fn set_periodic_summary(&mut self, period: Period, start: i64, summary: &str) {
        self.periodic_summaries.entry(period).or_default().insert(
            start,
            PeriodicSummary {
                period,
                period_start: start,
                summary_text: summary.to_string(),
            },
        );
    }

    pub fn periodic_summary(&self, period: Period, start: i64) -> Option<&PeriodicSummary> {
        self.periodic_summaries.get(&period)?.get(&start)
    }

    pub fn add_message(&mut self, role: Role, content: &str, at: DateTime<Utc>) {
        self.messages.push(StoredMessage {
            timestamp: at,
            message: ModelMessage::new(role, content),
        });
    }

    /// The newest `n` messages, oldest first.
    pub fn last_messages(&self, n: usize) -> Vec<ModelMessage> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages[skip..]
            .iter()
            .map(|m| m.message.clone())
            .collect()
    }
}
