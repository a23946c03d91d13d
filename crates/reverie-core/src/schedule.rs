//! Wake-up schedule record and the dream signal handed to dreaming plugins.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Why the next wake-up was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Default idle timeout after the previous wake-up.
    Timeout,
    /// Explicitly requested, e.g. by a model command.
    Planned,
}

/// When the agent should next act on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeUpSchedule {
    pub kind: ScheduleKind,
    pub wakeup_at: DateTime<Utc>,
    /// Seconds between creation and `wakeup_at`.
    pub sleep_duration: u64,
}

impl WakeUpSchedule {
    /// Schedule a wake-up `sleep_secs` after `now`.
    pub fn after(kind: ScheduleKind, now: DateTime<Utc>, sleep_secs: u64) -> Self {
        let secs = i64::try_from(sleep_secs).unwrap_or(i64::MAX);
        let wakeup_at = Duration::try_seconds(secs)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            kind,
            wakeup_at,
            sleep_duration: sleep_secs,
        }
    }

    pub fn timeout(now: DateTime<Utc>, sleep_secs: u64) -> Self {
        Self::after(ScheduleKind::Timeout, now, sleep_secs)
    }

    pub fn planned(now: DateTime<Utc>, sleep_secs: u64) -> Self {
        Self::after(ScheduleKind::Planned, now, sleep_secs)
    }

    /// Planned wake-up at an absolute time. Times in the past fire on the next tick.
    pub fn planned_at(now: DateTime<Utc>, at: DateTime<Utc>) -> Self {
        let secs = (at - now).num_seconds().max(0) as u64;
        Self::planned(now, secs)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.wakeup_at
    }

    /// Time left until the wake-up, zero once due.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.wakeup_at - now).max(Duration::zero())
    }
}

/// Receiver side of the dream latch.
///
/// Dreaming plugins poll `is_dreaming()` or await `woken()` to learn when the
/// current dream cycle ends.
#[derive(Debug, Clone)]
pub struct DreamSignal {
    rx: watch::Receiver<bool>,
}

impl DreamSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_dreaming(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the latch is cleared (or the scheduler is dropped).
    pub async fn woken(&mut self) {
        let _ = self.rx.wait_for(|dreaming| !*dreaming).await;
    }
}
