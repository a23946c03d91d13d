//! Wake scheduler: decides when the agent acts on its own and when it dreams.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reverie_core::{
    config::AgentConfig,
    schedule::{DreamSignal, ScheduleKind, WakeUpSchedule},
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::host::{Broadcast, BroadcastEvent, PluginHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WakePhase {
    Sleeping,
    Dreaming,
    Waking,
}

/// What one scheduler tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The wake-up was due and `OnScheduledWakeup` went out.
    Woke(Broadcast),
    /// Dreaming started and `Dream` went out.
    StartedDreaming(Broadcast),
    StillDreaming,
}

struct State {
    schedule: WakeUpSchedule,
    fired: Option<WakeUpSchedule>,
    dreaming: bool,
    phase: WakePhase,
}

/// Owns the live wake-up schedule and the dream latch.
pub struct WakeScheduler {
    state: Mutex<State>,
    dream_tx: watch::Sender<bool>,
    idle_timeout_secs: u64,
    poll_interval: Duration,
}

impl WakeScheduler {
    /// Boots in `Waking` with a wake-up due immediately.
    ///
    /// Both intervals are at least one second, so a wake-up never schedules
    /// the next one as already due.
    pub fn new(idle_timeout_secs: u64, poll_interval_secs: u64) -> Self {
        let (dream_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(State {
                schedule: WakeUpSchedule::planned(Utc::now(), 0),
                fired: None,
                dreaming: false,
                phase: WakePhase::Waking,
            }),
            dream_tx,
            idle_timeout_secs: idle_timeout_secs.max(1),
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
        }
    }

    pub fn from_config(agent: &AgentConfig) -> Self {
        Self::new(agent.idle_timeout_secs, agent.poll_interval_secs)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.idle_timeout_secs
    }

    pub fn schedule(&self) -> WakeUpSchedule {
        self.lock().schedule.clone()
    }

    /// Replace the live schedule.
    pub fn set_schedule(&self, schedule: WakeUpSchedule) {
        info!(
            "Next wake-up ({:?}) at {}",
            schedule.kind,
            schedule.wakeup_at.format("%Y-%m-%d %H:%M:%S")
        );
        self.lock().schedule = schedule;
    }

    /// Schedule a wake-up `secs` from now.
    pub fn schedule_in(&self, kind: ScheduleKind, secs: u64) -> WakeUpSchedule {
        let schedule = WakeUpSchedule::after(kind, Utc::now(), secs);
        self.set_schedule(schedule.clone());
        schedule
    }

    /// Plan a wake-up at `at`. Past times fire on the next tick.
    pub fn schedule_at(&self, at: DateTime<Utc>) -> WakeUpSchedule {
        let schedule = WakeUpSchedule::planned_at(Utc::now(), at);
        self.set_schedule(schedule.clone());
        schedule
    }

    /// The schedule that fired most recently.
    pub fn fired_schedule(&self) -> Option<WakeUpSchedule> {
        self.lock().fired.clone()
    }

    pub fn phase(&self) -> WakePhase {
        self.lock().phase
    }

    pub fn is_dreaming(&self) -> bool {
        self.lock().dreaming
    }

    /// A fresh view of the dream latch.
    pub fn dream_signal(&self) -> DreamSignal {
        DreamSignal::new(self.dream_tx.subscribe())
    }

    /// Evaluate the schedule once at `now`.
    pub fn tick(&self, host: &PluginHost, now: DateTime<Utc>) -> TickOutcome {
        let mut state = self.lock();

        if state.schedule.is_due(now) {
            let next = WakeUpSchedule::timeout(now, self.idle_timeout_secs);
            let fired = std::mem::replace(&mut state.schedule, next);
            state.fired = Some(fired);
            state.dreaming = false;
            self.dream_tx.send_replace(false);
            state.phase = WakePhase::Sleeping;
            drop(state);

            info!("Scheduled wake-up is due, waking plugins");
            return TickOutcome::Woke(host.broadcast(BroadcastEvent::ScheduledWakeup));
        }

        if !state.dreaming {
            state.dreaming = true;
            self.dream_tx.send_replace(true);
            state.phase = WakePhase::Dreaming;
            let remaining = state.schedule.remaining(now);
            drop(state);

            info!("Dreaming until next wake-up in {}s", remaining.num_seconds());
            return TickOutcome::StartedDreaming(
                host.broadcast(BroadcastEvent::Dream(self.dream_signal())),
            );
        }

        state.phase = WakePhase::Dreaming;
        TickOutcome::StillDreaming
    }

    /// Drive the scheduler forever.
    ///
    /// Sleeps one poll interval only while a dream is in progress; a wake-up
    /// or a fresh dream is followed by an immediate re-evaluation.
    pub async fn run(self: Arc<Self>, host: Arc<PluginHost>) {
        info!(
            "Wake scheduler started (idle timeout {}s, poll every {}s)",
            self.idle_timeout_secs,
            self.poll_interval.as_secs()
        );
        loop {
            match self.tick(&host, Utc::now()) {
                TickOutcome::StillDreaming => {
                    debug!("Still dreaming");
                    tokio::time::sleep(self.poll_interval).await;
                }
                TickOutcome::Woke(_) | TickOutcome::StartedDreaming(_) => {
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}
