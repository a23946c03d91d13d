//! Capability dispatch over the loaded plugins.
//!
//! Broadcast capabilities run on every implementer, one supervised task per
//! plugin. Single-responder capabilities go to the first implementer in
//! registration order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use reverie_core::{
    capability::CapabilityName,
    error::ReverieError,
    message::{ChatMessage, RoomList, RoomSummary, RoomUsers, SendMessageResponse, SetUserNameResponse},
    schedule::DreamSignal,
    traits::Plugin,
};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::registry::{PluginDescriptor, PluginRegistry};

/// An event fanned out to every plugin implementing its capability.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    Startup,
    ScheduledWakeup,
    NewMessage(ChatMessage),
    Dream(DreamSignal),
}

impl BroadcastEvent {
    pub fn capability(&self) -> CapabilityName {
        match self {
            Self::Startup => CapabilityName::OnStartup,
            Self::ScheduledWakeup => CapabilityName::OnScheduledWakeup,
            Self::NewMessage(_) => CapabilityName::NewMessageCallback,
            Self::Dream(_) => CapabilityName::Dream,
        }
    }
}

/// Tasks issued by one broadcast. Dropping it detaches them.
#[derive(Debug)]
pub struct Broadcast {
    capability: CapabilityName,
    tasks: Vec<(String, JoinHandle<bool>)>,
}

/// How the tasks of one broadcast ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub completed: usize,
    pub failed: usize,
}

impl Broadcast {
    pub fn capability(&self) -> CapabilityName {
        self.capability
    }

    /// Plugin ids in the order their tasks were issued.
    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task of this broadcast.
    pub async fn join(self) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (id, task) in self.tasks {
            match task.await {
                Ok(true) => report.completed += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    error!("{} task for {id} was lost: {e}", self.capability);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Owns the registry and dispatches capabilities to it.
pub struct PluginHost {
    registry: PluginRegistry,
    tracker: TaskTracker,
}

impl PluginHost {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Invoke the event's capability on every implementer, each in its own task.
    ///
    /// Returns as soon as the tasks are issued. Failures are logged and never
    /// reach the caller or the other plugins.
    pub fn broadcast(&self, event: BroadcastEvent) -> Broadcast {
        let capability = event.capability();
        let mut tasks = Vec::new();

        for plugin in self.registry.with_capability(capability) {
            let id = plugin.id.clone();
            let instance = Arc::clone(&plugin.instance);
            let event = event.clone();
            let task_id = id.clone();

            let task = self.tracker.spawn(async move {
                let inner = tokio::spawn(deliver(instance, event));
                match inner.await {
                    Ok(Ok(())) => {
                        debug!("{capability} finished for {task_id}");
                        true
                    }
                    Ok(Err(e)) => {
                        error!("{capability} failed for {task_id}: {e}");
                        false
                    }
                    Err(e) => {
                        error!("{capability} panicked for {task_id}: {e}");
                        false
                    }
                }
            });
            tasks.push((id, task));
        }

        if tasks.is_empty() {
            debug!("No plugin implements {capability}");
        }
        Broadcast { capability, tasks }
    }

    /// Number of broadcast tasks still running.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new work and wait up to `timeout` for running tasks.
    ///
    /// Returns how many tasks were still running when the wait ended.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_err()
        {
            let left = self.tracker.len();
            warn!("{left} plugin tasks still running at shutdown");
            return left;
        }
        info!("All plugin tasks finished");
        0
    }

    fn responder(&self, capability: CapabilityName) -> Result<&PluginDescriptor, ReverieError> {
        self.registry
            .with_capability(capability)
            .next()
            .ok_or(ReverieError::NoCapablePlugin(capability))
    }

    pub async fn send_message(
        &self,
        text: &str,
        room_id: &str,
        user_id: Option<&str>,
    ) -> Result<SendMessageResponse, ReverieError> {
        let capability = CapabilityName::SendMessage;
        let plugin = self.responder(capability)?;
        let target = plugin
            .instance
            .as_send_message()
            .ok_or(ReverieError::NoCapablePlugin(capability))?;
        target
            .send_message(text, room_id, user_id)
            .await
            .map_err(|e| invocation_failed(plugin, capability, e))
    }

    pub async fn get_room_history(
        &self,
        room_id: &str,
        start: i64,
        end: i64,
    ) -> Result<RoomSummary, ReverieError> {
        let capability = CapabilityName::GetRoomHistory;
        let plugin = self.responder(capability)?;
        let target = plugin
            .instance
            .as_get_room_history()
            .ok_or(ReverieError::NoCapablePlugin(capability))?;
        target
            .get_room_history(room_id, start, end)
            .await
            .map_err(|e| invocation_failed(plugin, capability, e))
    }

    pub async fn get_users(&self, room_id: &str) -> Result<RoomUsers, ReverieError> {
        let capability = CapabilityName::GetUsers;
        let plugin = self.responder(capability)?;
        let target = plugin
            .instance
            .as_get_users()
            .ok_or(ReverieError::NoCapablePlugin(capability))?;
        target
            .get_users(room_id)
            .await
            .map_err(|e| invocation_failed(plugin, capability, e))
    }

    pub async fn set_chat_user_name(
        &self,
        new_name: &str,
    ) -> Result<SetUserNameResponse, ReverieError> {
        let capability = CapabilityName::SetChatUserName;
        let plugin = self.responder(capability)?;
        let target = plugin
            .instance
            .as_set_chat_user_name()
            .ok_or(ReverieError::NoCapablePlugin(capability))?;
        target
            .set_chat_user_name(new_name)
            .await
            .map_err(|e| invocation_failed(plugin, capability, e))
    }

    /// Rooms from every chat backend, in registration order.
    ///
    /// A backend that fails is logged and left out.
    pub async fn get_rooms_list(&self) -> Result<RoomList, ReverieError> {
        let capability = CapabilityName::GetRoomsList;
        let mut capable = 0;
        let mut rooms = Vec::new();

        for plugin in self.registry.with_capability(capability) {
            let Some(target) = plugin.instance.as_get_rooms_list() else {
                continue;
            };
            capable += 1;
            match target.get_rooms_list().await {
                Ok(list) => rooms.extend(list.rooms),
                Err(e) => {
                    invocation_failed(plugin, capability, e);
                }
            }
        }

        if capable == 0 {
            return Err(ReverieError::NoCapablePlugin(capability));
        }
        Ok(RoomList { rooms })
    }

    /// Merge every `Api` plugin's routes into `router`.
    ///
    /// A plugin whose routes overlap existing ones is logged and skipped.
    pub fn mount_routes(&self, mut router: Router) -> Router {
        for plugin in self.registry.with_capability(CapabilityName::Api) {
            let Some(api) = plugin.instance.as_api() else {
                continue;
            };
            let base = router.clone();
            match catch_unwind(AssertUnwindSafe(|| base.merge(api.routes()))) {
                Ok(merged) => {
                    info!("Mounted routes of {}", plugin.id);
                    router = merged;
                }
                Err(_) => error!("Routes of {} conflict with existing routes, skipping", plugin.id),
            }
        }
        router
    }
}

fn invocation_failed(
    plugin: &PluginDescriptor,
    capability: CapabilityName,
    e: ReverieError,
) -> ReverieError {
    error!("{capability} failed for {}: {e}", plugin.id);
    ReverieError::PluginInvocation {
        plugin: plugin.id.clone(),
        message: e.to_string(),
    }
}

async fn deliver(plugin: Arc<dyn Plugin>, event: BroadcastEvent) -> Result<(), ReverieError> {
    match event {
        BroadcastEvent::Startup => match plugin.as_on_startup() {
            Some(p) => p.on_startup().await,
            None => Ok(()),
        },
        BroadcastEvent::ScheduledWakeup => match plugin.as_on_scheduled_wakeup() {
            Some(p) => p.on_scheduled_wakeup().await,
            None => Ok(()),
        },
        BroadcastEvent::NewMessage(message) => match plugin.as_new_message_callback() {
            Some(p) => p.new_message_callback(message).await,
            None => Ok(()),
        },
        BroadcastEvent::Dream(signal) => match plugin.as_dream() {
            Some(p) => p.dream(signal).await,
            None => Ok(()),
        },
    }
}
