//! Capability names and the compact set computed once per plugin at registration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One optional behavior a plugin may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
    OnStartup,
    OnScheduledWakeup,
    NewMessageCallback,
    Dream,
    Api,
    SendMessage,
    GetRoomsList,
    GetRoomHistory,
    GetUsers,
    SetChatUserName,
}

impl CapabilityName {
    /// Every capability, in declaration order.
    pub const ALL: [CapabilityName; 10] = [
        Self::OnStartup,
        Self::OnScheduledWakeup,
        Self::NewMessageCallback,
        Self::Dream,
        Self::Api,
        Self::SendMessage,
        Self::GetRoomsList,
        Self::GetRoomHistory,
        Self::GetUsers,
        Self::SetChatUserName,
    ];

    /// Snake-case name used in logs and the web API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnStartup => "on_startup",
            Self::OnScheduledWakeup => "on_scheduled_wakeup",
            Self::NewMessageCallback => "new_message_callback",
            Self::Dream => "dream",
            Self::Api => "api",
            Self::SendMessage => "send_message",
            Self::GetRoomsList => "get_rooms_list",
            Self::GetRoomHistory => "get_room_history",
            Self::GetUsers => "get_users",
            Self::SetChatUserName => "set_chat_user_name",
        }
    }

    /// Whether the host fans this capability out to every implementer.
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            Self::OnStartup | Self::OnScheduledWakeup | Self::NewMessageCallback | Self::Dream
        )
    }

    /// Whether the host routes this capability to a single implementer.
    pub fn is_single_responder(&self) -> bool {
        matches!(
            self,
            Self::SendMessage
                | Self::GetRoomsList
                | Self::GetRoomHistory
                | Self::GetUsers
                | Self::SetChatUserName
        )
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of capabilities implemented by one plugin.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, capability: CapabilityName) {
        self.0 |= capability.bit();
    }

    pub fn contains(&self, capability: CapabilityName) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = CapabilityName> + '_ {
        CapabilityName::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl FromIterator<CapabilityName> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityName>>(iter: I) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_membership() {
        let set: CapabilitySet = [CapabilityName::Dream, CapabilityName::SendMessage]
            .into_iter()
            .collect();
        assert!(set.contains(CapabilityName::Dream));
        assert!(set.contains(CapabilityName::SendMessage));
        assert!(!set.contains(CapabilityName::OnStartup));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iter_declaration_order() {
        let set: CapabilitySet = [CapabilityName::GetUsers, CapabilityName::OnStartup]
            .into_iter()
            .collect();
        let names: Vec<_> = set.iter().collect();
        assert_eq!(names, vec![CapabilityName::OnStartup, CapabilityName::GetUsers]);
    }

    #[test]
    fn test_dispatch_modes_partition() {
        for capability in CapabilityName::ALL {
            let modes = [capability.is_broadcast(), capability.is_single_responder()];
            if capability == CapabilityName::Api {
                assert_eq!(modes, [false, false]);
            } else {
                assert_eq!(modes.iter().filter(|m| **m).count(), 1, "{capability}");
            }
        }
    }

    #[test]
    fn test_serialize_as_names() {
        let set: CapabilitySet = [CapabilityName::NewMessageCallback].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["new_message_callback"]"#);
    }
}
