//! Shared sync state shown next to captured events.

/// Delivery status badge for the operator.
///
/// Network problems only ever surface through this badge, never as a
/// blocking error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// Pending entries are waiting while online and no pass is running,
    /// either not yet attempted or stalled on a failed attempt.
    Unsynced,
}

impl SyncState {
    /// Derive the badge from the pending count and the current activity.
    pub const fn from_outbox(pending: usize, online: bool, in_flight: bool) -> Self {
        if pending == 0 {
            Self::Synced
        } else if !online {
            Self::Offline
        } else if in_flight {
            Self::Syncing
        } else {
            Self::Unsynced
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Unsynced => "unsynced",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outbox_is_synced_even_offline() {
        assert_eq!(SyncState::from_outbox(0, false, false), SyncState::Synced);
    }

    #[test]
    fn pending_entries_reflect_connectivity() {
        assert_eq!(SyncState::from_outbox(3, false, false), SyncState::Offline);
        assert_eq!(SyncState::from_outbox(3, true, true), SyncState::Syncing);
        assert_eq!(SyncState::from_outbox(3, true, false), SyncState::Unsynced);
    }
}
