//! In-memory platform fake used by the lifecycle tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use guild_tournament::prelude::*;

/// One recorded platform mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCategory {
        guild: GuildId,
        name: String,
    },
    CreateChannel {
        guild: GuildId,
        name: String,
        kind: ChannelKind,
        parent: Option<ChannelId>,
        overwrites: Vec<PermissionOverwrite>,
    },
    CreateRole {
        guild: GuildId,
        name: String,
    },
    GrantRole {
        participant: ParticipantId,
        role: RoleId,
    },
    SendMessage {
        channel: ChannelId,
        text: String,
    },
    PinMessage {
        channel: ChannelId,
        message: MessageId,
    },
}

/// Records every mutation and hands out fresh identifiers. Identifiers added
/// to the dead set stop resolving, simulating objects deleted externally.
pub struct FakePlatform {
    next_id: AtomicU64,
    pub calls: Mutex<Vec<Call>>,
    dead: Mutex<HashSet<u64>>,
    muted: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            calls: Mutex::new(vec![]),
            dead: Mutex::new(HashSet::new()),
            muted: AtomicBool::new(false),
        }
    }

    fn fresh(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Make an identifier stop resolving.
    pub fn kill(&self, id: u64) {
        self.dead.lock().unwrap().insert(id);
    }

    /// Reject every `send_message` until [`unmute`](Self::unmute).
    pub fn mute(&self) {
        self.muted.store(true, Ordering::Relaxed);
    }

    /// Accept messages again.
    pub fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
    }

    /// How many sent messages contain `needle`.
    pub fn messages_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, Call::SendMessage { text, .. } if text.contains(needle)))
            .count()
    }

    /// How many messages were pinned.
    pub fn pinned_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, Call::PinMessage { .. }))
            .count()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn create_category(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        let id = ChannelId(self.fresh());
        self.record(Call::CreateCategory {
            guild,
            name: name.to_owned(),
        });
        Ok(id)
    }

    async fn create_channel(
        &self,
        guild: GuildId,
        name: &str,
        kind: ChannelKind,
        parent: Option<ChannelId>,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelId, PlatformError> {
        let id = ChannelId(self.fresh());
        self.record(Call::CreateChannel {
            guild,
            name: name.to_owned(),
            kind,
            parent,
            overwrites: overwrites.to_vec(),
        });
        Ok(id)
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        _color: u32,
    ) -> Result<RoleId, PlatformError> {
        let id = RoleId(self.fresh());
        self.record(Call::CreateRole {
            guild,
            name: name.to_owned(),
        });
        Ok(id)
    }

    async fn everyone_role(&self, guild: GuildId) -> Result<RoleId, PlatformError> {
        Ok(RoleId(guild.0))
    }

    async fn supports_announcements(&self, _guild: GuildId) -> Result<bool, PlatformError> {
        Ok(false)
    }

    async fn grant_role(
        &self,
        _guild: GuildId,
        participant: ParticipantId,
        role: RoleId,
    ) -> Result<(), PlatformError> {
        self.record(Call::GrantRole { participant, role });
        Ok(())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<MessageId, PlatformError> {
        if self.muted.load(Ordering::Relaxed) {
            return Err(PlatformError::Rejected("messages are muted".to_owned()));
        }
        let id = MessageId(self.fresh());
        self.record(Call::SendMessage {
            channel,
            text: text.to_owned(),
        });
        Ok(id)
    }

    async fn pin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.record(Call::PinMessage { channel, message });
        Ok(())
    }

    async fn resolve(&self, kind: ObjectKind, id: u64) -> Result<(), PlatformError> {
        if self.dead.lock().unwrap().contains(&id) {
            Err(PlatformError::NotFound { kind, id })
        } else {
            Ok(())
        }
    }
}
