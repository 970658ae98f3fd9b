//! Module defining the contract the chat-platform integration must implement.
//!
//! The orchestration core never talks to the platform SDK directly. Everything
//! it needs — creating structural objects, granting roles, sending and pinning
//! messages, and re-resolving stored identifiers after a restart — goes through
//! the [`Platform`] trait. Identifiers are opaque `u64` newtypes; a resolved
//! identifier is cached for the lifetime of the in-memory object that holds it
//! and only re-validated during rehydration.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::configuration::Configuration;
use crate::error::PlatformError;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Identifier of a community space (guild).
    GuildId
);
id_type!(
    /// Identifier of a channel or category.
    ChannelId
);
id_type!(
    /// Identifier of a role.
    RoleId
);
id_type!(
    /// Identifier of a participant account.
    ParticipantId
);
id_type!(
    /// Identifier of a sent message.
    MessageId
);
id_type!(
    /// Identifier of a scheduled platform event.
    EventId
);

/// The kinds of platform objects the core resolves by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A community space.
    Guild,
    /// A channel or category.
    Channel,
    /// A role.
    Role,
    /// A participant account.
    Participant,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Guild => "guild",
            ObjectKind::Channel => "channel",
            ObjectKind::Role => "role",
            ObjectKind::Participant => "participant",
        };
        write!(f, "{name}")
    }
}

/// Channel flavors the core creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// A grouping category that channels nest under.
    Category,
    /// A plain text channel.
    Text,
    /// An announcement channel (only available on community-enabled guilds).
    Announcement,
}

/// A per-role permission override applied when creating a channel.
///
/// The announcement channel is created with send access denied to the everyone
/// role and granted to the host role, so only hosts can post in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOverwrite {
    /// The role the override applies to.
    pub role: RoleId,
    /// Whether this role may send messages in the channel.
    pub send_messages: bool,
}

/// What the chat-platform integration should implement.
///
/// All methods are fallible network calls. Implementations are responsible for
/// their own timeouts; the core retries transient failures with bounded
/// backoff (see [`Configuration`]).
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a category in the guild and return its identifier.
    async fn create_category(&self, guild: GuildId, name: &str)
        -> Result<ChannelId, PlatformError>;

    /// Create a channel, optionally nested under a category.
    async fn create_channel(
        &self,
        guild: GuildId,
        name: &str,
        kind: ChannelKind,
        parent: Option<ChannelId>,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelId, PlatformError>;

    /// Create a role with the given display color.
    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: u32,
    ) -> Result<RoleId, PlatformError>;

    /// The guild's implicit everyone role, used for permission overrides.
    async fn everyone_role(&self, guild: GuildId) -> Result<RoleId, PlatformError>;

    /// Whether this guild supports announcement channels.
    async fn supports_announcements(&self, guild: GuildId) -> Result<bool, PlatformError>;

    /// Grant a role to a participant.
    async fn grant_role(
        &self,
        guild: GuildId,
        participant: ParticipantId,
        role: RoleId,
    ) -> Result<(), PlatformError>;

    /// Send a text message to a channel.
    async fn send_message(&self, channel: ChannelId, text: &str)
        -> Result<MessageId, PlatformError>;

    /// Pin a previously sent message.
    async fn pin_message(&self, channel: ChannelId, message: MessageId)
        -> Result<(), PlatformError>;

    /// Check that an identifier still refers to a live object.
    ///
    /// # Error
    /// [`PlatformError::NotFound`] when the object was deleted externally.
    async fn resolve(&self, kind: ObjectKind, id: u64) -> Result<(), PlatformError>;
}

/// Run a platform call, retrying transient failures with linear backoff.
///
/// Permanent failures and exhausted retries are returned to the caller; the
/// caller decides whether the surrounding transition is abandoned.
pub(crate) async fn with_retries<T, F, Fut>(
    config: &Configuration,
    what: &str,
    mut call: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.platform_retries => {
                attempt += 1;
                let backoff = config.retry_backoff * attempt;
                warn!(
                    "{what} failed ({err}), retry {attempt}/{} in {backoff:?}",
                    config.platform_retries
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
