//! Serializable snapshots of guilds and tournaments.
//!
//! A snapshot is flat and re-resolvable: opaque identifiers only, no live
//! platform handles. Round-trip law: rehydrating a snapshot reproduces a
//! guild with identical field values and tournament set, except that a pending
//! job whose fire time elapsed during downtime fires immediately instead of
//! being dropped or rescheduled at the stale absolute time.
//!
//! The encoding is JSON (one array of guild records per state file); the
//! contract is the field set, not the bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::{ChannelId, EventId, GuildId, ParticipantId, RoleId};
use crate::tournament::{PendingJob, Phase};

/// Stored record of one provisioned guild and its tournaments.
///
/// The provisioning identifiers are always all present: a guild that never
/// completed `setup` is not persisted at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSnapshot {
    /// The community space this record belongs to.
    pub guild: GuildId,
    /// The "Tournament host" role.
    pub host_role: RoleId,
    /// The category all tournament channels nest under.
    pub category: ChannelId,
    /// The pinned-welcome announcement channel.
    pub announcement: ChannelId,
    /// Tournaments in creation order.
    pub tournaments: Vec<TournamentSnapshot>,
}

/// Stored record of one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    /// Display name.
    pub name: String,
    /// The organizing account.
    pub host: ParticipantId,
    /// When registration locks.
    pub start_at: DateTime<Utc>,
    /// Roster capacity.
    pub max_players: u32,
    /// Free-text description.
    pub description: String,
    /// Lifecycle phase at snapshot time.
    pub phase: Phase,
    /// Roster in join order.
    pub participants: Vec<ParticipantId>,
    /// The tournament's dedicated channel, if provisioned.
    pub channel: Option<ChannelId>,
    /// Scheduled-event announcement, if one was recorded.
    pub event: Option<EventId>,
    /// The still-pending transition job, if any.
    pub pending_job: Option<PendingJob>,
}
