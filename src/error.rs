//! Error types for tournament orchestration.
//!
//! Business-rule rejections ([`TournamentError`]) are expected and reported to
//! the caller; they never crash the bot. Platform transport failures
//! ([`PlatformError`]) are retried when transient and otherwise surfaced
//! without advancing any tournament state.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::platform::{GuildId, ObjectKind, ParticipantId};
use crate::tournament::{Phase, TournamentId};

/// Failures reported by the chat-platform integration.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The referenced object does not exist (or no longer exists) on the platform.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of object that was looked up.
        kind: ObjectKind,
        /// The opaque numeric identifier that failed to resolve.
        id: u64,
    },

    /// The platform did not answer in time.
    #[error("platform request timed out")]
    Timeout,

    /// A failure that is expected to succeed on retry (rate limit, gateway hiccup).
    #[error("transient platform failure: {0}")]
    Transient(String),

    /// The platform refused the request; retrying will not help.
    #[error("platform rejected request: {0}")]
    Rejected(String),
}

impl PlatformError {
    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Timeout | PlatformError::Transient(_))
    }
}

/// Everything that can go wrong while orchestrating tournaments.
#[derive(Debug, Error)]
pub enum TournamentError {
    /// A tournament needs a display name.
    #[error("tournament name must not be empty")]
    EmptyName,

    /// `max_players` must be at least one.
    #[error("maximum player count must be positive")]
    NonPositiveCapacity,

    /// Tournaments cannot start in the past.
    #[error("start time {0} is in the past")]
    StartInPast(DateTime<Utc>),

    /// The roster is full.
    #[error("tournament is full ({max} players)")]
    CapacityExceeded {
        /// The configured roster capacity.
        max: u32,
    },

    /// The participant is already on the roster.
    #[error("participant {0} already joined")]
    AlreadyJoined(ParticipantId),

    /// `setup` was called on a guild that already has its structures.
    #[error("guild {0} is already provisioned")]
    AlreadyProvisioned(GuildId),

    /// The guild has not been set up for tournaments yet.
    #[error("guild {0} has not been set up for tournaments")]
    NotProvisioned(GuildId),

    /// The operation is not valid in the tournament's current phase.
    #[error("operation not allowed in phase {phase}")]
    PhaseClosed {
        /// The phase the tournament was in when the operation was rejected.
        phase: Phase,
    },

    /// No tournament with this identifier exists in the guild.
    #[error("no tournament with id {0}")]
    UnknownTournament(TournamentId),

    /// A persisted identifier no longer resolves on the platform.
    #[error("stored {kind} {id} no longer resolves on the platform")]
    UnresolvedReference {
        /// Kind of object the stored identifier referred to.
        kind: ObjectKind,
        /// The stale identifier.
        id: u64,
    },

    /// A platform call failed after exhausting retries.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
