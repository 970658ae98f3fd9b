//! # Guild Tournament
//!
//! A Rust crate for orchestrating community tournaments across chat-platform guilds, with
//! scheduled lifecycle transitions and restart-safe persistence.
//!
//! It provides:
//! - Per-guild orchestration and provisioning (`TournamentGuild`)
//! - A four-phase tournament state machine (Registration → Locked → Running → Concluded)
//! - Wall-clock scheduled transitions via the `SchedulerAdapter`
//! - Flat, ID-only snapshots and partial-failure-tolerant rehydration (`GuildRegistry`)
//!
//! The chat platform itself (channels, roles, messages) sits behind the
//! [`Platform`](crate::platform::Platform) trait: the core creates and resolves platform objects
//! only through opaque numeric identifiers, so any platform SDK — or a fake in tests — can back
//! it.
//!
//! # Documentation Overview
//!
//! - For the tournament lifecycle and its invariants, see the [`tournament`] module.
//! - For provisioning, joins, and the transition commit protocol, see [`guild`].
//! - For timing behavior and retry/backoff knobs, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the persistence contract and the snapshot round-trip law, see [`snapshot`] and
//!   [`registry`].
//!
//! # Usage Example
//!
//! Below is a minimal bot core: load persisted state, provision a guild on demand, create a
//! tournament, and save on shutdown.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use guild_tournament::prelude::*;
//!
//! async fn run(platform: Arc<dyn Platform>) -> anyhow::Result<()> {
//!     let config = Configuration::from_env().with_lock_delay(Duration::from_secs(60));
//!     let scheduler = SchedulerAdapter::new();
//!     let registry = GuildRegistry::new(platform, scheduler, config, "tournaments.json");
//!
//!     // Rehydrate everything persisted before the last shutdown. Transitions
//!     // that came due while the process was down fire immediately.
//!     registry.load().await?;
//!
//!     // First tournament-hosting request for this community space.
//!     let guild = registry.guild(GuildId(331_244));
//!     if !guild.is_provisioned().await {
//!         guild.setup(ParticipantId(7)).await?;
//!     }
//!
//!     let id = guild
//!         .create_tournament(TournamentSpec {
//!             name: "Weekly Cup".to_owned(),
//!             host: ParticipantId(7),
//!             start_at: chrono::Utc::now() + chrono::Duration::hours(2),
//!             max_players: 16,
//!             description: "Best of three, standard rules.".to_owned(),
//!         })
//!         .await?;
//!     guild.join(id, ParticipantId(42)).await?;
//!
//!     registry.save().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lifecycle
//!
//! Registration→Locked fires at the tournament's start time and freezes the roster;
//! Locked→Running fires after the configured lock delay (the bracket-preparation window).
//! Running→Concluded is always organizer-reported via
//! [`conclude`](crate::guild::TournamentGuild::conclude) or
//! [`force_advance`](crate::guild::TournamentGuild::force_advance) — never a timer. Phases only
//! move forward, and no scheduled job survives a restart on its own: the snapshot records any
//! still-pending fire time and rehydration re-registers it.
#![warn(missing_docs)]

pub use anyhow;

pub mod configuration;
pub mod error;
pub mod guild;
mod logger;
pub mod platform;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod tournament;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use guild_tournament::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{PlatformError, TournamentError};
    pub use crate::guild::TournamentGuild;
    pub use crate::platform::{
        ChannelId, ChannelKind, EventId, GuildId, MessageId, ObjectKind, ParticipantId,
        PermissionOverwrite, Platform, RoleId,
    };
    pub use crate::registry::GuildRegistry;
    pub use crate::scheduler::{JobKey, SchedulerAdapter};
    pub use crate::snapshot::{GuildSnapshot, TournamentSnapshot};
    pub use crate::tournament::{Phase, TournamentId, TournamentSpec};
}
