//! Per-guild tournament orchestration.
//!
//! [`TournamentGuild`] owns the structural objects provisioned for one
//! community space (host role, category, announcement channel) and the ordered
//! set of its tournaments. Every mutation — joins, leaves, administrative
//! actions, and scheduler-fired transitions — is serialized through one
//! per-guild async mutex, so unrelated guilds never contend.
//!
//! Phase transitions follow a capture/commit pattern: the intended transition
//! is validated under the lock, the lock is released for the platform I/O
//! (announcements), and the phase is re-checked before committing. A retried
//! or concurrently forced transition therefore never double-advances a phase.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::configuration::Configuration;
use crate::error::{PlatformError, TournamentError};
use crate::platform::{
    with_retries, ChannelId, ChannelKind, EventId, GuildId, ObjectKind, ParticipantId,
    PermissionOverwrite, Platform, RoleId,
};
use crate::scheduler::{JobKey, SchedulerAdapter};
use crate::snapshot::{GuildSnapshot, TournamentSnapshot};
use crate::tournament::{Phase, Tournament, TournamentId, TournamentSpec};

const HOST_ROLE_NAME: &str = "Tournament host";
const HOST_ROLE_COLOR: u32 = 0x18b9d9;
const CATEGORY_NAME: &str = "tournaments";
const ANNOUNCEMENT_CHANNEL_NAME: &str = "tournament-announcements";

/// The structural objects provisioned once per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provision {
    /// The "Tournament host" role.
    pub host_role: RoleId,
    /// The category all tournament channels nest under.
    pub category: ChannelId,
    /// The announcement channel with the pinned welcome message.
    pub announcement: ChannelId,
}

#[derive(Default)]
struct GuildState {
    provision: Option<Provision>,
    tournaments: Vec<Tournament>,
    next_id: u64,
}

impl GuildState {
    fn tournament(&self, id: TournamentId) -> Result<&Tournament, TournamentError> {
        self.tournaments
            .iter()
            .find(|t| t.id() == id)
            .ok_or(TournamentError::UnknownTournament(id))
    }

    fn tournament_mut(&mut self, id: TournamentId) -> Result<&mut Tournament, TournamentError> {
        self.tournaments
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or(TournamentError::UnknownTournament(id))
    }
}

struct GuildInner {
    guild_id: GuildId,
    platform: Arc<dyn Platform>,
    scheduler: SchedulerAdapter,
    config: Configuration,
    state: tokio::sync::Mutex<GuildState>,
}

/// Tournament orchestration for one community space.
///
/// Cheap to clone; clones share the same state and lock.
#[derive(Clone)]
pub struct TournamentGuild {
    inner: Arc<GuildInner>,
}

impl TournamentGuild {
    /// Create an unprovisioned guild. Call [`setup`](Self::setup) before
    /// creating tournaments.
    pub fn new(
        guild_id: GuildId,
        platform: Arc<dyn Platform>,
        scheduler: SchedulerAdapter,
        config: Configuration,
    ) -> Self {
        Self {
            inner: Arc::new(GuildInner {
                guild_id,
                platform,
                scheduler,
                config,
                state: tokio::sync::Mutex::new(GuildState::default()),
            }),
        }
    }

    /// The community space this guild orchestrates.
    pub fn id(&self) -> GuildId {
        self.inner.guild_id
    }

    /// True once `setup` has completed.
    pub async fn is_provisioned(&self) -> bool {
        self.inner.state.lock().await.provision.is_some()
    }

    /// The provisioned structural objects, once set up.
    pub async fn provision(&self) -> Option<Provision> {
        self.inner.state.lock().await.provision
    }

    /// Provision the guild's tournament structures exactly once.
    ///
    /// Creates the host role, the category, and the announcement channel
    /// (host-only posting), grants the host role to `initiator`, and sends and
    /// pins the welcome message. The guild is only marked provisioned after
    /// every step succeeded; a partial failure is surfaced and a later retry
    /// starts over.
    ///
    /// The per-guild lock is held across the platform calls here: setup is a
    /// rare one-time action and holding the lock guarantees it cannot run
    /// twice concurrently.
    pub async fn setup(&self, initiator: ParticipantId) -> Result<Provision, TournamentError> {
        let mut state = self.inner.state.lock().await;
        if state.provision.is_some() {
            return Err(TournamentError::AlreadyProvisioned(self.inner.guild_id));
        }

        let platform = &self.inner.platform;
        let config = &self.inner.config;
        let guild = self.inner.guild_id;

        let everyone = with_retries(config, "resolve everyone role", || {
            platform.everyone_role(guild)
        })
        .await?;
        let host_role = with_retries(config, "create host role", || {
            platform.create_role(guild, HOST_ROLE_NAME, HOST_ROLE_COLOR)
        })
        .await?;
        let category = with_retries(config, "create tournament category", || {
            platform.create_category(guild, CATEGORY_NAME)
        })
        .await?;

        let kind = if with_retries(config, "query announcement support", || {
            platform.supports_announcements(guild)
        })
        .await?
        {
            ChannelKind::Announcement
        } else {
            ChannelKind::Text
        };
        // Only hosts may post announcements.
        let overwrites = [
            PermissionOverwrite {
                role: everyone,
                send_messages: false,
            },
            PermissionOverwrite {
                role: host_role,
                send_messages: true,
            },
        ];
        let announcement = with_retries(config, "create announcement channel", || {
            platform.create_channel(
                guild,
                ANNOUNCEMENT_CHANNEL_NAME,
                kind,
                Some(category),
                &overwrites,
            )
        })
        .await?;

        with_retries(config, "grant host role", || {
            platform.grant_role(guild, initiator, host_role)
        })
        .await?;
        let welcome = with_retries(config, "send welcome message", || {
            platform.send_message(announcement, &config.welcome_message)
        })
        .await?;
        with_retries(config, "pin welcome message", || {
            platform.pin_message(announcement, welcome)
        })
        .await?;

        let provision = Provision {
            host_role,
            category,
            announcement,
        };
        state.provision = Some(provision);
        info!(%guild, %host_role, %category, %announcement, "guild provisioned for tournaments");
        Ok(provision)
    }

    /// Create a tournament in phase `Registration`.
    ///
    /// Validates the spec, provisions the tournament's dedicated text channel
    /// under the guild category, and schedules the Registration→Locked
    /// transition at the start time.
    pub async fn create_tournament(
        &self,
        spec: TournamentSpec,
    ) -> Result<TournamentId, TournamentError> {
        spec.validate(Utc::now())?;

        let (category, id) = {
            let mut state = self.inner.state.lock().await;
            let category = state
                .provision
                .ok_or(TournamentError::NotProvisioned(self.inner.guild_id))?
                .category;
            let id = TournamentId(state.next_id);
            state.next_id += 1;
            (category, id)
        };

        let channel_name = channel_slug(&spec.name);
        let platform = &self.inner.platform;
        let guild = self.inner.guild_id;
        let channel = with_retries(&self.inner.config, "create tournament channel", || {
            platform.create_channel(guild, &channel_name, ChannelKind::Text, Some(category), &[])
        })
        .await?;

        let start_at = spec.start_at;
        let name = spec.name.clone();
        let mut state = self.inner.state.lock().await;
        state
            .tournaments
            .push(Tournament::new(id, spec, Some(channel)));
        self.schedule_transition(id, Phase::Locked, start_at);
        info!(%guild, tournament = %id, %name, %start_at, "tournament created");
        Ok(id)
    }

    /// Add a participant to a tournament's roster.
    pub async fn join(
        &self,
        id: TournamentId,
        participant: ParticipantId,
    ) -> Result<(), TournamentError> {
        let mut state = self.inner.state.lock().await;
        state.tournament_mut(id)?.join(participant)
    }

    /// Remove a participant from a tournament's roster.
    pub async fn leave(
        &self,
        id: TournamentId,
        participant: ParticipantId,
    ) -> Result<(), TournamentError> {
        let mut state = self.inner.state.lock().await;
        state.tournament_mut(id)?.leave(participant)
    }

    /// Record a scheduled-event announcement created by the command layer.
    ///
    /// The core never creates platform events itself; it only carries the
    /// identifier through snapshots.
    pub async fn set_event(
        &self,
        id: TournamentId,
        event: EventId,
    ) -> Result<(), TournamentError> {
        let mut state = self.inner.state.lock().await;
        state.tournament_mut(id)?.set_event(event);
        Ok(())
    }

    /// Administratively advance a tournament to its next phase.
    ///
    /// Cancels the scheduled job for that step, then runs the same
    /// capture/commit transition a fired job would. If the transition fails
    /// the job is re-registered from the tournament's recorded fire time, so
    /// the wall-clock transition still happens on its own.
    pub async fn force_advance(&self, id: TournamentId) -> Result<Phase, TournamentError> {
        let target = {
            let state = self.inner.state.lock().await;
            state
                .tournament(id)?
                .phase()
                .next()
                .ok_or(TournamentError::PhaseClosed {
                    phase: Phase::Concluded,
                })?
        };
        self.inner.scheduler.cancel(JobKey {
            tournament: id,
            phase: target,
        });
        match self.advance(id, target).await {
            Ok(phase) => Ok(phase),
            Err(err) => {
                let state = self.inner.state.lock().await;
                if let Ok(t) = state.tournament(id) {
                    if let Some(job) = t.pending_job() {
                        if job.phase == target {
                            self.schedule_transition(id, job.phase, job.fires_at);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Conclude a tournament. Idempotent, valid from any phase.
    ///
    /// Cancels any still-pending jobs. The closing announcement is
    /// best-effort: a platform failure is logged, never blocks conclusion.
    pub async fn conclude(&self, id: TournamentId) -> Result<(), TournamentError> {
        let announce = {
            let state = self.inner.state.lock().await;
            let t = state.tournament(id)?;
            if t.phase() == Phase::Concluded {
                return Ok(());
            }
            state
                .provision
                .map(|p| (p.announcement, transition_text(t, Phase::Concluded)))
        };

        if let Some((channel, text)) = announce {
            let platform = &self.inner.platform;
            if let Err(err) = with_retries(&self.inner.config, "conclusion announcement", || {
                platform.send_message(channel, &text)
            })
            .await
            {
                warn!(tournament = %id, "conclusion announcement failed: {err}");
            }
        }

        let mut state = self.inner.state.lock().await;
        state.tournament_mut(id)?.conclude();
        for phase in [Phase::Locked, Phase::Running] {
            self.inner.scheduler.cancel(JobKey {
                tournament: id,
                phase,
            });
        }
        info!(guild = %self.inner.guild_id, tournament = %id, "tournament concluded");
        Ok(())
    }

    /// Remove concluded tournaments from the sequence. Returns how many were
    /// dropped.
    ///
    /// Retention policy: concluded tournaments stay visible until this is
    /// called (the registry prunes before each save).
    pub async fn prune_concluded(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let before = state.tournaments.len();
        state.tournaments.retain(|t| t.phase() != Phase::Concluded);
        before - state.tournaments.len()
    }

    /// Identifiers of all tournaments in creation order.
    pub async fn tournament_ids(&self) -> Vec<TournamentId> {
        let state = self.inner.state.lock().await;
        state.tournaments.iter().map(Tournament::id).collect()
    }

    /// A point-in-time record of one tournament.
    pub async fn tournament_snapshot(
        &self,
        id: TournamentId,
    ) -> Result<TournamentSnapshot, TournamentError> {
        let state = self.inner.state.lock().await;
        Ok(state.tournament(id)?.snapshot())
    }

    /// Flatten the guild into its serializable snapshot. No platform calls.
    ///
    /// Only provisioned guilds are persistable: the provisioning identifiers
    /// are stored all-or-nothing, never partially.
    pub async fn snapshot(&self) -> Result<GuildSnapshot, TournamentError> {
        let state = self.inner.state.lock().await;
        let provision = state
            .provision
            .ok_or(TournamentError::NotProvisioned(self.inner.guild_id))?;
        Ok(GuildSnapshot {
            guild: self.inner.guild_id,
            host_role: provision.host_role,
            category: provision.category,
            announcement: provision.announcement,
            tournaments: state.tournaments.iter().map(Tournament::snapshot).collect(),
        })
    }

    /// Rebuild a guild from its stored snapshot after a restart.
    ///
    /// Every stored identifier is re-resolved against the platform. A
    /// guild-level identifier that no longer resolves fails the whole guild
    /// with [`TournamentError::UnresolvedReference`]; a stale tournament or
    /// roster entry is dropped with a warning so the rest of the guild still
    /// loads. Still-pending jobs are re-registered; fire times that elapsed
    /// during downtime fire immediately.
    pub async fn from_snapshot(
        platform: Arc<dyn Platform>,
        scheduler: SchedulerAdapter,
        config: Configuration,
        snap: GuildSnapshot,
    ) -> Result<TournamentGuild, TournamentError> {
        check_resolves(&platform, &config, ObjectKind::Guild, snap.guild.0).await?;
        check_resolves(&platform, &config, ObjectKind::Role, snap.host_role.0).await?;
        check_resolves(&platform, &config, ObjectKind::Channel, snap.category.0).await?;
        check_resolves(&platform, &config, ObjectKind::Channel, snap.announcement.0).await?;

        let mut tournaments = Vec::with_capacity(snap.tournaments.len());
        let mut next_id = 0;
        for mut record in snap.tournaments {
            if let Some(channel) = record.channel {
                if check_resolves(&platform, &config, ObjectKind::Channel, channel.0)
                    .await
                    .is_err()
                {
                    warn!(
                        guild = %snap.guild,
                        tournament = %record.name,
                        %channel,
                        "tournament channel no longer resolves, dropping tournament"
                    );
                    continue;
                }
            }
            if check_resolves(&platform, &config, ObjectKind::Participant, record.host.0)
                .await
                .is_err()
            {
                warn!(
                    guild = %snap.guild,
                    tournament = %record.name,
                    host = %record.host,
                    "tournament host no longer resolves, dropping tournament"
                );
                continue;
            }
            let mut roster = Vec::with_capacity(record.participants.len());
            for participant in record.participants {
                match check_resolves(&platform, &config, ObjectKind::Participant, participant.0)
                    .await
                {
                    Ok(()) => roster.push(participant),
                    Err(_) => warn!(
                        guild = %snap.guild,
                        tournament = %record.name,
                        %participant,
                        "roster entry no longer resolves, dropping it"
                    ),
                }
            }
            record.participants = roster;

            let id = TournamentId(next_id);
            next_id += 1;
            tournaments.push(Tournament::from_snapshot(id, record));
        }

        let guild = TournamentGuild::new(snap.guild, platform, scheduler, config);
        {
            let mut state = guild.inner.state.lock().await;
            state.provision = Some(Provision {
                host_role: snap.host_role,
                category: snap.category,
                announcement: snap.announcement,
            });
            state.next_id = next_id;
            state.tournaments = tournaments;
            for t in &state.tournaments {
                if let Some(job) = t.pending_job() {
                    guild.schedule_transition(t.id(), job.phase, job.fires_at);
                }
            }
            info!(
                guild = %snap.guild,
                tournaments = state.tournaments.len(),
                "guild rehydrated"
            );
        }
        Ok(guild)
    }

    fn schedule_transition(&self, id: TournamentId, target: Phase, fires_at: DateTime<Utc>) {
        let key = JobKey {
            tournament: id,
            phase: target,
        };
        let guild = self.clone();
        self.inner.scheduler.schedule(key, fires_at, async move {
            guild.fire_transition(id, target).await;
        });
    }

    async fn fire_transition(&self, id: TournamentId, target: Phase) {
        match self.advance(id, target).await {
            Ok(phase) => {
                info!(guild = %self.inner.guild_id, tournament = %id, %phase, "scheduled transition applied")
            }
            Err(err) => {
                // Phase unchanged; the pending job stays in the snapshot so a
                // restart retries the transition.
                error!(guild = %self.inner.guild_id, tournament = %id, %target, "transition failed, phase unchanged: {err}")
            }
        }
    }

    /// Apply a single forward transition with the capture/commit pattern.
    ///
    /// Returns the tournament's phase afterwards. A transition whose target
    /// was already reached (a stale fire racing a force-advance) is a no-op.
    async fn advance(&self, id: TournamentId, target: Phase) -> Result<Phase, TournamentError> {
        // Capture the intended transition under the lock.
        let (announcement, text) = {
            let state = self.inner.state.lock().await;
            let provision = state
                .provision
                .ok_or(TournamentError::NotProvisioned(self.inner.guild_id))?;
            let t = state.tournament(id)?;
            if t.phase() >= target {
                return Ok(t.phase());
            }
            if !t.can_advance_to(target) {
                return Err(TournamentError::PhaseClosed { phase: t.phase() });
            }
            (provision.announcement, transition_text(t, target))
        };

        // Platform I/O with the lock released, so a slow call never stalls
        // unrelated joins.
        let platform = &self.inner.platform;
        with_retries(&self.inner.config, "transition announcement", || {
            platform.send_message(announcement, &text)
        })
        .await?;

        // Commit, re-checking that nobody advanced the phase in between.
        let mut state = self.inner.state.lock().await;
        let t = state.tournament_mut(id)?;
        if t.phase() >= target {
            return Ok(t.phase());
        }
        match target {
            Phase::Locked => {
                let run_at = Utc::now()
                    + chrono::Duration::from_std(self.inner.config.lock_delay)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                t.freeze(run_at);
                self.schedule_transition(id, Phase::Running, run_at);
            }
            Phase::Running => t.begin(),
            Phase::Concluded => {
                t.conclude();
                for phase in [Phase::Locked, Phase::Running] {
                    self.inner.scheduler.cancel(JobKey {
                        tournament: id,
                        phase,
                    });
                }
            }
            Phase::Registration => unreachable!("no transition targets Registration"),
        }
        Ok(target)
    }
}

async fn check_resolves(
    platform: &Arc<dyn Platform>,
    config: &Configuration,
    kind: ObjectKind,
    id: u64,
) -> Result<(), TournamentError> {
    match with_retries(config, "resolve stored id", || platform.resolve(kind, id)).await {
        Ok(()) => Ok(()),
        Err(PlatformError::NotFound { .. }) => Err(TournamentError::UnresolvedReference { kind, id }),
        Err(err) => Err(TournamentError::Platform(err)),
    }
}

fn transition_text(t: &Tournament, target: Phase) -> String {
    match target {
        Phase::Locked => format!(
            "**{}** registration is closed with {} players. The bracket is being prepared.",
            t.name(),
            t.participants().len()
        ),
        Phase::Running => format!(
            "**{}** has started. Good luck to all {} players!",
            t.name(),
            t.participants().len()
        ),
        Phase::Concluded => format!("**{}** has concluded.", t.name()),
        Phase::Registration => unreachable!("no transition targets Registration"),
    }
}

fn channel_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if slug.is_empty() {
        "tournament".to_owned()
    } else {
        slug
    }
}
