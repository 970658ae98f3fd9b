//! The tournament state machine.
//!
//! A [`Tournament`] is pure state: identity, timing, capacity, roster, and the
//! current [`Phase`]. All platform side effects (announcements, channel
//! creation) live in the owning guild so this type stays directly
//! unit-testable. Phase only ever advances forward:
//!
//! ```text
//! Registration -> Locked -> Running -> Concluded
//! ```
//!
//! The first two transitions are driven by scheduled jobs; Running→Concluded
//! is always organizer-reported, never timer-driven.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TournamentError;
use crate::platform::{ChannelId, EventId, ParticipantId};
use crate::snapshot::TournamentSnapshot;

/// Identifier of a tournament within its guild.
///
/// Assigned by the guild at creation (and re-assigned on rehydration — no
/// scheduled job survives a restart, so identifiers never need to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TournamentId(pub u64);

impl fmt::Display for TournamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a tournament.
///
/// Derives `Ord` in declaration order so "never moves backward" is a plain
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Roster is open; participants may join and leave.
    Registration,
    /// Roster is frozen while brackets are prepared; leaving is still allowed.
    Locked,
    /// The tournament is being played.
    Running,
    /// Finished. Schedules no further jobs.
    Concluded,
}

impl Phase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Registration => Some(Phase::Locked),
            Phase::Locked => Some(Phase::Running),
            Phase::Running => Some(Phase::Concluded),
            Phase::Concluded => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Registration => "registration",
            Phase::Locked => "locked",
            Phase::Running => "running",
            Phase::Concluded => "concluded",
        };
        write!(f, "{name}")
    }
}

/// A still-pending scheduled transition, tracked so rehydration can re-register
/// it from remaining state instead of trusting a stale absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingJob {
    /// The phase the job will move the tournament into.
    pub phase: Phase,
    /// Absolute fire time. Elapsed times fire immediately on rehydration.
    pub fires_at: DateTime<Utc>,
}

/// Parameters for creating a tournament.
#[derive(Debug, Clone)]
pub struct TournamentSpec {
    /// Display name, non-empty.
    pub name: String,
    /// The organizing account.
    pub host: ParticipantId,
    /// When registration locks.
    pub start_at: DateTime<Utc>,
    /// Roster capacity, positive.
    pub max_players: u32,
    /// Free-text description shown in announcements.
    pub description: String,
}

impl TournamentSpec {
    pub(crate) fn validate(&self, now: DateTime<Utc>) -> Result<(), TournamentError> {
        if self.name.trim().is_empty() {
            return Err(TournamentError::EmptyName);
        }
        if self.max_players == 0 {
            return Err(TournamentError::NonPositiveCapacity);
        }
        if self.start_at <= now {
            return Err(TournamentError::StartInPast(self.start_at));
        }
        Ok(())
    }
}

/// A single tournament: roster, timing, and current phase.
#[derive(Debug)]
pub struct Tournament {
    id: TournamentId,
    name: String,
    host: ParticipantId,
    start_at: DateTime<Utc>,
    max_players: u32,
    description: String,
    phase: Phase,
    participants: Vec<ParticipantId>,
    channel: Option<ChannelId>,
    event: Option<EventId>,
    pending_job: Option<PendingJob>,
}

impl Tournament {
    /// Create a tournament in phase `Registration` with its first transition
    /// pending at `start_at`. The spec must already be validated.
    pub(crate) fn new(id: TournamentId, spec: TournamentSpec, channel: Option<ChannelId>) -> Self {
        Self {
            id,
            name: spec.name,
            host: spec.host,
            start_at: spec.start_at,
            max_players: spec.max_players,
            description: spec.description,
            phase: Phase::Registration,
            participants: vec![],
            channel,
            event: None,
            pending_job: Some(PendingJob {
                phase: Phase::Locked,
                fires_at: spec.start_at,
            }),
        }
    }

    /// Identifier within the owning guild.
    pub fn id(&self) -> TournamentId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The organizing account.
    pub fn host(&self) -> ParticipantId {
        self.host
    }

    /// When registration locks.
    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Roster in join order.
    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    /// The tournament's dedicated coordination channel.
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// The optional scheduled-event announcement recorded for this tournament.
    pub fn event(&self) -> Option<EventId> {
        self.event
    }

    /// Record a scheduled-event announcement created by the command layer.
    pub fn set_event(&mut self, event: EventId) {
        self.event = Some(event);
    }

    /// The still-pending scheduled transition, if any.
    pub fn pending_job(&self) -> Option<PendingJob> {
        self.pending_job
    }

    /// True once the roster is at capacity.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_players as usize
    }

    /// Add a participant to the roster.
    ///
    /// Only valid during `Registration`.
    pub(crate) fn join(&mut self, participant: ParticipantId) -> Result<(), TournamentError> {
        if self.phase != Phase::Registration {
            return Err(TournamentError::PhaseClosed { phase: self.phase });
        }
        if self.participants.contains(&participant) {
            return Err(TournamentError::AlreadyJoined(participant));
        }
        if self.is_full() {
            return Err(TournamentError::CapacityExceeded {
                max: self.max_players,
            });
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Remove a participant from the roster. Not an error if absent.
    ///
    /// Valid during `Registration` and `Locked`.
    pub(crate) fn leave(&mut self, participant: ParticipantId) -> Result<(), TournamentError> {
        if self.phase > Phase::Locked {
            return Err(TournamentError::PhaseClosed { phase: self.phase });
        }
        self.participants.retain(|p| *p != participant);
        Ok(())
    }

    /// True when a transition into `target` is the legal next step.
    pub(crate) fn can_advance_to(&self, target: Phase) -> bool {
        self.phase.next() == Some(target)
    }

    /// Registration → Locked: freeze the roster and queue the start job.
    pub(crate) fn freeze(&mut self, run_at: DateTime<Utc>) {
        debug_assert_eq!(self.phase, Phase::Registration);
        self.phase = Phase::Locked;
        self.pending_job = Some(PendingJob {
            phase: Phase::Running,
            fires_at: run_at,
        });
    }

    /// Locked → Running. Nothing further is scheduled; conclusion is manual.
    pub(crate) fn begin(&mut self) {
        debug_assert_eq!(self.phase, Phase::Locked);
        self.phase = Phase::Running;
        self.pending_job = None;
    }

    /// Move to Concluded from any phase. Idempotent.
    pub(crate) fn conclude(&mut self) {
        self.phase = Phase::Concluded;
        self.pending_job = None;
    }

    /// Flatten into a serializable record of opaque identifiers.
    pub fn snapshot(&self) -> TournamentSnapshot {
        TournamentSnapshot {
            name: self.name.clone(),
            host: self.host,
            start_at: self.start_at,
            max_players: self.max_players,
            description: self.description.clone(),
            phase: self.phase,
            participants: self.participants.clone(),
            channel: self.channel,
            event: self.event,
            pending_job: self.pending_job,
        }
    }

    /// Rebuild from a stored record under a freshly assigned identifier.
    ///
    /// A concluded tournament never carries a pending job, whatever the record
    /// says.
    pub(crate) fn from_snapshot(id: TournamentId, snap: TournamentSnapshot) -> Self {
        let pending_job = if snap.phase == Phase::Concluded {
            None
        } else {
            snap.pending_job
        };
        Self {
            id,
            name: snap.name,
            host: snap.host,
            start_at: snap.start_at,
            max_players: snap.max_players,
            description: snap.description,
            phase: snap.phase,
            participants: snap.participants,
            channel: snap.channel,
            event: snap.event,
            pending_job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(max_players: u32) -> TournamentSpec {
        TournamentSpec {
            name: "test cup".to_owned(),
            host: ParticipantId(1),
            start_at: Utc::now() + chrono::Duration::hours(1),
            max_players,
            description: "unit test tournament".to_owned(),
        }
    }

    fn tournament(max_players: u32) -> Tournament {
        Tournament::new(TournamentId(1), spec(max_players), Some(ChannelId(42)))
    }

    #[test]
    fn validation_rejects_bad_specs() {
        let now = Utc::now();
        let mut bad = spec(8);
        bad.name = "   ".to_owned();
        assert!(matches!(bad.validate(now), Err(TournamentError::EmptyName)));

        assert!(matches!(
            spec(0).validate(now),
            Err(TournamentError::NonPositiveCapacity)
        ));

        let mut bad = spec(8);
        bad.start_at = now - chrono::Duration::seconds(1);
        assert!(matches!(
            bad.validate(now),
            Err(TournamentError::StartInPast(_))
        ));

        assert!(spec(8).validate(now).is_ok());
    }

    #[test]
    fn new_tournament_has_one_pending_job() {
        let t = tournament(8);
        assert_eq!(t.phase(), Phase::Registration);
        let job = t.pending_job().unwrap();
        assert_eq!(job.phase, Phase::Locked);
        assert_eq!(job.fires_at, t.start_at());
    }

    #[test]
    fn roster_never_exceeds_capacity() {
        let mut t = tournament(2);
        t.join(ParticipantId(10)).unwrap();
        t.join(ParticipantId(11)).unwrap();
        let err = t.join(ParticipantId(12)).unwrap_err();
        assert!(matches!(err, TournamentError::CapacityExceeded { max: 2 }));
        assert_eq!(t.participants().len(), 2);

        // leave(A) then join(C) fits again
        t.leave(ParticipantId(10)).unwrap();
        t.join(ParticipantId(12)).unwrap();
        assert_eq!(t.participants(), &[ParticipantId(11), ParticipantId(12)]);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut t = tournament(8);
        t.join(ParticipantId(10)).unwrap();
        assert!(matches!(
            t.join(ParticipantId(10)),
            Err(TournamentError::AlreadyJoined(_))
        ));
        assert_eq!(t.participants().len(), 1);
    }

    #[test]
    fn leave_then_join_restores_membership() {
        let mut t = tournament(8);
        t.join(ParticipantId(10)).unwrap();
        t.leave(ParticipantId(10)).unwrap();
        assert!(t.participants().is_empty());
        t.join(ParticipantId(10)).unwrap();
        assert_eq!(t.participants(), &[ParticipantId(10)]);
    }

    #[test]
    fn leave_is_a_noop_for_non_members() {
        let mut t = tournament(8);
        assert!(t.leave(ParticipantId(99)).is_ok());
    }

    #[test]
    fn leave_allowed_while_locked_but_not_after() {
        let mut t = tournament(8);
        t.join(ParticipantId(10)).unwrap();
        t.freeze(Utc::now() + chrono::Duration::minutes(2));

        assert!(matches!(
            t.join(ParticipantId(11)),
            Err(TournamentError::PhaseClosed { .. })
        ));
        t.leave(ParticipantId(10)).unwrap();

        t.begin();
        assert!(matches!(
            t.leave(ParticipantId(10)),
            Err(TournamentError::PhaseClosed { .. })
        ));
    }

    #[test]
    fn phase_only_advances_forward() {
        let mut t = tournament(8);
        let mut seen = t.phase();
        // Walk the whole lifecycle; at every step the phase must not decrease.
        t.freeze(Utc::now());
        assert!(t.phase() >= seen);
        seen = t.phase();
        t.begin();
        assert!(t.phase() >= seen);
        seen = t.phase();
        t.conclude();
        assert!(t.phase() >= seen);
        // conclude is idempotent and never schedules anything
        t.conclude();
        assert_eq!(t.phase(), Phase::Concluded);
        assert!(t.pending_job().is_none());
    }

    #[test]
    fn concluded_snapshot_never_restores_a_pending_job() {
        let mut t = tournament(8);
        let mut snap = t.snapshot();
        snap.phase = Phase::Concluded;
        // Corrupt record: a concluded tournament with a leftover job.
        assert!(snap.pending_job.is_some());
        let restored = Tournament::from_snapshot(TournamentId(7), snap);
        assert!(restored.pending_job().is_none());

        t.conclude();
        assert!(t.snapshot().pending_job.is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_every_field() {
        let mut t = tournament(4);
        t.join(ParticipantId(10)).unwrap();
        t.join(ParticipantId(11)).unwrap();
        t.set_event(EventId(77));

        let snap = t.snapshot();
        let restored = Tournament::from_snapshot(t.id(), snap.clone());
        assert_eq!(restored.snapshot(), snap);
    }
}
