//! One-shot job scheduling for phase transitions.
//!
//! The [`SchedulerAdapter`] wraps the runtime's timer facility: each scheduled
//! job is a detached task that sleeps until its absolute fire time and then
//! runs its callback. Jobs are keyed by `(tournament, phase)` so at most one
//! transition per tournament per phase can ever be pending.
//!
//! Jobs do not survive a process restart; durability is entirely the snapshot
//! codec's responsibility. On rehydration the owning guild re-registers every
//! still-pending job, and an elapsed fire time fires immediately.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::tournament::{Phase, TournamentId};

/// Uniquely identifies a pending scheduled transition.
///
/// `phase` is the phase the job will move the tournament *into*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// The tournament the job belongs to.
    pub tournament: TournamentId,
    /// The phase the transition targets.
    pub phase: Phase,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}/{}", self.tournament, self.phase)
    }
}

struct Job {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Schedules and cancels one-shot transition jobs.
///
/// Cheap to clone; clones share the same job table.
#[derive(Clone, Default)]
pub struct SchedulerAdapter {
    jobs: Arc<Mutex<HashMap<JobKey, Job>>>,
    next_seq: Arc<AtomicU64>,
}

impl SchedulerAdapter {
    /// Create an adapter with an empty job table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot callback firing at `fires_at`.
    ///
    /// A fire time already in the past fires immediately. Scheduling under a
    /// key that already has a pending job replaces (and cancels) the old job.
    pub fn schedule<F>(&self, key: JobKey, fires_at: DateTime<Utc>, callback: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let delay = (fires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let jobs = Arc::clone(&self.jobs);

        // Insert under the lock held across the spawn, so a zero-delay task
        // cannot wake before its own entry exists.
        let mut guard = self.jobs.lock().expect("poisoned");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Deregister before running the callback. Once the entry is gone,
            // `cancel` has nothing to abort and the callback runs to completion.
            let still_ours = {
                let mut guard = jobs.lock().expect("poisoned");
                match guard.get(&key) {
                    Some(job) if job.seq == seq => {
                        guard.remove(&key);
                        true
                    }
                    _ => false,
                }
            };
            if still_ours {
                trace!(%key, "job firing");
                callback.await;
            }
        });
        if let Some(old) = guard.insert(key, Job { seq, handle }) {
            debug!(%key, "replacing pending job");
            old.handle.abort();
        }
    }

    /// Remove a pending job. No-op if absent or already firing.
    pub fn cancel(&self, key: JobKey) {
        if let Some(job) = self.jobs.lock().expect("poisoned").remove(&key) {
            debug!(%key, "cancelled pending job");
            job.handle.abort();
        }
    }

    /// True while a job under this key is still waiting to fire.
    pub fn is_pending(&self, key: JobKey) -> bool {
        self.jobs.lock().expect("poisoned").contains_key(&key)
    }

    /// Number of jobs waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.jobs.lock().expect("poisoned").len()
    }

    /// Drop every pending job without firing it.
    pub fn shutdown(&self) {
        let mut guard = self.jobs.lock().expect("poisoned");
        for (key, job) in guard.drain() {
            trace!(%key, "dropping pending job on shutdown");
            job.handle.abort();
        }
    }
}
