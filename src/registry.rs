//! The process-wide guild registry.
//!
//! Constructed once at startup and passed by reference to whatever needs it —
//! there is no ad-hoc discovery of guilds, no module-level mutable list. The
//! registry hands out per-guild [`TournamentGuild`] handles and drives batch
//! persistence against a single JSON state file.
//!
//! Recovery is partial-failure-tolerant: one stale or corrupt guild record is
//! logged and skipped, the others still load.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{info, warn};

use crate::configuration::Configuration;
use crate::guild::TournamentGuild;
use crate::platform::{GuildId, Platform};
use crate::scheduler::SchedulerAdapter;
use crate::snapshot::GuildSnapshot;

/// Holds every live [`TournamentGuild`] and its persisted state.
pub struct GuildRegistry {
    platform: Arc<dyn Platform>,
    scheduler: SchedulerAdapter,
    config: Configuration,
    state_path: PathBuf,
    guilds: Mutex<HashMap<GuildId, TournamentGuild>>,
}

impl GuildRegistry {
    /// Create a registry persisting to `state_path`.
    pub fn new(
        platform: Arc<dyn Platform>,
        scheduler: SchedulerAdapter,
        config: Configuration,
        state_path: impl Into<PathBuf>,
    ) -> Self {
        if config.log {
            crate::logger::init_logger();
        }
        Self {
            platform,
            scheduler,
            config,
            state_path: state_path.into(),
            guilds: Mutex::new(HashMap::new()),
        }
    }

    /// The shared scheduler adapter.
    pub fn scheduler(&self) -> &SchedulerAdapter {
        &self.scheduler
    }

    /// Get the guild handle for a community space, creating an unprovisioned
    /// one on first request.
    pub fn guild(&self, id: GuildId) -> TournamentGuild {
        let mut guard = self.guilds.lock().expect("poisoned");
        guard
            .entry(id)
            .or_insert_with(|| {
                TournamentGuild::new(
                    id,
                    Arc::clone(&self.platform),
                    self.scheduler.clone(),
                    self.config.clone(),
                )
            })
            .clone()
    }

    /// Get an already-known guild handle.
    pub fn get(&self, id: GuildId) -> Option<TournamentGuild> {
        self.guilds.lock().expect("poisoned").get(&id).cloned()
    }

    /// Remove a guild from the registry (administrative teardown).
    ///
    /// The platform objects are left alone; only the orchestration state and
    /// its persistence are dropped.
    pub fn remove(&self, id: GuildId) -> Option<TournamentGuild> {
        self.guilds.lock().expect("poisoned").remove(&id)
    }

    /// Identifiers of all registered guilds.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.guilds.lock().expect("poisoned").keys().copied().collect()
    }

    /// Load every guild record from the state file and rehydrate it.
    ///
    /// Returns how many guilds were loaded. A record whose platform objects no
    /// longer resolve is skipped with a warning; it does not block the rest of
    /// the batch. A missing state file is an empty batch, not an error.
    pub async fn load(&self) -> anyhow::Result<usize> {
        let path = &self.state_path;
        if !path.is_file() {
            info!("no state file at {}, starting empty", path.display());
            return Ok(0);
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read state file {}", path.display()))?;
        let records: Vec<serde_json::Value> = serde_json::from_str(&data)
            .with_context(|| format!("parse state file {}", path.display()))?;

        let mut loaded = 0;
        for record in records {
            // Decode record by record: one corrupt entry must not block the
            // rest of the batch.
            let record: GuildSnapshot = match serde_json::from_value(record) {
                Ok(record) => record,
                Err(err) => {
                    warn!("skipping corrupt guild record: {err}");
                    continue;
                }
            };
            let guild_id = record.guild;
            match TournamentGuild::from_snapshot(
                Arc::clone(&self.platform),
                self.scheduler.clone(),
                self.config.clone(),
                record,
            )
            .await
            {
                Ok(guild) => {
                    self.guilds.lock().expect("poisoned").insert(guild_id, guild);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(guild = %guild_id, "skipping stored guild: {err}");
                }
            }
        }
        info!(loaded, "guild state loaded");
        Ok(loaded)
    }

    /// Snapshot every provisioned guild and write the state file.
    ///
    /// Concluded tournaments are pruned first. Returns how many guilds were
    /// written. Unprovisioned guilds have nothing worth persisting and are
    /// skipped.
    pub async fn save(&self) -> anyhow::Result<usize> {
        let handles: Vec<TournamentGuild> = {
            let guard = self.guilds.lock().expect("poisoned");
            guard.values().cloned().collect()
        };

        let mut records = Vec::with_capacity(handles.len());
        for guild in handles {
            guild.prune_concluded().await;
            if let Ok(snapshot) = guild.snapshot().await {
                records.push(snapshot);
            }
        }
        // Stable output ordering, so state files diff cleanly.
        records.sort_by_key(|r| r.guild);

        let written = records.len();
        let payload = serde_json::to_string_pretty(&records).context("encode guild state")?;
        std::fs::write(&self.state_path, payload)
            .with_context(|| format!("write state file {}", self.state_path.display()))?;
        info!(written, "guild state saved");
        Ok(written)
    }
}
