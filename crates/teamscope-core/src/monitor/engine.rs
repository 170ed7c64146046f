//! TeamMonitor: read-only aggregation over the team registry.
//!
//! Every call reads the store fresh; nothing is cached between passes and
//! the struct holds no mutable state, so any number of channels and one-shot
//! queries can share one instance.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::teams::{
    self, is_valid_team_name, reconcile_members, StorePaths, TeamConfig, TeamInboxData, TeamTask,
};

use super::snapshot::{TeamMonitorData, TeamSummary};

/// Aggregation engine over a directory-backed team store
#[derive(Debug, Clone)]
pub struct TeamMonitor {
    paths: Arc<StorePaths>,
}

impl TeamMonitor {
    /// Create a monitor over the given store layout
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths: Arc::new(paths),
        }
    }

    // =========================================================
    // Store reads (single team, fail soft)
    // =========================================================

    /// Read a team's `config.json` as declared, without reconciliation
    ///
    /// `None` when the directory or file is missing or does not parse.
    pub async fn read_team_config(&self, team_name: &str) -> Option<TeamConfig> {
        let path = self.paths.config_path(team_name);
        match teams::read_team_config(&path, team_name).await {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Excluding team '{}': {:#}", team_name, e);
                None
            }
        }
    }

    /// Read a team's tasks; a missing task directory is an empty list
    pub async fn read_team_tasks(&self, team_name: &str) -> Result<Vec<TeamTask>> {
        teams::read_all_tasks(&self.paths.team_tasks_dir(team_name)).await
    }

    /// Read a team's inboxes; `None` when the team has no inbox directory
    pub async fn read_team_inboxes(&self, team_name: &str) -> Result<Option<TeamInboxData>> {
        let agents = teams::read_team_inboxes(&self.paths.inboxes_dir(team_name), team_name).await?;
        Ok(agents.map(|agents| TeamInboxData {
            team_name: team_name.to_string(),
            agents,
        }))
    }

    /// Read a team's config and reconcile its roster against its inboxes
    ///
    /// An inbox directory that cannot be listed counts as absent, so the
    /// declared members are kept.
    async fn load_team(&self, team_name: &str) -> Option<TeamConfig> {
        let mut config = self.read_team_config(team_name).await?;

        let observed = match teams::read_inbox_roster(&self.paths.inboxes_dir(team_name)).await {
            Ok(observed) => observed,
            Err(e) => {
                tracing::warn!(
                    "Inboxes of '{}' unreadable, using config.json members: {:#}",
                    team_name,
                    e
                );
                None
            }
        };
        if observed.is_none() {
            tracing::debug!(
                "No inboxes directory for '{}', using config.json members",
                team_name
            );
        }

        config.members = reconcile_members(team_name, &config.members, observed.as_deref());
        Some(config)
    }

    /// Names of all addressable team directories, sorted
    ///
    /// Directories whose name is not a valid team name are skipped, so every
    /// listed team can also be looked up by name. A missing teams root is an
    /// empty store; an unreadable one is an error.
    async fn team_dir_names(&self) -> Result<Vec<String>> {
        let teams_dir = &self.paths.teams_dir;
        let mut entries = match tokio::fs::read_dir(teams_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read teams directory: {:?}", teams_dir))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read teams directory: {:?}", teams_dir))?
        {
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => {}
                _ => continue,
            }
            match entry.file_name().into_string() {
                Ok(name) if is_valid_team_name(&name) => names.push(name),
                Ok(name) => tracing::debug!("Skipping team directory with invalid name {:?}", name),
                Err(raw) => tracing::debug!("Skipping non UTF-8 team directory {:?}", raw),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Whether `team_name` names a team directory
    async fn is_team_dir(&self, team_name: &str) -> bool {
        tokio::fs::metadata(self.paths.team_dir(team_name))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Assemble a snapshot, excluding the team if its tasks cannot be read
    async fn assemble(&self, config: TeamConfig) -> Option<TeamMonitorData> {
        match self.read_team_tasks(&config.name).await {
            Ok(tasks) => Some(TeamMonitorData::new(config, tasks)),
            Err(e) => {
                tracing::warn!("Excluding team '{}': {:#}", config.name, e);
                None
            }
        }
    }

    // =========================================================
    // Aggregation
    // =========================================================

    /// List every team with its reconciled roster, ordered by name
    ///
    /// Teams whose config is missing or malformed are left out.
    pub async fn list_teams(&self) -> Result<Vec<TeamConfig>> {
        let mut teams = Vec::new();
        for name in self.team_dir_names().await? {
            if let Some(config) = self.load_team(&name).await {
                teams.push(config);
            }
        }
        Ok(teams)
    }

    /// Snapshot of one team; `None` if it is not a known team
    pub async fn get_snapshot(&self, team_name: &str) -> Result<Option<TeamMonitorData>> {
        if !is_valid_team_name(team_name) || !self.is_team_dir(team_name).await {
            return Ok(None);
        }
        let Some(config) = self.load_team(team_name).await else {
            return Ok(None);
        };
        Ok(self.assemble(config).await)
    }

    /// Snapshots of every known team, in [`list_teams`](Self::list_teams) order
    pub async fn get_all_snapshots(&self) -> Result<Vec<TeamMonitorData>> {
        let mut snapshots = Vec::new();
        for config in self.list_teams().await? {
            if let Some(snapshot) = self.assemble(config).await {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    /// Count-only summaries of every known team
    pub async fn get_summaries(&self) -> Result<Vec<TeamSummary>> {
        Ok(self
            .get_all_snapshots()
            .await?
            .iter()
            .map(TeamSummary::from_snapshot)
            .collect())
    }

    /// Inboxes of one known team; `None` if unknown or without inbox directory
    pub async fn get_inbox_snapshot(&self, team_name: &str) -> Result<Option<TeamInboxData>> {
        if !is_valid_team_name(team_name) || !self.is_team_dir(team_name).await {
            return Ok(None);
        }
        if self.read_team_config(team_name).await.is_none() {
            return Ok(None);
        }
        self.read_team_inboxes(team_name).await
    }

    /// Inboxes of every known team that has an inbox directory
    pub async fn get_all_inbox_snapshots(&self) -> Result<Vec<TeamInboxData>> {
        let mut result = Vec::new();
        for config in self.list_teams().await? {
            match self.read_team_inboxes(&config.name).await {
                Ok(Some(inboxes)) => result.push(inboxes),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping inboxes of '{}': {:#}", config.name, e),
            }
        }
        Ok(result)
    }
}
