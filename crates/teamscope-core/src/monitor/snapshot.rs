//! Owned snapshot types returned by the aggregation engine.
//!
//! These serialize to the camelCase JSON shapes the dashboard consumes.

use serde::Serialize;

use crate::teams::{TaskStatus, TeamConfig, TeamTask};

/// Full reconciled view of one team at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMonitorData {
    /// Config with the reconciled member list
    pub config: TeamConfig,
    pub tasks: Vec<TeamTask>,
    /// True iff any reconciled member is active
    pub is_active: bool,
    /// Assembly time in epoch milliseconds
    pub last_updated: i64,
}

impl TeamMonitorData {
    /// Assemble a snapshot stamped with the current time
    pub fn new(config: TeamConfig, tasks: Vec<TeamTask>) -> Self {
        let is_active = config.members.iter().any(|m| m.is_active);
        Self {
            config,
            tasks,
            is_active,
            last_updated: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Team name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of tasks in the given status
    pub fn count_tasks(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// Lossy projection of a snapshot for list views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub name: String,
    pub description: String,
    pub member_count: usize,
    /// In-progress task count
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub is_active: bool,
    pub last_updated: i64,
}

impl TeamSummary {
    /// Project a snapshot down to counts
    pub fn from_snapshot(snapshot: &TeamMonitorData) -> Self {
        Self {
            name: snapshot.config.name.clone(),
            description: snapshot.config.description.clone(),
            member_count: snapshot.config.members.len(),
            active_tasks: snapshot.count_tasks(TaskStatus::InProgress),
            completed_tasks: snapshot.count_tasks(TaskStatus::Completed),
            total_tasks: snapshot.tasks.len(),
            is_active: snapshot.is_active,
            last_updated: snapshot.last_updated,
        }
    }
}
