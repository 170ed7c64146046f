//! Team task file reading from `<tasks_dir>/{team-name}/`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// Status of a team task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting to be started
    Pending,
    /// Task is currently being worked on
    InProgress,
    /// Task has been completed
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A task in a team's task list
///
/// `blocks` / `blocked_by` are carried through as-is; nothing here walks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTask {
    /// Task identifier (numeric string, unique within a team)
    #[serde(default)]
    pub id: String,
    /// Brief title of the task
    #[serde(default)]
    pub subject: String,
    /// Detailed description
    #[serde(default)]
    pub description: String,
    /// Present continuous form shown in spinner (e.g., "Fixing bug")
    #[serde(default)]
    pub active_form: String,
    /// Current status
    #[serde(default = "default_task_status")]
    pub status: TaskStatus,
    /// Task IDs that this task blocks
    #[serde(default)]
    pub blocks: Vec<String>,
    /// Task IDs that block this task
    #[serde(default)]
    pub blocked_by: Vec<String>,
    /// Owner (member name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Default task status
fn default_task_status() -> TaskStatus {
    TaskStatus::Pending
}

/// Read a single task file
///
/// # Arguments
/// * `task_path` - Path to the task JSON file (e.g., `1.json`)
pub async fn read_task(task_path: &Path) -> Result<TeamTask> {
    let content = tokio::fs::read_to_string(task_path)
        .await
        .with_context(|| format!("Failed to read task file: {:?}", task_path))?;

    let task: TeamTask = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse task file: {:?}", task_path))?;

    Ok(task)
}

/// Order task IDs numerically, with non-numeric IDs after numeric ones
fn compare_task_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Read all task files from a team's task directory
///
/// Every `.json` file is a task. Files that fail to read or parse are
/// skipped with a warning. A missing directory yields an empty list.
///
/// # Arguments
/// * `tasks_dir` - Path to the team's tasks directory
pub async fn read_all_tasks(tasks_dir: &Path) -> Result<Vec<TeamTask>> {
    let mut entries = match tokio::fs::read_dir(tasks_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read tasks directory: {:?}", tasks_dir))
        }
    };

    let mut tasks = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }

        match read_task(&path).await {
            Ok(mut task) => {
                // Set task ID from filename if empty
                if task.id.is_empty() {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        task.id = stem.to_string();
                    }
                }
                tasks.push(task);
            }
            Err(e) => {
                tracing::warn!("Skipping task file {:?}: {:#}", path, e);
            }
        }
    }

    tasks.sort_by(|a, b| compare_task_ids(&a.id, &b.id));

    Ok(tasks)
}
