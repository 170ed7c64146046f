//! Agent inbox reading from `<teams_dir>/{team-name}/inboxes/{agent}.json`
//!
//! Each inbox file holds a JSON array of messages in append order. The array
//! order is authoritative; timestamps are only used to rank agents.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One message delivered to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Sender agent name
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub text: String,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One agent's inbox with derived counters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInbox {
    /// `<agentName>@<teamName>`
    pub agent_id: String,
    /// File stem of the inbox file
    pub agent_name: String,
    pub messages: Vec<InboxMessage>,
    /// Number of messages with `read = false`
    pub unread_count: usize,
    /// Timestamp of the last message, or the read time for an empty inbox
    pub last_message_time: String,
}

impl AgentInbox {
    /// Build from parsed messages, deriving the counters
    pub fn new(team_name: &str, agent_name: &str, messages: Vec<InboxMessage>) -> Self {
        let unread_count = messages.iter().filter(|m| !m.read).count();
        let last_message_time = messages
            .last()
            .map(|m| m.timestamp.clone())
            .unwrap_or_else(now_iso);

        Self {
            agent_id: format!("{}@{}", agent_name, team_name),
            agent_name: agent_name.to_string(),
            messages,
            unread_count,
            last_message_time,
        }
    }

    fn last_message_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_message_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// All inboxes of one team
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInboxData {
    pub team_name: String,
    /// Most recently active agent first
    pub agents: Vec<AgentInbox>,
}

/// An agent observed through the presence of its inbox file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAgent {
    /// File stem of the inbox file
    pub name: String,
    /// Text of the first message, if the file parsed and has one
    pub first_message: Option<String>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// List `(agent_name, path)` for every `*.json` file in an inbox directory
///
/// Returns `None` when the directory does not exist or the path is not a
/// directory. Sorted by agent name.
async fn list_inbox_files(inboxes_dir: &Path) -> Result<Option<Vec<(String, PathBuf)>>> {
    let mut entries = match tokio::fs::read_dir(inboxes_dir).await {
        Ok(entries) => entries,
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            return Ok(None)
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read inbox directory: {:?}", inboxes_dir))
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Some(files))
}

/// Read and parse one inbox file
pub async fn read_inbox_messages(inbox_path: &Path) -> Result<Vec<InboxMessage>> {
    let content = tokio::fs::read_to_string(inbox_path)
        .await
        .with_context(|| format!("Failed to read inbox: {:?}", inbox_path))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse inbox: {:?}", inbox_path))
}

/// Read every inbox of a team
///
/// Returns `None` when the team has no inbox directory. Files that fail to
/// read or parse are skipped. Agents are ordered by last message time,
/// newest first; unparseable times sort last.
pub async fn read_team_inboxes(
    inboxes_dir: &Path,
    team_name: &str,
) -> Result<Option<Vec<AgentInbox>>> {
    let Some(files) = list_inbox_files(inboxes_dir).await? else {
        return Ok(None);
    };

    let mut agents = Vec::with_capacity(files.len());
    for (agent_name, path) in files {
        match read_inbox_messages(&path).await {
            Ok(messages) => agents.push(AgentInbox::new(team_name, &agent_name, messages)),
            Err(e) => tracing::warn!("Skipping inbox {:?}: {:#}", path, e),
        }
    }

    // Stable sort keeps name order among equal times
    agents.sort_by(|a, b| match (a.last_message_at(), b.last_message_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(Some(agents))
}

/// List the agents that have an inbox file, with their first message text
///
/// Membership is decided by file presence: an inbox that fails to parse
/// still yields an observed agent, just without a first message.
pub async fn read_inbox_roster(inboxes_dir: &Path) -> Result<Option<Vec<ObservedAgent>>> {
    let Some(files) = list_inbox_files(inboxes_dir).await? else {
        return Ok(None);
    };

    let mut observed = Vec::with_capacity(files.len());
    for (name, path) in files {
        let first_message = match read_inbox_messages(&path).await {
            Ok(messages) => messages.into_iter().next().map(|m| m.text),
            Err(e) => {
                tracing::warn!("Cannot read first message of {:?}: {:#}", path, e);
                None
            }
        };
        observed.push(ObservedAgent {
            name,
            first_message,
        });
    }

    Ok(Some(observed))
}
