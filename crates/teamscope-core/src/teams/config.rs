//! Team configuration reading from `<teams_dir>/{team-name}/config.json`

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Team configuration from config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Team name (overwritten with the directory name on read)
    #[serde(default)]
    pub name: String,
    /// Team description
    #[serde(default)]
    pub description: String,
    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub created_at: i64,
    /// Agent ID of the team lead
    #[serde(default)]
    pub lead_agent_id: String,
    /// Session ID of the team lead
    #[serde(default)]
    pub lead_session_id: String,
    /// Declared team members; malformed entries are dropped on read
    #[serde(default, deserialize_with = "deserialize_members")]
    pub members: Vec<TeamMember>,
}

/// A declared or observed member of a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    /// `<agentName>@<teamName>`
    pub agent_id: String,
    /// Human-readable name (used for messaging and task assignment)
    #[serde(default)]
    pub name: String,
    /// Role/type of the agent
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub plan_mode_required: bool,
    /// Join time in epoch milliseconds
    #[serde(default)]
    pub joined_at: i64,
    #[serde(default)]
    pub tmux_pane_id: String,
    /// Working directory of the member
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub backend_type: String,
    #[serde(default)]
    pub is_active: bool,
    /// Short description, filled in for members synthesized from inboxes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TeamMember {
    /// Agent name segment of `agent_id` (text before the first `@`)
    ///
    /// This is the join key against inbox file names.
    pub fn agent_name(&self) -> &str {
        self.agent_id.split('@').next().unwrap_or_default()
    }
}

/// Parse the member array entry by entry so one bad member does not sink the team
fn deserialize_members<'de, D>(deserializer: D) -> std::result::Result<Vec<TeamMember>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(member) => Some(member),
            Err(e) => {
                tracing::warn!(index, "Skipping malformed team member: {}", e);
                None
            }
        })
        .collect())
}

/// Read a team config from a config.json file
///
/// # Arguments
/// * `config_path` - Path to the config.json file
/// * `team_name` - Name of the team (directory name)
pub async fn read_team_config(config_path: &Path, team_name: &str) -> Result<TeamConfig> {
    let content = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("Failed to read team config: {:?}", config_path))?;

    let mut config: TeamConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse team config: {:?}", config_path))?;

    if !config.name.is_empty() && config.name != team_name {
        tracing::debug!(
            "Team config name '{}' differs from directory '{}', using directory name",
            config.name,
            team_name
        );
    }
    config.name = team_name.to_string();
    Ok(config)
}
