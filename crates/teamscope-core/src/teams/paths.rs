//! Filesystem layout of the team registry.

use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole `.claude` directory
pub const CLAUDE_CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Locations of the teams root and the tasks root
///
/// ```text
/// <teams_dir>/<team>/config.json
/// <teams_dir>/<team>/inboxes/<agent>.json
/// <tasks_dir>/<team>/<id>.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub teams_dir: PathBuf,
    pub tasks_dir: PathBuf,
}

impl StorePaths {
    /// Build from explicit roots
    pub fn new(teams_dir: impl Into<PathBuf>, tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            teams_dir: teams_dir.into(),
            tasks_dir: tasks_dir.into(),
        }
    }

    /// Build from a `.claude`-style directory containing `teams/` and `tasks/`
    pub fn from_claude_dir(claude_dir: &Path) -> Self {
        Self::new(claude_dir.join("teams"), claude_dir.join("tasks"))
    }

    /// Resolve the store location
    ///
    /// An explicit directory wins, then `$CLAUDE_CONFIG_DIR`, then `~/.claude`.
    pub fn resolve(claude_dir: Option<&Path>) -> Self {
        if let Some(dir) = claude_dir {
            return Self::from_claude_dir(dir);
        }

        if let Some(dir) = std::env::var_os(CLAUDE_CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return Self::from_claude_dir(Path::new(&dir));
        }

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::from_claude_dir(&home.join(".claude"))
    }

    /// Directory of one team
    pub fn team_dir(&self, team_name: &str) -> PathBuf {
        self.teams_dir.join(team_name)
    }

    /// `config.json` of one team
    pub fn config_path(&self, team_name: &str) -> PathBuf {
        self.team_dir(team_name).join("config.json")
    }

    /// Inbox directory of one team
    pub fn inboxes_dir(&self, team_name: &str) -> PathBuf {
        self.team_dir(team_name).join("inboxes")
    }

    /// Task directory of one team
    pub fn team_tasks_dir(&self, team_name: &str) -> PathBuf {
        self.tasks_dir.join(team_name)
    }
}
