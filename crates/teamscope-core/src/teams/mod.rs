pub mod config;
pub mod inbox;
pub mod paths;
pub mod roster;
pub mod task;
pub mod validate;

pub use config::{read_team_config, TeamConfig, TeamMember};
pub use inbox::{
    read_inbox_roster, read_team_inboxes, AgentInbox, InboxMessage, ObservedAgent, TeamInboxData,
};
pub use paths::StorePaths;
pub use roster::{extract_description, reconcile_members};
pub use task::{read_all_tasks, TaskStatus, TeamTask};
pub use validate::{is_valid_team_name, validate_team_name};
