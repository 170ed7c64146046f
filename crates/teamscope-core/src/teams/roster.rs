//! Roster reconciliation: declared membership vs. observed inbox activity
//!
//! An inbox file is the ground truth for "this agent has participated".
//! `config.json` can be stale in both directions, so the reconciled roster
//! keeps declared members that have an inbox and adds inbox owners that
//! were never declared.

use std::collections::HashSet;

use super::config::TeamMember;
use super::inbox::ObservedAgent;

/// Lines of the first inbox message used for a description
const DESCRIPTION_MAX_LINES: usize = 5;

/// Character limit of a description before truncation
const DESCRIPTION_MAX_CHARS: usize = 150;

/// Agent type assigned to members synthesized from an inbox
const SYNTHESIZED_AGENT_TYPE: &str = "general-purpose";

/// Derive a short description from the text of an agent's first message
///
/// Takes the first five lines, trims them, and truncates to 150 characters
/// plus `...`. Returns `None` only for empty text; text that is all
/// whitespace yields an empty description.
pub fn extract_description(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let head = text
        .split('\n')
        .take(DESCRIPTION_MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n");
    let head = head.trim();

    if head.chars().count() > DESCRIPTION_MAX_CHARS {
        let truncated: String = head.chars().take(DESCRIPTION_MAX_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(head.to_string())
    }
}

/// Minimal member record for an agent that only exists as an inbox
fn synthesize_member(team_name: &str, agent: &ObservedAgent) -> TeamMember {
    TeamMember {
        agent_id: format!("{}@{}", agent.name, team_name),
        name: agent.name.clone(),
        agent_type: SYNTHESIZED_AGENT_TYPE.to_string(),
        model: String::new(),
        prompt: None,
        color: None,
        plan_mode_required: false,
        joined_at: 0,
        tmux_pane_id: String::new(),
        cwd: String::new(),
        subscriptions: Vec::new(),
        backend_type: String::new(),
        is_active: false,
        description: agent.first_message.as_deref().and_then(extract_description),
    }
}

/// Produce the authoritative member list of a team
///
/// * `observed = None` (no inbox directory): the declared list is returned
///   verbatim, so missing inbox data never wipes a roster.
/// * otherwise: declared members whose agent name has an inbox, in declared
///   order, followed by synthesized members for undeclared inbox owners in
///   observed order.
///
/// A declared member without an inbox file is dropped.
// TODO: confirm with product whether declared-but-silent members should stay as inactive entries
pub fn reconcile_members(
    team_name: &str,
    declared: &[TeamMember],
    observed: Option<&[ObservedAgent]>,
) -> Vec<TeamMember> {
    let Some(observed) = observed else {
        return declared.to_vec();
    };

    let observed_names: HashSet<&str> = observed.iter().map(|a| a.name.as_str()).collect();
    let declared_names: HashSet<&str> = declared.iter().map(TeamMember::agent_name).collect();

    let mut members: Vec<TeamMember> = declared
        .iter()
        .filter(|m| observed_names.contains(m.agent_name()))
        .cloned()
        .collect();

    members.extend(
        observed
            .iter()
            .filter(|a| !declared_names.contains(a.name.as_str()))
            .map(|a| synthesize_member(team_name, a)),
    );

    members
}
