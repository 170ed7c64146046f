//! Content fingerprints used to suppress unchanged updates.

use serde::Serialize;

use crate::monitor::TeamMonitorData;
use crate::teams::{TeamConfig, TeamTask};

/// Snapshot fields that participate in change detection
///
/// `last_updated` is left out: it is stamped on every pass and would make
/// every poll look like a change.
#[derive(Serialize)]
struct StableView<'a> {
    config: &'a TeamConfig,
    tasks: &'a [TeamTask],
    is_active: bool,
}

/// Serialized content of a snapshot list
///
/// Two lists compare equal iff their configs, tasks and activity flags
/// serialize identically, so a real change is never missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a (possibly filtered) snapshot list
    pub fn of(snapshots: &[TeamMonitorData]) -> serde_json::Result<Self> {
        let view: Vec<StableView<'_>> = snapshots
            .iter()
            .map(|s| StableView {
                config: &s.config,
                tasks: &s.tasks,
                is_active: s.is_active,
            })
            .collect();
        serde_json::to_string(&view).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::TaskStatus;

    fn snapshot(name: &str, status: &str) -> TeamMonitorData {
        let config: TeamConfig = serde_json::from_value(serde_json::json!({ "name": name })).unwrap();
        let task: TeamTask =
            serde_json::from_value(serde_json::json!({ "id": "1", "status": status })).unwrap();
        TeamMonitorData::new(config, vec![task])
    }

    #[test]
    fn test_ignores_last_updated() {
        let a = snapshot("alpha", "pending");
        let mut b = a.clone();
        b.last_updated += 10_000;

        assert_eq!(Fingerprint::of(&[a]).unwrap(), Fingerprint::of(&[b]).unwrap());
    }

    #[test]
    fn test_detects_status_change() {
        let a = snapshot("alpha", "pending");
        let mut b = a.clone();
        b.tasks[0].status = TaskStatus::Completed;

        assert_ne!(Fingerprint::of(&[a]).unwrap(), Fingerprint::of(&[b]).unwrap());
    }

    #[test]
    fn test_detects_membership_and_order() {
        let a = snapshot("alpha", "pending");
        let b = snapshot("beta", "pending");

        let one = Fingerprint::of(std::slice::from_ref(&a)).unwrap();
        let both = Fingerprint::of(&[a.clone(), b.clone()]).unwrap();
        let swapped = Fingerprint::of(&[b, a]).unwrap();

        assert_ne!(one, both);
        assert_ne!(both, swapped);
        assert_ne!(Fingerprint::of(&[]).unwrap(), one);
    }
}
