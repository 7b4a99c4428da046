//! Separation of duties: an agent cannot approve or merge code it owns.
//! Ported from `ownership.py`'s `check_sod`.

use converge_types::OwnershipConfig;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SodCheck {
    pub allowed: bool,
    pub reason: String,
    #[serde(default)]
    pub owned_files: Vec<String>,
}

const ENFORCED_ACTIONS: &[&str] = &["approve", "merge"];

/// Checks whether `agent_id` may perform `action` against `files`. An empty
/// rule set is permissive by default (no ownership configured means nothing
/// to violate).
pub fn check_sod(agent_id: &str, files: &[String], action: &str, config: &OwnershipConfig) -> SodCheck {
    if config.rules.is_empty() {
        return SodCheck { allowed: true, reason: "no ownership rules configured".to_string(), owned_files: Vec::new() };
    }

    let is_owner = config.is_owner(agent_id, files);
    if is_owner && ENFORCED_ACTIONS.contains(&action) {
        let owned_files: Vec<String> =
            files.iter().filter(|f| config.owners_for(f).iter().any(|o| o == agent_id)).cloned().collect();
        return SodCheck {
            allowed: false,
            reason: format!("SoD violation: {agent_id} owns code in touched files"),
            owned_files,
        };
    }

    SodCheck { allowed: true, reason: "no SoD conflict".to_string(), owned_files: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_types::OwnershipRule;

    fn config() -> OwnershipConfig {
        OwnershipConfig {
            rules: vec![OwnershipRule {
                pattern: "src/auth/**".to_string(),
                owners: vec!["auth-bot".to_string()],
                team: String::new(),
            }],
            strict: false,
        }
    }

    #[test]
    fn blocks_owner_from_approving_own_code() {
        let files = vec!["src/auth/login.rs".to_string()];
        let result = check_sod("auth-bot", &files, "approve", &config());
        assert!(!result.allowed);
        assert_eq!(result.owned_files, files);
    }

    #[test]
    fn allows_non_owner_to_approve() {
        let files = vec!["src/auth/login.rs".to_string()];
        let result = check_sod("platform-bot", &files, "approve", &config());
        assert!(result.allowed);
    }

    #[test]
    fn allows_owner_to_take_non_enforced_actions() {
        let files = vec!["src/auth/login.rs".to_string()];
        let result = check_sod("auth-bot", &files, "analyze", &config());
        assert!(result.allowed);
    }

    #[test]
    fn permissive_when_no_rules_configured() {
        let files = vec!["src/auth/login.rs".to_string()];
        let empty = OwnershipConfig::default();
        let result = check_sod("auth-bot", &files, "approve", &empty);
        assert!(result.allowed);
    }
}
