//! Code-area ownership: path-glob rules and longest-match-wins resolution.
//!
//! The separation-of-duties check that consumes this (an agent cannot
//! approve in a code area it owns) lives in `converge-auth`, since it needs
//! to append an event; this module only owns the glob data and the match.

use serde::{Deserialize, Serialize};

/// One ownership rule: a glob `pattern` mapped to a set of `owners`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipRule {
    pub pattern: String,
    pub owners: Vec<String>,
    #[serde(default)]
    pub team: String,
}

/// The full set of ownership rules for a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipConfig {
    #[serde(default)]
    pub rules: Vec<OwnershipRule>,
    /// If true, a file with no matching rule is treated as unowned-and-blocked
    /// by callers that enforce ownership; this type only reports the fact.
    #[serde(default)]
    pub strict: bool,
}

impl OwnershipConfig {
    /// Owners of `path`, taken from the single longest (most specific)
    /// matching pattern. Ties keep all tied rules' owners, deduplicated.
    pub fn owners_for(&self, path: &str) -> Vec<String> {
        let mut best_len = 0usize;
        let mut owners: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !glob_match(&rule.pattern, path) {
                continue;
            }
            let len = rule.pattern.len();
            match len.cmp(&best_len) {
                std::cmp::Ordering::Greater => {
                    best_len = len;
                    owners = rule.owners.clone();
                }
                std::cmp::Ordering::Equal => {
                    for o in &rule.owners {
                        if !owners.contains(o) {
                            owners.push(o.clone());
                        }
                    }
                }
                std::cmp::Ordering::Less => {}
            }
        }
        owners
    }

    /// Whether `agent_id` owns any of `paths`.
    pub fn is_owner(&self, agent_id: &str, paths: &[String]) -> bool {
        paths
            .iter()
            .any(|p| self.owners_for(p).iter().any(|o| o == agent_id))
    }
}

/// Shell-style glob matching supporting `*` (any run of characters, including
/// none, never crossing a path separator) and `**` (any run of characters,
/// crossing separators freely).
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = path.chars().collect();
    match_from(&pat, &text)
}

fn match_from(pat: &[char], text: &[char]) -> bool {
    if pat.is_empty() {
        return text.is_empty();
    }
    if pat[0] == '*' {
        if pat.len() >= 2 && pat[1] == '*' {
            // `**`: consume any run of characters, then try every split point.
            let mut rest = 2;
            while rest < pat.len() && pat[rest] == '/' {
                rest += 1;
            }
            for i in 0..=text.len() {
                if match_from(&pat[rest..], &text[i..]) {
                    return true;
                }
            }
            false
        } else {
            for i in 0..=text.len() {
                if text[..i].contains(&'/') {
                    break;
                }
                if match_from(&pat[1..], &text[i..]) {
                    return true;
                }
            }
            false
        }
    } else if pat[0] == '?' {
        !text.is_empty() && match_from(&pat[1..], &text[1..])
    } else {
        !text.is_empty() && text[0] == pat[0] && match_from(&pat[1..], &text[1..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, owners: &[&str]) -> OwnershipRule {
        OwnershipRule {
            pattern: pattern.to_string(),
            owners: owners.iter().map(|s| s.to_string()).collect(),
            team: String::new(),
        }
    }

    #[test]
    fn double_star_crosses_directories() {
        assert!(glob_match("src/auth/**", "src/auth/handlers/login.rs"));
        assert!(!glob_match("src/auth/**", "src/billing/invoice.rs"));
    }

    #[test]
    fn single_star_stays_within_one_segment() {
        assert!(glob_match("src/*.rs", "src/lib.rs"));
        assert!(!glob_match("src/*.rs", "src/auth/lib.rs"));
    }

    #[test]
    fn longest_match_wins_over_broader_rule() {
        let cfg = OwnershipConfig {
            rules: vec![
                rule("src/**", &["platform-team"]),
                rule("src/auth/**", &["auth-team"]),
            ],
            strict: false,
        };
        assert_eq!(cfg.owners_for("src/auth/login.rs"), vec!["auth-team"]);
        assert_eq!(cfg.owners_for("src/db/pool.rs"), vec!["platform-team"]);
    }

    #[test]
    fn is_owner_checks_any_of_several_files() {
        let cfg = OwnershipConfig {
            rules: vec![rule("src/auth/**", &["auth-team"])],
            strict: false,
        };
        let files = vec!["README.md".to_string(), "src/auth/login.rs".to_string()];
        assert!(cfg.is_owner("auth-team", &files));
        assert!(!cfg.is_owner("platform-team", &files));
    }
}
