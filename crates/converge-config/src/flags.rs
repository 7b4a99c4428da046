//! Feature flag registry: defaults -> `.converge/flags.json` -> `CONVERGE_FF_*` env.
//!
//! Unlike the config loader above, flag state is read through a process-wide
//! cache (mirroring the reference's module-level `_flags` dict) since flags
//! are checked on every hot-path decision and a fresh file/env read per call
//! would be wasteful.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// One flag's resolved state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagState {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "default".to_string()
}

fn flag_defaults() -> Vec<(&'static str, bool, &'static str, &'static str)> {
    vec![
        ("intent_links", true, "", "Track commit-to-intent links"),
        ("archaeology_enhanced", true, "", "Enhanced git history analysis"),
        ("intent_semantics", true, "", "Semantic embeddings and similarity"),
        ("origin_policy", true, "", "Origin-type policy overrides"),
        ("verification_debt", true, "", "Verification debt tracking"),
        ("review_tasks", true, "", "Human review task workflow"),
        ("security_adapters", true, "", "Security scanner integration"),
        ("intake_control", true, "", "Adaptive intake throttling"),
        ("semantic_conflicts", true, "shadow", "Semantic conflict detection"),
        ("plan_coordination", true, "", "Plan-based dependency enforcement"),
        ("audit_chain", true, "", "Event tamper-evidence chain"),
        ("code_ownership", false, "", "Code-area ownership SoD enforcement"),
    ]
}

struct Registry {
    flags: RwLock<BTreeMap<String, FlagState>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        flags: RwLock::new(load_flags(None)),
    })
}

fn load_flags(config_dir: Option<&Path>) -> BTreeMap<String, FlagState> {
    let mut flags = BTreeMap::new();
    for (name, enabled, mode, description) in flag_defaults() {
        flags.insert(
            name.to_string(),
            FlagState {
                name: name.to_string(),
                enabled,
                mode: mode.to_string(),
                description: description.to_string(),
                source: "default".to_string(),
            },
        );
    }

    let candidates = [
        config_dir.map(|d| d.join(".converge").join("flags.json")),
        config_dir.map(|d| d.join("flags.json")),
        Some(Path::new(".converge/flags.json").to_path_buf()),
        Some(Path::new("flags.json").to_path_buf()),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(content) = std::fs::read_to_string(&candidate) {
            if let Ok(data) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(obj) = data.as_object() {
                    for (name, cfg) in obj {
                        if let Some(state) = flags.get_mut(name) {
                            match cfg {
                                serde_json::Value::Bool(b) => state.enabled = *b,
                                serde_json::Value::Object(o) => {
                                    if let Some(e) = o.get("enabled").and_then(|v| v.as_bool()) {
                                        state.enabled = e;
                                    }
                                    if let Some(m) = o.get("mode").and_then(|v| v.as_str()) {
                                        state.mode = m.to_string();
                                    }
                                }
                                _ => {}
                            }
                            state.source = "config".to_string();
                        }
                    }
                }
            }
            break;
        }
    }

    for (name, _, _, _) in flag_defaults() {
        let env_key = format!("CONVERGE_FF_{}", name.to_uppercase());
        if let Ok(val) = std::env::var(&env_key) {
            if let Some(state) = flags.get_mut(name) {
                state.enabled = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                state.source = "env".to_string();
            }
        }
        let mode_key = format!("CONVERGE_FF_{}_MODE", name.to_uppercase());
        if let Ok(val) = std::env::var(&mode_key) {
            if let Some(state) = flags.get_mut(name) {
                state.mode = val;
            }
        }
    }

    flags
}

/// Whether `flag_name` is enabled. Unknown flags default to enabled, matching
/// the reference's fail-open behavior for forward compatibility.
pub fn is_enabled(flag_name: &str) -> bool {
    registry()
        .flags
        .read()
        .expect("flag registry lock poisoned")
        .get(flag_name)
        .map(|s| s.enabled)
        .unwrap_or(true)
}

/// The rollout mode for `flag_name` (e.g. `"shadow"` or `"enforce"`), or
/// empty string if unset or unknown.
pub fn get_mode(flag_name: &str) -> String {
    registry()
        .flags
        .read()
        .expect("flag registry lock poisoned")
        .get(flag_name)
        .map(|s| s.mode.clone())
        .unwrap_or_default()
}

pub fn get_flag(flag_name: &str) -> Option<FlagState> {
    registry().flags.read().expect("flag registry lock poisoned").get(flag_name).cloned()
}

pub fn list_flags() -> Vec<FlagState> {
    registry().flags.read().expect("flag registry lock poisoned").values().cloned().collect()
}

/// Sets a flag's state at runtime (API-sourced). Returns `None` for unknown
/// flags; callers in `converge-core` emit `feature_flag.changed` on success.
pub fn set_flag(flag_name: &str, enabled: Option<bool>, mode: Option<String>) -> Option<FlagState> {
    let mut flags = registry().flags.write().expect("flag registry lock poisoned");
    let state = flags.get_mut(flag_name)?;
    if let Some(e) = enabled {
        state.enabled = e;
    }
    if let Some(m) = mode {
        state.mode = m;
    }
    state.source = "api".to_string();
    Some(state.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_contain_code_ownership_disabled() {
        let flags = load_flags(None);
        assert!(!flags["code_ownership"].enabled);
        assert!(flags["audit_chain"].enabled);
    }

    #[test]
    fn semantic_conflicts_defaults_to_shadow_mode() {
        let flags = load_flags(None);
        assert_eq!(flags["semantic_conflicts"].mode, "shadow");
    }

    #[test]
    fn config_file_overrides_default() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join(".converge")).unwrap();
        std::fs::write(
            td.path().join(".converge").join("flags.json"),
            r#"{"code_ownership": true}"#,
        )
        .unwrap();

        let flags = load_flags(Some(td.path()));
        assert!(flags["code_ownership"].enabled);
        assert_eq!(flags["code_ownership"].source, "config");
    }

    #[test]
    fn unknown_flag_name_is_not_in_the_registry() {
        let flags = load_flags(None);
        assert!(!flags.contains_key("totally_made_up_flag"));
    }
}
