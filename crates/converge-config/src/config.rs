//! `Converge.toml` + `CONVERGE_*` environment configuration.
//!
//! File discovery walks up from the working directory, environment
//! variables override file values, and the merged result (de)serializes
//! as TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "Converge.toml";

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete Converge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.queue.lock_ttl_secs)
    }

    pub fn merge(&self, other: &Config) -> Config {
        Config {
            store: StoreConfig {
                dialect: other.store.dialect.clone().or_else(|| self.store.dialect.clone()),
                path: other.store.path.clone().or_else(|| self.store.path.clone()),
            },
            queue: QueueConfig {
                lock_ttl_secs: if other.queue.lock_ttl_secs != default_lock_ttl() {
                    other.queue.lock_ttl_secs
                } else {
                    self.queue.lock_ttl_secs
                },
                max_retries: if other.queue.max_retries != default_max_retries() {
                    other.queue.max_retries
                } else {
                    self.queue.max_retries
                },
                capacity: if other.queue.capacity != default_capacity() {
                    other.queue.capacity
                } else {
                    self.queue.capacity
                },
            },
            risk: self.risk.clone().merge(&other.risk),
            intake: IntakeConfig {
                stale_hours: if other.intake.stale_hours != default_stale_hours() {
                    other.intake.stale_hours
                } else {
                    self.intake.stale_hours
                },
                review_capacity: if other.intake.review_capacity != default_review_capacity() {
                    other.intake.review_capacity
                } else {
                    self.intake.review_capacity
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_lock_ttl() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_capacity() -> u32 {
    50
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            lock_ttl_secs: default_lock_ttl(),
            max_retries: default_max_retries(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_low")]
    pub low_threshold: f64,
    #[serde(default = "default_medium")]
    pub medium_threshold: f64,
    #[serde(default = "default_high")]
    pub high_threshold: f64,
    #[serde(default = "default_critical")]
    pub critical_threshold: f64,
}

fn default_low() -> f64 {
    0.0
}
fn default_medium() -> f64 {
    25.0
}
fn default_high() -> f64 {
    50.0
}
fn default_critical() -> f64 {
    75.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            low_threshold: default_low(),
            medium_threshold: default_medium(),
            high_threshold: default_high(),
            critical_threshold: default_critical(),
        }
    }
}

impl RiskConfig {
    fn merge(&self, other: &RiskConfig) -> RiskConfig {
        RiskConfig {
            low_threshold: if other.low_threshold != default_low() {
                other.low_threshold
            } else {
                self.low_threshold
            },
            medium_threshold: if other.medium_threshold != default_medium() {
                other.medium_threshold
            } else {
                self.medium_threshold
            },
            high_threshold: if other.high_threshold != default_high() {
                other.high_threshold
            } else {
                self.high_threshold
            },
            critical_threshold: if other.critical_threshold != default_critical() {
                other.critical_threshold
            } else {
                self.critical_threshold
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_stale_hours")]
    pub stale_hours: u32,
    #[serde(default = "default_review_capacity")]
    pub review_capacity: u32,
}

fn default_stale_hours() -> u32 {
    24
}
fn default_review_capacity() -> u32 {
    10
}

impl Default for IntakeConfig {
    fn default() -> Self {
        IntakeConfig {
            stale_hours: default_stale_hours(),
            review_capacity: default_review_capacity(),
        }
    }
}

pub fn load_config(dir: &Path) -> Result<Config> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(dir: &Path, config: &Config) -> Result<()> {
    let path = config_path(dir);
    let content = toml::to_string_pretty(config).context("failed to serialize config to TOML")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}

pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Applies `CONVERGE_*` environment overrides on top of a loaded config.
/// Env takes precedence over the file, matching the flag registry's
/// defaults → config → env precedence.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(v) = std::env::var("CONVERGE_QUEUE_LOCK_TTL_SECS") {
        if let Ok(n) = v.parse() {
            config.queue.lock_ttl_secs = n;
        }
    }
    if let Ok(v) = std::env::var("CONVERGE_QUEUE_MAX_RETRIES") {
        if let Ok(n) = v.parse() {
            config.queue.max_retries = n;
        }
    }
    if let Ok(v) = std::env::var("CONVERGE_STORE_PATH") {
        config.store.path = Some(v);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::new();
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue_lock_ttl(), Duration::from_secs(300));
        assert_eq!(config.risk.medium_threshold, 25.0);
    }

    #[test]
    fn load_missing_config_returns_default() {
        let td = tempdir().unwrap();
        let config = load_config(td.path()).unwrap();
        assert_eq!(config.queue.max_retries, 3);
    }

    #[test]
    fn save_and_load_round_trips() {
        let td = tempdir().unwrap();
        let mut config = Config::new();
        config.queue.max_retries = 7;
        config.store.path = Some("db.sqlite".to_string());
        save_config(td.path(), &config).unwrap();

        let loaded = load_config(td.path()).unwrap();
        assert_eq!(loaded.queue.max_retries, 7);
        assert_eq!(loaded.store.path.as_deref(), Some("db.sqlite"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let td = tempdir().unwrap();
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(&path, "[queue]\nmax_retries = 9\n").unwrap();

        let config = load_config(td.path()).unwrap();
        assert_eq!(config.queue.max_retries, 9);
        assert_eq!(config.queue.lock_ttl_secs, 300);
    }

    #[test]
    fn merge_prefers_overridden_values() {
        let mut base = Config::new();
        base.queue.max_retries = 3;
        let mut over = Config::new();
        over.queue.max_retries = 10;

        let merged = base.merge(&over);
        assert_eq!(merged.queue.max_retries, 10);
    }

    #[test]
    fn find_config_walks_up_the_tree() {
        let td = tempdir().unwrap();
        let nested = td.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(td.path().join(CONFIG_FILE), "[queue]\n").unwrap();

        assert_eq!(find_config(&nested), Some(td.path().join(CONFIG_FILE)));
    }

    #[test]
    #[serial]
    fn env_overrides_take_precedence_over_file() {
        std::env::set_var("CONVERGE_QUEUE_MAX_RETRIES", "11");
        let config = apply_env_overrides(Config::new());
        assert_eq!(config.queue.max_retries, 11);
        std::env::remove_var("CONVERGE_QUEUE_MAX_RETRIES");
    }
}
