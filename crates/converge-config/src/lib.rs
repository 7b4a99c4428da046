//! Layered configuration (`Converge.toml` + `CONVERGE_*` env) and the
//! process-wide feature flag registry.

mod config;
mod flags;

pub use config::{
    Config, IntakeConfig, QueueConfig, RiskConfig, StoreConfig, apply_env_overrides, config_path,
    find_config, load_config, load_config_from_file, save_config, CONFIG_FILE,
};
pub use flags::{FlagState, get_flag, get_mode, is_enabled, list_flags, set_flag};
