//! Configuration system for workmux.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{
    config_path, ensure_config_file, load_config, save_debug_overlay, Config, CreditRetryPolicy,
};
