//! TOML config file support.
//!
//! Config location: `~/.config/workmux/config.toml`

use serde::Deserialize;
use std::path::PathBuf;

/// What happens to flow-control credit when a failed session is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditRetryPolicy {
    /// Forget the old counter; the next bootstrap re-seeds it.
    #[default]
    Reset,
    /// Keep the counter and any queued input across the retry.
    Preserve,
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Shell to spawn for new terminal sessions (defaults to $SHELL).
    pub shell: Option<String>,
    /// Maximum number of scrollback lines.
    pub scrollback_lines: usize,
    /// Raw output bytes retained per session for replay on reattach.
    pub backlog_bytes: usize,
    /// Input credit granted to a newly attached session.
    pub initial_credit: u64,
    /// Credit handling when a failed session is retried.
    pub credit_retry_policy: CreditRetryPolicy,
    /// Persisted debug overlay flag ("1" = on). Consulted only when no
    /// explicit in-session preference is set.
    pub debug_overlay: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            scrollback_lines: crate::constants::scrollback::DEFAULT_LINES,
            backlog_bytes: crate::constants::backlog::DEFAULT_BYTES,
            initial_credit: crate::constants::flow::DEFAULT_INITIAL_CREDIT,
            credit_retry_policy: CreditRetryPolicy::Reset,
            debug_overlay: None,
        }
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# workmux Configuration

# Shell for new terminal sessions (defaults to $SHELL)
# shell = "/bin/zsh"

# Maximum scrollback buffer size (lines)
scrollback-lines = 10000

# Raw output bytes kept per session for replay on reattach
backlog-bytes = 262144

# Input flow-control credit granted on attach
initial-credit = 100

# Credit handling when a failed session is retried: "reset" or "preserve"
credit-retry-policy = "reset"

# Per-session debug overlays ("1" = on)
# debug-overlay = "1"
"#;

/// Return the config file path.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("workmux").join("config.toml"))
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path()?;
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(&path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > crate::constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}

/// Persist the debug overlay flag, preserving comments/formatting.
pub fn save_debug_overlay(enabled: bool) {
    let Some(path) = config_path() else {
        return;
    };

    let content = std::fs::read_to_string(&path).unwrap_or_default();
    let updated = match set_debug_overlay(&content, enabled) {
        Some(doc) => doc,
        None => return,
    };

    if let Err(e) = std::fs::write(&path, updated) {
        tracing::warn!("Failed to save debug overlay flag: {}", e);
    }
}

/// Targeted `debug-overlay` update on raw TOML text. Returns `None` when
/// the document does not parse.
fn set_debug_overlay(content: &str, enabled: bool) -> Option<String> {
    let mut doc = content.parse::<toml_edit::DocumentMut>().ok()?;
    doc["debug-overlay"] = toml_edit::value(if enabled { "1" } else { "0" });
    Some(doc.to_string())
}
