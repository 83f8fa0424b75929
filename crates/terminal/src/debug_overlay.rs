//! Per-session debug overlay toggle.
//!
//! Resolution order: an explicit in-memory preference wins; otherwise
//! the persisted config flag (`"1"` = on); otherwise off. Changes are
//! broadcast to sessions only when the resolved value actually flips,
//! so settings re-renders do not cause broadcast storms.

/// Explicit overlay preference for the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugPreference {
    On,
    Off,
    #[default]
    Unset,
}

#[derive(Debug, Default)]
pub struct DebugOverlayState {
    preference: DebugPreference,
    enabled: bool,
}

impl DebugOverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_preference(&mut self, preference: DebugPreference) {
        self.preference = preference;
    }

    pub fn preference(&self) -> DebugPreference {
        self.preference
    }

    /// The last value resolved by [`Self::sync_debug_enabled`].
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Recompute the resolved value from the preference and the
    /// persisted flag, invoking `broadcast` only on an actual change.
    /// Returns the resolved value.
    pub fn sync_debug_enabled(
        &mut self,
        persisted_flag: impl FnOnce() -> Option<String>,
        broadcast: impl FnOnce(bool),
    ) -> bool {
        let resolved = match self.preference {
            DebugPreference::On => true,
            DebugPreference::Off => false,
            DebugPreference::Unset => persisted_flag().as_deref() == Some("1"),
        };
        if resolved != self.enabled {
            self.enabled = resolved;
            tracing::debug!(enabled = resolved, "debug overlay state changed");
            broadcast(resolved);
        }
        resolved
    }
}
