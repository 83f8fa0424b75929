//! Centralized configuration constants for workmux.

/// Scrollback buffer configuration.
pub mod scrollback {
    /// Default scrollback buffer size in lines.
    pub const DEFAULT_LINES: usize = 10_000;
    /// Maximum allowed scrollback buffer size in lines.
    pub const MAX_LINES: usize = 100_000;
}

/// Session backlog retention (bytes of raw PTY output kept for replay).
pub mod backlog {
    /// Default backlog retention per session.
    pub const DEFAULT_BYTES: usize = 256 * 1024;
}

/// Input flow control.
pub mod flow {
    /// Credit granted to a freshly attached session when the backend
    /// does not specify one.
    pub const DEFAULT_INITIAL_CREDIT: u64 = 100;
}

/// Mouse echo suppression.
pub mod echo {
    use std::time::Duration;

    /// How long after a local mouse action PTY output is screened for
    /// echoed mouse reports.
    pub const SUPPRESS_WINDOW: Duration = Duration::from_millis(4_000);

    /// Maximum trailing bytes carried between output chunks to detect
    /// escape sequences split across delivery boundaries.
    pub const TAIL_MAX_BYTES: usize = 16;
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;
}
