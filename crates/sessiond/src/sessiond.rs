//! The workmux session backend.
//!
//! Hosts PTY sessions that outlive any particular viewer: each session
//! keeps a byte backlog for replay on reattach and tracks the terminal
//! modes its program negotiated, so a fresh viewer can be brought to
//! the session's current state. Implements the protocol layer's
//! [`terminal::SessionTransport`] seam.

pub mod backlog;
pub mod daemon;
pub mod modes;
pub mod pty;

pub use backlog::Backlog;
pub use daemon::{DaemonOptions, SessionDaemon};
pub use modes::ModeTracker;
pub use pty::PtyHandler;
