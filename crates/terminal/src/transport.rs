//! The seam between the protocol layer and a session backend.

use crate::types::{BootstrapPayload, TerminalKind};
use anyhow::Result;
use std::path::Path;

/// Events a backend delivers to the host, ordered per terminal by the
/// transport. The host feeds them into the matching
/// [`crate::SessionBootstrap`] machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The attach handshake message, delivered once per attach.
    Bootstrap(BootstrapPayload),
    /// Raw output bytes from the PTY.
    Output { terminal_id: String, data: Vec<u8> },
    /// The backend consumed input; replenishes flow-control credit.
    InputAck { terminal_id: String, bytes: u64 },
    /// The session ended; `cause` is surfaced as a closed notice.
    Exited { terminal_id: String, cause: String },
}

/// A backend capable of hosting PTY sessions.
pub trait SessionTransport {
    /// Create a session and return its terminal id.
    fn create_session(
        &mut self,
        workspace_name: &str,
        kind: TerminalKind,
        cwd: &Path,
    ) -> Result<String>;

    /// Request a bootstrap for an existing session. The payload arrives
    /// as a [`SessionEvent::Bootstrap`]; `from_offset` resumes the
    /// backlog from a prior read position.
    fn attach(&mut self, workspace_name: &str, terminal_id: &str, from_offset: u64) -> Result<()>;

    /// Forward raw input bytes to the PTY.
    fn write_input(&mut self, terminal_id: &str, data: &[u8]) -> Result<()>;

    fn resize(&mut self, terminal_id: &str, rows: u16, cols: u16) -> Result<()>;

    /// Stop delivering events for this terminal. The session itself
    /// keeps running for a later reattach.
    fn detach(&mut self, terminal_id: &str) -> Result<()>;
}

/// Whether a backend error means "session not there right now" rather
/// than a real failure — callers recover by re-running the bootstrap
/// instead of failing the session.
pub fn is_transient_session_error(err: &anyhow::Error) -> bool {
    let message = err.to_string();
    ["session not found", "terminal not started", "terminal not found"]
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn transient_errors_are_recognized_by_marker() {
        assert!(is_transient_session_error(&anyhow!("session not found: t1")));
        assert!(is_transient_session_error(&anyhow!("terminal not started")));
        assert!(!is_transient_session_error(&anyhow!("permission denied")));
    }
}
