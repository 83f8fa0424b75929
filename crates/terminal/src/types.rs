//! Wire-facing types shared across the protocol components.

use crate::mouse::MouseEncoding;
use serde::{Deserialize, Serialize};

/// What kind of program a session hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    #[default]
    Terminal,
    Agent,
}

/// One attach/reattach handshake message from the backend.
///
/// Every field beyond the addressing pair is optional: absence means
/// "nothing to apply for this aspect", not an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapPayload {
    pub workspace_name: String,
    pub terminal_id: String,
    /// Full current screen state; applied before any backlog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// Byte-level output history to replay in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<Vec<u8>>,
    /// History was lost at the head; scrollback is not continuous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog_truncated: Option<bool>,
    /// Byte offset for the next incremental read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_screen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_sgr: Option<bool>,
    /// `false` when the backend judges mid-sequence state ambiguous;
    /// the consumer must request a fresh redraw instead of replaying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_to_replay: Option<bool>,
    /// Seed for the input flow-control credit counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_credit: Option<u64>,
}

/// Terminal modes applied to the local emulator before the I/O pumps
/// attach, so mode-dependent escape interpretation matches the remote
/// program from the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalModes {
    pub alt_screen: bool,
    pub mouse: bool,
    pub mouse_sgr: bool,
    pub mouse_encoding: MouseEncoding,
}

impl TerminalModes {
    /// Modes as reported in a bootstrap payload. Without an explicit
    /// encoding on the wire, SGR when flagged, legacy x10 otherwise.
    pub fn from_bootstrap(payload: &BootstrapPayload) -> Self {
        let mouse_sgr = payload.mouse_sgr.unwrap_or(false);
        Self {
            alt_screen: payload.alt_screen.unwrap_or(false),
            mouse: payload.mouse.unwrap_or(false),
            mouse_sgr,
            mouse_encoding: if mouse_sgr {
                MouseEncoding::Sgr
            } else {
                MouseEncoding::X10
            },
        }
    }
}
