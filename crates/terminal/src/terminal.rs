//! Terminal protocol core for workmux.
//!
//! Everything between a display surface and a backend PTY session: the
//! session context registry, the bootstrap/replay/flow-control state
//! machine, mouse report encoding, OSC color query responses, and the
//! mouse echo guard. No rendering and no I/O live here — components are
//! plain values driven by the host event loop, with the backend behind
//! the [`transport::SessionTransport`] seam.

pub mod bootstrap;
pub mod debug_overlay;
pub mod echo_guard;
pub mod mouse;
pub mod osc;
pub mod registry;
pub mod transport;
pub mod types;

pub use bootstrap::{SessionAction, SessionBootstrap, SessionPhase};
pub use debug_overlay::{DebugOverlayState, DebugPreference};
pub use echo_guard::MouseEchoGuard;
pub use mouse::{encode_mouse, MouseEncoding};
pub use osc::OscQueryResponder;
pub use registry::{build_terminal_key, TerminalContext, TerminalContextRegistry};
pub use transport::{SessionEvent, SessionTransport};
pub use types::{BootstrapPayload, TerminalKind, TerminalModes};
