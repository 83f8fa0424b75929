//! The session daemon.
//!
//! Owns every live PTY session and implements the protocol layer's
//! [`SessionTransport`]. Each session runs a pump thread that drains
//! PTY output into the shared event channel while recording it in the
//! session's backlog and mode tracker, so an attach at any moment can
//! describe the session's current state.

use anyhow::{bail, Context, Result};
use collections::FxHashMap;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use terminal::{BootstrapPayload, SessionEvent, SessionTransport, TerminalKind};

use crate::backlog::Backlog;
use crate::modes::ModeTracker;
use crate::pty::PtyHandler;

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Shell override for new sessions; `None` means `$SHELL`.
    pub shell: Option<String>,
    /// Output bytes retained per session for replay.
    pub backlog_limit: usize,
    /// Credit seed advertised in every bootstrap payload.
    pub initial_credit: Option<u64>,
    pub rows: u16,
    pub cols: u16,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            shell: None,
            backlog_limit: settings::constants::backlog::DEFAULT_BYTES,
            initial_credit: Some(settings::constants::flow::DEFAULT_INITIAL_CREDIT),
            rows: 24,
            cols: 80,
        }
    }
}

impl DaemonOptions {
    pub fn from_config(config: &settings::Config) -> Self {
        Self {
            shell: config.shell.clone(),
            backlog_limit: config.backlog_bytes,
            initial_credit: Some(config.initial_credit),
            ..Self::default()
        }
    }
}

/// Everything an attach needs to know about a session, shared between
/// the daemon and the session's pump thread.
struct SessionState {
    workspace_name: String,
    kind: TerminalKind,
    backlog: Backlog,
    modes: ModeTracker,
}

impl SessionState {
    fn new(workspace_name: String, kind: TerminalKind, backlog_limit: usize) -> Self {
        Self {
            workspace_name,
            kind,
            backlog: Backlog::new(backlog_limit),
            modes: ModeTracker::new(),
        }
    }

    fn record_output(&mut self, data: &[u8]) {
        self.backlog.push(data);
        self.modes.scan(data);
    }
}

/// Build the handshake message for an attach at `from_offset`.
///
/// The daemon never synthesizes a screen snapshot; the viewer rebuilds
/// from the backlog, or requests a redraw when replay is unsafe. Replay
/// is unsafe while the program holds the alternate screen, since the
/// retained bytes straddle a screen switch the viewer did not see.
fn bootstrap_payload(
    state: &SessionState,
    terminal_id: &str,
    from_offset: u64,
    initial_credit: Option<u64>,
) -> BootstrapPayload {
    let (bytes, lost) = state.backlog.read_from(from_offset);
    let modes = state.modes.modes();
    BootstrapPayload {
        workspace_name: state.workspace_name.clone(),
        terminal_id: terminal_id.to_string(),
        snapshot: None,
        backlog: (!bytes.is_empty()).then_some(bytes),
        backlog_truncated: lost.then_some(true),
        next_offset: Some(state.backlog.end_offset()),
        alt_screen: Some(modes.alt_screen),
        mouse: Some(modes.mouse),
        mouse_sgr: Some(modes.mouse_sgr),
        safe_to_replay: Some(!modes.alt_screen),
        initial_credit,
    }
}

struct Session {
    state: Arc<Mutex<SessionState>>,
    pty: PtyHandler,
    _pump: thread::JoinHandle<()>,
}

pub struct SessionDaemon {
    sessions: FxHashMap<String, Session>,
    events_tx: Sender<SessionEvent>,
    options: DaemonOptions,
}

impl SessionDaemon {
    pub fn new(options: DaemonOptions, events_tx: Sender<SessionEvent>) -> Self {
        Self {
            sessions: FxHashMap::default(),
            events_tx,
            options,
        }
    }

    pub fn has_session(&self, terminal_id: &str) -> bool {
        self.sessions.contains_key(terminal_id)
    }

    pub fn session_kind(&self, terminal_id: &str) -> Option<TerminalKind> {
        self.sessions
            .get(terminal_id)
            .map(|session| session.state.lock().kind)
    }

    /// Tear a session down for good: the PTY child is killed and the
    /// backlog discarded. Returns whether the session existed.
    pub fn remove_session(&mut self, terminal_id: &str) -> bool {
        let removed = self.sessions.remove(terminal_id).is_some();
        if removed {
            tracing::info!(terminal_id, "session removed");
        }
        removed
    }

    /// Kill every session. Drop order reaps each PTY child.
    pub fn shutdown(&mut self) {
        let count = self.sessions.len();
        self.sessions.clear();
        tracing::info!(count, "daemon shut down");
    }

    fn session(&self, terminal_id: &str) -> Result<&Session> {
        self.sessions
            .get(terminal_id)
            .with_context(|| format!("session not found: {terminal_id}"))
    }

    fn session_mut(&mut self, terminal_id: &str) -> Result<&mut Session> {
        self.sessions
            .get_mut(terminal_id)
            .with_context(|| format!("session not found: {terminal_id}"))
    }
}

impl SessionTransport for SessionDaemon {
    fn create_session(
        &mut self,
        workspace_name: &str,
        kind: TerminalKind,
        cwd: &Path,
    ) -> Result<String> {
        let terminal_id = uuid::Uuid::new_v4().to_string();
        let mut pty = PtyHandler::spawn(
            self.options.shell.as_deref(),
            Some(cwd),
            self.options.rows,
            self.options.cols,
        )?;
        let output_rx = pty
            .take_output()
            .context("PTY output channel already taken")?;

        let state = Arc::new(Mutex::new(SessionState::new(
            workspace_name.to_string(),
            kind,
            self.options.backlog_limit,
        )));

        let pump_state = state.clone();
        let pump_events = self.events_tx.clone();
        let pump_id = terminal_id.clone();
        let pump = thread::spawn(move || {
            for data in output_rx {
                pump_state.lock().record_output(&data);
                let event = SessionEvent::Output {
                    terminal_id: pump_id.clone(),
                    data,
                };
                if pump_events.send(event).is_err() {
                    return;
                }
            }
            let _ = pump_events.send(SessionEvent::Exited {
                terminal_id: pump_id,
                cause: "process exited".to_string(),
            });
        });

        tracing::info!(terminal_id, workspace_name, "session created");
        self.sessions.insert(
            terminal_id.clone(),
            Session {
                state,
                pty,
                _pump: pump,
            },
        );
        Ok(terminal_id)
    }

    fn attach(&mut self, workspace_name: &str, terminal_id: &str, from_offset: u64) -> Result<()> {
        let session = self.session(terminal_id)?;
        let state = session.state.lock();
        if state.workspace_name != workspace_name {
            bail!("terminal not found in workspace {workspace_name}");
        }
        let payload =
            bootstrap_payload(&state, terminal_id, from_offset, self.options.initial_credit);
        drop(state);
        self.events_tx
            .send(SessionEvent::Bootstrap(payload))
            .context("event channel closed")?;
        Ok(())
    }

    fn write_input(&mut self, terminal_id: &str, data: &[u8]) -> Result<()> {
        let bytes = data.len() as u64;
        let session = self.session_mut(terminal_id)?;
        session.pty.write(data)?;
        self.events_tx
            .send(SessionEvent::InputAck {
                terminal_id: terminal_id.to_string(),
                bytes,
            })
            .context("event channel closed")?;
        Ok(())
    }

    fn resize(&mut self, terminal_id: &str, rows: u16, cols: u16) -> Result<()> {
        self.session(terminal_id)?.pty.resize(rows, cols)
    }

    fn detach(&mut self, terminal_id: &str) -> Result<()> {
        // The session keeps running; only the viewer goes away.
        let _ = self.session(terminal_id)?;
        tracing::debug!(terminal_id, "viewer detached");
        Ok(())
    }
}
