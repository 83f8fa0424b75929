//! The attach/replay/flow-control state machine.
//!
//! One [`SessionBootstrap`] exists per terminal session. The host feeds
//! it backend events and input; it emits [`SessionAction`]s describing
//! what to do, in order. Making the phases an explicit enum (rather
//! than inferring them from which payload fields showed up) keeps a
//! second handshake for an already-bootstrapped session, or input
//! racing ahead of mode application, unrepresentable.

use crate::types::{BootstrapPayload, TerminalModes};
use settings::CreditRetryPolicy;
use std::collections::VecDeque;

/// Handshake phase for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the backend to deliver a bootstrap payload.
    Requesting,
    /// Payload applied; pumps not yet attached.
    Bootstrapped,
    /// Steady-state bidirectional pumping.
    Attached,
    /// The backend reported termination or the handshake broke.
    Failed { cause: String },
}

/// What the host must do next, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Apply terminal modes to the local emulator before anything else.
    SetModes(TerminalModes),
    /// Apply the full screen snapshot.
    ApplySnapshot(String),
    /// History was lost at the head; tell the user scrollback is not
    /// continuous.
    NoteBacklogTruncated,
    /// Replay byte-level output history verbatim.
    ReplayBacklog(Vec<u8>),
    /// Replay was unsafe; ask the program for a fresh full redraw.
    RequestRedraw,
    /// Forward these input bytes to the backend now.
    SendInput(Vec<u8>),
    /// Show these output bytes.
    Display(Vec<u8>),
    /// Surface a terminal-closed notice.
    SessionClosed { cause: String },
}

/// Per-session handshake, replay, and credit state.
#[derive(Debug)]
pub struct SessionBootstrap {
    terminal_id: String,
    workspace_name: String,
    phase: SessionPhase,
    bootstrap_handled: bool,
    modes: TerminalModes,
    next_offset: u64,
    /// `None` means the backend did not ask for flow control.
    credit: Option<u64>,
    /// Input sent before the bootstrap arrived; flushed on handshake.
    pending_input: VecDeque<Vec<u8>>,
    /// Input held back by exhausted credit, released FIFO.
    queued_input: VecDeque<Vec<u8>>,
    retry_policy: CreditRetryPolicy,
}

impl SessionBootstrap {
    pub fn new(
        terminal_id: impl Into<String>,
        workspace_name: impl Into<String>,
        retry_policy: CreditRetryPolicy,
    ) -> Self {
        Self {
            terminal_id: terminal_id.into(),
            workspace_name: workspace_name.into(),
            phase: SessionPhase::Requesting,
            bootstrap_handled: false,
            modes: TerminalModes::default(),
            next_offset: 0,
            credit: None,
            pending_input: VecDeque::new(),
            queued_input: VecDeque::new(),
            retry_policy,
        }
    }

    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn modes(&self) -> TerminalModes {
        self.modes
    }

    /// Byte offset for the next incremental read request.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub fn credit(&self) -> Option<u64> {
        self.credit
    }

    pub fn queued_input_len(&self) -> usize {
        self.queued_input.len()
    }

    /// Apply one bootstrap payload. Duplicate payloads (the session is
    /// already bootstrapped) and payloads addressed elsewhere produce
    /// no actions.
    pub fn handle_bootstrap(&mut self, payload: &BootstrapPayload) -> Vec<SessionAction> {
        if payload.terminal_id != self.terminal_id
            || (!payload.workspace_name.is_empty()
                && payload.workspace_name != self.workspace_name)
        {
            tracing::warn!(
                expected = %self.terminal_id,
                got = %payload.terminal_id,
                workspace = %payload.workspace_name,
                "dropping bootstrap addressed to a different session"
            );
            return Vec::new();
        }
        if self.bootstrap_handled {
            tracing::debug!(terminal_id = %self.terminal_id, "ignoring duplicate bootstrap");
            return Vec::new();
        }
        if let SessionPhase::Failed { cause } = &self.phase {
            tracing::warn!(
                terminal_id = %self.terminal_id,
                cause = %cause,
                "ignoring bootstrap for failed session"
            );
            return Vec::new();
        }

        self.bootstrap_handled = true;
        self.phase = SessionPhase::Bootstrapped;

        let mut actions = Vec::new();

        // Modes first: escape interpretation must match the remote
        // program before any replayed byte reaches the emulator.
        self.modes = TerminalModes::from_bootstrap(payload);
        actions.push(SessionAction::SetModes(self.modes));

        if let Some(offset) = payload.next_offset {
            self.next_offset = offset;
        }
        if self.credit.is_none() {
            // A preserved counter from a previous attach survives; a
            // fresh one takes the backend's seed.
            self.credit = payload.initial_credit;
        }

        if payload.safe_to_replay == Some(false) {
            actions.push(SessionAction::RequestRedraw);
        } else {
            if let Some(snapshot) = &payload.snapshot {
                actions.push(SessionAction::ApplySnapshot(snapshot.clone()));
            }
            if let Some(backlog) = &payload.backlog {
                if payload.backlog_truncated == Some(true) {
                    actions.push(SessionAction::NoteBacklogTruncated);
                }
                actions.push(SessionAction::ReplayBacklog(backlog.clone()));
            }
        }

        // Input queued before a failure predates anything pending, and
        // no acknowledgement will ever arrive for it; the fresh balance
        // is its only way out.
        actions.extend(self.release_queued_input());

        // Input typed while the handshake was in flight goes out now,
        // in arrival order, through the credit gate.
        let pending: Vec<Vec<u8>> = self.pending_input.drain(..).collect();
        for chunk in pending {
            actions.extend(self.gate_input(chunk));
        }

        actions
    }

    /// The host attached its I/O pumps after applying the bootstrap
    /// actions.
    pub fn mark_attached(&mut self) {
        match self.phase {
            SessionPhase::Bootstrapped => self.phase = SessionPhase::Attached,
            _ => tracing::warn!(
                terminal_id = %self.terminal_id,
                phase = ?self.phase,
                "mark_attached outside Bootstrapped"
            ),
        }
    }

    /// Submit input. Before the handshake completes the chunk is held;
    /// afterwards it passes the credit gate, which sends it now or
    /// queues it FIFO until credit arrives. Input is never dropped.
    pub fn send_input(&mut self, data: Vec<u8>) -> Vec<SessionAction> {
        match &self.phase {
            SessionPhase::Requesting => {
                self.pending_input.push_back(data);
                Vec::new()
            }
            SessionPhase::Failed { .. } => {
                // Held for the retry; a failed session may come back.
                self.pending_input.push_back(data);
                Vec::new()
            }
            SessionPhase::Bootstrapped | SessionPhase::Attached => self.gate_input(data),
        }
    }

    /// Credit consumption is atomic per chunk: a chunk larger than the
    /// remaining credit waits whole rather than splitting.
    fn gate_input(&mut self, data: Vec<u8>) -> Vec<SessionAction> {
        let Some(credit) = self.credit else {
            return vec![SessionAction::SendInput(data)];
        };
        let need = data.len() as u64;
        if self.queued_input.is_empty() && credit >= need {
            self.credit = Some(credit - need);
            vec![SessionAction::SendInput(data)]
        } else {
            self.queued_input.push_back(data);
            Vec::new()
        }
    }

    /// Backend acknowledgement: replenish credit and release queued
    /// input in FIFO order as far as the new balance allows.
    pub fn replenish_credit(&mut self, bytes: u64) -> Vec<SessionAction> {
        let Some(credit) = self.credit else {
            return Vec::new();
        };
        self.credit = Some(credit.saturating_add(bytes));
        self.release_queued_input()
    }

    /// Drain the queue FIFO against the current balance. Without a
    /// counter everything goes: the gate never queues in that state, so
    /// anything still held dates from before flow control went away.
    fn release_queued_input(&mut self) -> Vec<SessionAction> {
        let Some(mut credit) = self.credit else {
            return self
                .queued_input
                .drain(..)
                .map(SessionAction::SendInput)
                .collect();
        };
        let mut actions = Vec::new();
        while let Some(front) = self.queued_input.front() {
            let need = front.len() as u64;
            if credit < need {
                break;
            }
            credit -= need;
            let chunk = self
                .queued_input
                .pop_front()
                .unwrap_or_else(|| {
                    util::debug_panic!("queued input vanished during drain");
                    Vec::new()
                });
            actions.push(SessionAction::SendInput(chunk));
        }
        self.credit = Some(credit);
        actions
    }

    /// Raw output from the backend; advances the incremental-read
    /// offset and is displayed as-is.
    pub fn handle_output(&mut self, data: Vec<u8>) -> Option<SessionAction> {
        if matches!(self.phase, SessionPhase::Failed { .. }) {
            return None;
        }
        self.next_offset += data.len() as u64;
        Some(SessionAction::Display(data))
    }

    /// Backend reported termination.
    pub fn handle_exit(&mut self, cause: impl Into<String>) -> SessionAction {
        let cause = cause.into();
        self.phase = SessionPhase::Failed {
            cause: cause.clone(),
        };
        SessionAction::SessionClosed { cause }
    }

    /// Begin a fresh handshake after a failure. The credit counter
    /// follows the configured policy; held input always survives.
    pub fn retry(&mut self) {
        self.phase = SessionPhase::Requesting;
        self.bootstrap_handled = false;
        if self.retry_policy == CreditRetryPolicy::Reset {
            self.credit = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(terminal_id: &str) -> BootstrapPayload {
        BootstrapPayload {
            workspace_name: "ws".into(),
            terminal_id: terminal_id.into(),
            ..Default::default()
        }
    }

    fn machine() -> SessionBootstrap {
        SessionBootstrap::new("t1", "ws", CreditRetryPolicy::Reset)
    }

    #[test]
    fn bootstrap_applies_modes_before_replay() {
        let mut session = machine();
        let actions = session.handle_bootstrap(&BootstrapPayload {
            snapshot: Some("screen".into()),
            backlog: Some(b"history".to_vec()),
            mouse: Some(true),
            mouse_sgr: Some(true),
            alt_screen: Some(true),
            ..payload("t1")
        });

        assert!(matches!(&actions[0], SessionAction::SetModes(m) if m.alt_screen && m.mouse));
        assert_eq!(actions[1], SessionAction::ApplySnapshot("screen".into()));
        assert_eq!(actions[2], SessionAction::ReplayBacklog(b"history".to_vec()));
        assert_eq!(session.phase(), &SessionPhase::Bootstrapped);
    }

    #[test]
    fn empty_payload_still_bootstraps() {
        let mut session = machine();
        let actions = session.handle_bootstrap(&payload("t1"));
        // Just the (default) modes; nothing to replay is not an error.
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], SessionAction::SetModes(_)));
    }

    #[test]
    fn duplicate_bootstrap_is_ignored() {
        let mut session = machine();
        assert!(!session.handle_bootstrap(&payload("t1")).is_empty());
        assert!(session.handle_bootstrap(&payload("t1")).is_empty());

        session.mark_attached();
        assert!(session.handle_bootstrap(&payload("t1")).is_empty());
        assert_eq!(session.phase(), &SessionPhase::Attached);
    }

    #[test]
    fn bootstrap_for_other_session_is_dropped() {
        let mut session = machine();
        assert!(session.handle_bootstrap(&payload("other")).is_empty());
        assert_eq!(session.phase(), &SessionPhase::Requesting);

        let mut wrong_ws = payload("t1");
        wrong_ws.workspace_name = "elsewhere".into();
        assert!(session.handle_bootstrap(&wrong_ws).is_empty());
        assert_eq!(session.phase(), &SessionPhase::Requesting);
    }

    #[test]
    fn unsafe_replay_requests_redraw_instead() {
        let mut session = machine();
        let actions = session.handle_bootstrap(&BootstrapPayload {
            snapshot: Some("stale".into()),
            backlog: Some(b"stale".to_vec()),
            safe_to_replay: Some(false),
            ..payload("t1")
        });

        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], SessionAction::SetModes(_)));
        assert_eq!(actions[1], SessionAction::RequestRedraw);
        // Still counts as handled; a duplicate stays ignored.
        assert!(session.handle_bootstrap(&payload("t1")).is_empty());
    }

    #[test]
    fn truncated_backlog_is_flagged_before_replay() {
        let mut session = machine();
        let actions = session.handle_bootstrap(&BootstrapPayload {
            backlog: Some(b"tail".to_vec()),
            backlog_truncated: Some(true),
            next_offset: Some(4096),
            ..payload("t1")
        });

        assert_eq!(actions[1], SessionAction::NoteBacklogTruncated);
        assert_eq!(actions[2], SessionAction::ReplayBacklog(b"tail".to_vec()));
        assert_eq!(session.next_offset(), 4096);
    }

    #[test]
    fn credit_gates_input_per_whole_chunk() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(100),
            ..payload("t1")
        });
        session.mark_attached();

        let first = session.send_input(vec![b'a'; 40]);
        let second = session.send_input(vec![b'b'; 40]);
        let third = session.send_input(vec![b'c'; 40]);

        assert_eq!(first, vec![SessionAction::SendInput(vec![b'a'; 40])]);
        assert_eq!(second, vec![SessionAction::SendInput(vec![b'b'; 40])]);
        // 20 credits left cannot cover a 40-byte chunk.
        assert!(third.is_empty());
        assert_eq!(session.credit(), Some(20));
        assert_eq!(session.queued_input_len(), 1);

        let released = session.replenish_credit(40);
        assert_eq!(released, vec![SessionAction::SendInput(vec![b'c'; 40])]);
        assert_eq!(session.credit(), Some(20));
        assert_eq!(session.queued_input_len(), 0);
    }

    #[test]
    fn queued_input_releases_fifo() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(5),
            ..payload("t1")
        });

        assert!(session.send_input(b"123456".to_vec()).is_empty());
        assert!(session.send_input(b"ab".to_vec()).is_empty());

        // Enough for the first chunk only.
        let released = session.replenish_credit(1);
        assert_eq!(released, vec![SessionAction::SendInput(b"123456".to_vec())]);

        let released = session.replenish_credit(2);
        assert_eq!(released, vec![SessionAction::SendInput(b"ab".to_vec())]);
    }

    #[test]
    fn later_input_never_jumps_the_queue() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(10),
            ..payload("t1")
        });

        assert!(session.send_input(vec![b'x'; 20]).is_empty());
        // Small chunk would fit the remaining credit but must wait
        // behind the queued one.
        assert!(session.send_input(b"y".to_vec()).is_empty());

        let released = session.replenish_credit(10);
        assert_eq!(
            released,
            vec![
                SessionAction::SendInput(vec![b'x'; 20]),
                SessionAction::SendInput(b"y".to_vec()),
            ]
        );
    }

    #[test]
    fn no_credit_means_unlimited_sends() {
        let mut session = machine();
        session.handle_bootstrap(&payload("t1"));
        let actions = session.send_input(vec![b'z'; 100_000]);
        assert_eq!(actions.len(), 1);
        assert!(session.replenish_credit(10).is_empty());
    }

    #[test]
    fn input_before_bootstrap_flushes_in_order() {
        let mut session = machine();
        assert!(session.send_input(b"first".to_vec()).is_empty());
        assert!(session.send_input(b"second".to_vec()).is_empty());

        let actions = session.handle_bootstrap(&payload("t1"));
        let sends: Vec<&SessionAction> = actions
            .iter()
            .filter(|a| matches!(a, SessionAction::SendInput(_)))
            .collect();
        assert_eq!(
            sends,
            vec![
                &SessionAction::SendInput(b"first".to_vec()),
                &SessionAction::SendInput(b"second".to_vec()),
            ]
        );
    }

    #[test]
    fn pending_input_respects_seeded_credit() {
        let mut session = machine();
        session.send_input(vec![b'a'; 60]);
        session.send_input(vec![b'b'; 60]);

        let actions = session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(100),
            ..payload("t1")
        });
        let sends = actions
            .iter()
            .filter(|a| matches!(a, SessionAction::SendInput(_)))
            .count();
        assert_eq!(sends, 1);
        assert_eq!(session.queued_input_len(), 1);
    }

    #[test]
    fn output_advances_next_offset() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            next_offset: Some(100),
            ..payload("t1")
        });
        session.mark_attached();

        let action = session.handle_output(b"12345".to_vec());
        assert_eq!(action, Some(SessionAction::Display(b"12345".to_vec())));
        assert_eq!(session.next_offset(), 105);
    }

    #[test]
    fn exit_moves_to_failed_and_surfaces_cause() {
        let mut session = machine();
        session.handle_bootstrap(&payload("t1"));
        session.mark_attached();

        let action = session.handle_exit("shell exited");
        assert_eq!(
            action,
            SessionAction::SessionClosed {
                cause: "shell exited".into()
            }
        );
        assert!(session.handle_output(b"late".to_vec()).is_none());
        assert!(session.handle_bootstrap(&payload("t1")).is_empty());
    }

    #[test]
    fn retry_with_reset_policy_reseeds_credit() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(100),
            ..payload("t1")
        });
        session.mark_attached();
        session.send_input(vec![b'a'; 90]);
        // Over the remaining 10; queued when the session dies.
        assert!(session.send_input(vec![b'q'; 20]).is_empty());
        session.handle_exit("connection lost");

        session.retry();
        assert_eq!(session.phase(), &SessionPhase::Requesting);
        assert_eq!(session.credit(), None);

        let actions = session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(50),
            ..payload("t1")
        });
        // Fresh seed covers the queued chunk right away; no ack will
        // ever arrive for input the dead backend never received.
        assert!(actions.contains(&SessionAction::SendInput(vec![b'q'; 20])));
        assert_eq!(session.queued_input_len(), 0);
        // 50 seeded minus the 20 released.
        assert_eq!(session.credit(), Some(30));
    }

    #[test]
    fn queued_input_survives_retry_without_deadlock() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(10),
            ..payload("t1")
        });
        session.mark_attached();
        session.send_input(vec![b'a'; 10]);
        assert!(session.send_input(b"stuck".to_vec()).is_empty());
        session.handle_exit("connection lost");
        session.retry();

        let actions = session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(100),
            ..payload("t1")
        });
        assert!(actions.contains(&SessionAction::SendInput(b"stuck".to_vec())));
        assert_eq!(session.queued_input_len(), 0);

        // New input flows immediately instead of waiting behind a
        // chunk nothing will ever acknowledge.
        let next = session.send_input(b"after".to_vec());
        assert_eq!(next, vec![SessionAction::SendInput(b"after".to_vec())]);
    }

    #[test]
    fn retry_onto_uncontrolled_transport_releases_whole_queue() {
        let mut session = machine();
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(4),
            ..payload("t1")
        });
        session.mark_attached();
        session.send_input(vec![b'a'; 4]);
        assert!(session.send_input(b"one".to_vec()).is_empty());
        assert!(session.send_input(b"two".to_vec()).is_empty());
        session.handle_exit("connection lost");
        session.retry();

        // The new backend does no flow control at all.
        let actions = session.handle_bootstrap(&payload("t1"));
        let sends: Vec<&SessionAction> = actions
            .iter()
            .filter(|a| matches!(a, SessionAction::SendInput(_)))
            .collect();
        assert_eq!(
            sends,
            vec![
                &SessionAction::SendInput(b"one".to_vec()),
                &SessionAction::SendInput(b"two".to_vec()),
            ]
        );
        assert_eq!(session.credit(), None);
    }

    #[test]
    fn retry_with_preserve_policy_keeps_counter_and_queue() {
        let mut session = SessionBootstrap::new("t1", "ws", CreditRetryPolicy::Preserve);
        session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(10),
            ..payload("t1")
        });
        session.mark_attached();
        // Exhausts credit and queues one chunk.
        session.send_input(vec![b'a'; 10]);
        session.send_input(vec![b'b'; 10]);
        session.handle_exit("connection lost");
        session.retry();

        let actions = session.handle_bootstrap(&BootstrapPayload {
            initial_credit: Some(500),
            ..payload("t1")
        });
        // The preserved zero-balance counter ignores the new seed; the
        // queued chunk still waits for an acknowledgement.
        assert_eq!(session.credit(), Some(0));
        assert_eq!(session.queued_input_len(), 1);
        assert!(actions
            .iter()
            .all(|a| !matches!(a, SessionAction::SendInput(_))));

        let released = session.replenish_credit(10);
        assert_eq!(released, vec![SessionAction::SendInput(vec![b'b'; 10])]);
    }

    #[test]
    fn input_while_failed_is_held_for_retry() {
        let mut session = machine();
        session.handle_bootstrap(&payload("t1"));
        session.handle_exit("gone");
        assert!(session.send_input(b"echo hi\r".to_vec()).is_empty());

        session.retry();
        let actions = session.handle_bootstrap(&payload("t1"));
        assert!(actions.contains(&SessionAction::SendInput(b"echo hi\r".to_vec())));
    }
}
