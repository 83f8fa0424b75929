//! Mouse echo suppression.
//!
//! After certain local mouse actions the backend PTY briefly echoes a
//! matching SGR mouse report back into the output stream, which would
//! render as garbage. The guard keeps a short per-terminal suppression
//! deadline and a trailing-bytes buffer so reports split across output
//! chunks are still recognized.

use collections::FxHashMap;
use settings::constants::echo::{SUPPRESS_WINDOW, TAIL_MAX_BYTES};
use std::time::{Duration, Instant};

/// SGR mouse reports open with this introducer.
const SGR_INTRODUCER: &[u8] = b"\x1b[<";

/// Longest plausible report body after the introducer
/// (`255;9999;9999M` and change); anything longer is not a report.
const MAX_REPORT_BODY: usize = 16;

/// Per-terminal suppression and tail state. Absence of an id means "no
/// suppression, empty tail" — never an error.
#[derive(Debug, Default)]
pub struct MouseEchoGuard {
    suppress_until: FxHashMap<String, Instant>,
    tails: FxHashMap<String, Vec<u8>>,
}

impl MouseEchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen this terminal's output for mouse echoes until
    /// `duration` from now.
    pub fn note_suppress(&mut self, terminal_id: &str, duration: Duration) {
        self.suppress_until
            .insert(terminal_id.to_string(), Instant::now() + duration);
    }

    /// [`Self::note_suppress`] with the standard
    /// [`SUPPRESS_WINDOW`], which covers a PTY echo round trip.
    pub fn note_suppress_default(&mut self, terminal_id: &str) {
        self.note_suppress(terminal_id, SUPPRESS_WINDOW);
    }

    /// True only while the window is open AND the data carries an SGR
    /// mouse introducer. Ordinary text is never suppressed.
    pub fn should_suppress_input(&self, terminal_id: &str, data: &[u8]) -> bool {
        self.should_suppress_at(terminal_id, data, Instant::now())
    }

    fn should_suppress_at(&self, terminal_id: &str, data: &[u8], now: Instant) -> bool {
        let Some(deadline) = self.suppress_until.get(terminal_id) else {
            return false;
        };
        now < *deadline && contains_sgr_introducer(data)
    }

    /// Trailing bytes carried from the previous output chunk.
    pub fn tail(&self, terminal_id: &str) -> &[u8] {
        self.tails.get(terminal_id).map_or(&[], Vec::as_slice)
    }

    /// Remember up to [`TAIL_MAX_BYTES`] trailing bytes of a chunk.
    pub fn set_tail(&mut self, terminal_id: &str, data: &[u8]) {
        let keep = &data[data.len().saturating_sub(TAIL_MAX_BYTES)..];
        self.tails.insert(terminal_id.to_string(), keep.to_vec());
    }

    pub fn clear_suppression(&mut self, terminal_id: &str) {
        self.suppress_until.remove(terminal_id);
    }

    pub fn clear_tail(&mut self, terminal_id: &str) {
        self.tails.remove(terminal_id);
    }
}

/// Whether the data contains `ESC [ <` anywhere.
pub fn contains_sgr_introducer(data: &[u8]) -> bool {
    data.windows(SGR_INTRODUCER.len())
        .any(|w| w == SGR_INTRODUCER)
}

enum SgrScan {
    /// A complete report of this many bytes starts here.
    Complete(usize),
    /// A report prefix runs off the end of the buffer.
    Partial,
    /// Not a mouse report.
    NotReport,
}

fn classify_sgr_report(bytes: &[u8]) -> SgrScan {
    for (i, &expected) in SGR_INTRODUCER.iter().enumerate() {
        match bytes.get(i) {
            None => return SgrScan::Partial,
            Some(&b) if b == expected => {}
            Some(_) => return SgrScan::NotReport,
        }
    }
    let mut i = SGR_INTRODUCER.len();
    loop {
        match bytes.get(i) {
            None => {
                return if i <= SGR_INTRODUCER.len() + MAX_REPORT_BODY {
                    SgrScan::Partial
                } else {
                    SgrScan::NotReport
                }
            }
            Some(b'0'..=b'9') | Some(b';') => i += 1,
            Some(b'M') | Some(b'm') => return SgrScan::Complete(i + 1),
            Some(_) => return SgrScan::NotReport,
        }
        if i > SGR_INTRODUCER.len() + MAX_REPORT_BODY {
            return SgrScan::NotReport;
        }
    }
}

/// Strip SGR mouse reports from input headed for a program that has not
/// enabled mouse reporting, carrying a split report across chunk
/// boundaries via `tail`. When reporting is active everything passes
/// through, including any held tail.
pub fn filter_mouse_reports(data: &[u8], mouse_active: bool, tail: &mut Vec<u8>) -> Vec<u8> {
    let mut buf = std::mem::take(tail);
    buf.extend_from_slice(data);
    if mouse_active {
        return buf;
    }

    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        if buf[i] != 0x1b {
            out.push(buf[i]);
            i += 1;
            continue;
        }
        match classify_sgr_report(&buf[i..]) {
            SgrScan::Complete(len) => i += len,
            SgrScan::Partial => {
                let rest = &buf[i..];
                if rest.len() <= TAIL_MAX_BYTES {
                    *tail = rest.to_vec();
                } else {
                    out.extend_from_slice(rest);
                }
                return out;
            }
            SgrScan::NotReport => {
                out.push(buf[i]);
                i += 1;
            }
        }
    }
    out
}
