//! DEC private mode tracking over the output stream.
//!
//! The daemon watches the bytes it forwards for `CSI ? Pm h/l`
//! sequences so a reattaching viewer can be told which screen and
//! mouse modes the running program has negotiated. Sequences split
//! across output chunks are carried between scans.

use terminal::{MouseEncoding, TerminalModes};

/// A partial escape longer than this is not a mode sequence we track.
const MAX_PENDING: usize = 32;

#[derive(Debug, Default)]
pub struct ModeTracker {
    alt_screen: bool,
    mouse_click: bool,
    mouse_drag: bool,
    mouse_any: bool,
    utf8_ext: bool,
    sgr_ext: bool,
    urxvt_ext: bool,
    /// Escape prefix held over from the previous chunk.
    pending: Vec<u8>,
}

impl ModeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one output chunk, updating mode state.
    pub fn scan(&mut self, data: &[u8]) {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(data);

        let mut i = 0;
        while i < buf.len() {
            if buf[i] != 0x1b {
                i += 1;
                continue;
            }
            match parse_private_mode(&buf[i..]) {
                ModeScan::Complete { len, params, set } => {
                    for param in params {
                        self.apply(param, set);
                    }
                    i += len;
                }
                ModeScan::Partial => {
                    let rest = &buf[i..];
                    if rest.len() <= MAX_PENDING {
                        self.pending = rest.to_vec();
                    }
                    return;
                }
                ModeScan::NotMode => i += 1,
            }
        }
    }

    fn apply(&mut self, param: u32, set: bool) {
        match param {
            47 | 1049 => self.alt_screen = set,
            1000 => self.mouse_click = set,
            1002 => self.mouse_drag = set,
            1003 => self.mouse_any = set,
            1005 => self.utf8_ext = set,
            1006 => self.sgr_ext = set,
            1015 => self.urxvt_ext = set,
            _ => {}
        }
    }

    pub fn alt_screen(&self) -> bool {
        self.alt_screen
    }

    /// Current modes as a viewer should adopt them. The encoding picks
    /// the highest-fidelity extension the program enabled, with legacy
    /// x10 as the floor.
    pub fn modes(&self) -> TerminalModes {
        let mouse = self.mouse_click || self.mouse_drag || self.mouse_any;
        let mouse_encoding = if self.sgr_ext {
            MouseEncoding::Sgr
        } else if self.urxvt_ext {
            MouseEncoding::Urxvt
        } else if self.utf8_ext {
            MouseEncoding::Utf8
        } else {
            MouseEncoding::X10
        };
        TerminalModes {
            alt_screen: self.alt_screen,
            mouse,
            mouse_sgr: self.sgr_ext,
            mouse_encoding,
        }
    }
}

enum ModeScan {
    Complete {
        len: usize,
        params: Vec<u32>,
        set: bool,
    },
    /// Runs off the end of the buffer.
    Partial,
    /// Some other escape; skip one byte and keep scanning.
    NotMode,
}

/// Parse `ESC [ ? Pm h/l` at the head of `bytes`.
fn parse_private_mode(bytes: &[u8]) -> ModeScan {
    for (i, &expected) in b"\x1b[?".iter().enumerate() {
        match bytes.get(i) {
            None => return ModeScan::Partial,
            Some(&b) if b == expected => {}
            Some(_) => return ModeScan::NotMode,
        }
    }
    let mut params = Vec::new();
    let mut current: Option<u32> = None;
    let mut i = 3;
    loop {
        if i > MAX_PENDING {
            return ModeScan::NotMode;
        }
        match bytes.get(i) {
            None => return ModeScan::Partial,
            Some(d @ b'0'..=b'9') => {
                let digit = u32::from(d - b'0');
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            }
            Some(b';') => {
                params.extend(current.take());
            }
            Some(b'h') | Some(b'l') => {
                params.extend(current.take());
                return ModeScan::Complete {
                    len: i + 1,
                    params,
                    set: bytes[i] == b'h',
                };
            }
            Some(_) => return ModeScan::NotMode,
        }
        i += 1;
    }
}
