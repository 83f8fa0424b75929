//! Mouse report encoding.
//!
//! Terminal programs opt into one of four mouse-reporting formats via
//! DECSET; the active format decides how a host mouse event is put on
//! the wire. Encoding is pure and stateless — callers pass the format
//! the remote program negotiated.

use serde::{Deserialize, Serialize};

/// The four mouse-reporting wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseEncoding {
    /// `ESC [ < b ; c ; r M` — decimal fields, no coordinate limit.
    Sgr,
    /// `ESC [ b ; c ; r M` — decimal fields, no `<` introducer.
    Urxvt,
    /// `ESC [ M` then three code points offset by 32, UTF-8 encoded.
    Utf8,
    /// `ESC [ M` then three raw bytes; coordinates clamped to [1, 223].
    #[default]
    X10,
}

/// Encode one mouse event for the given format.
///
/// `button` carries the full xterm button/modifier bitmask; `col` and
/// `row` are 1-based cell coordinates.
pub fn encode_mouse(button: u32, col: u32, row: u32, encoding: MouseEncoding) -> Vec<u8> {
    match encoding {
        MouseEncoding::Sgr => format!("\x1b[<{button};{col};{row}M").into_bytes(),
        MouseEncoding::Urxvt => format!("\x1b[{button};{col};{row}M").into_bytes(),
        MouseEncoding::Utf8 => {
            let mut out = b"\x1b[M".to_vec();
            push_code_point(&mut out, button + 32);
            push_code_point(&mut out, col + 32);
            push_code_point(&mut out, row + 32);
            out
        }
        MouseEncoding::X10 => {
            // The legacy protocol has one byte per field: coordinates
            // whose encoded byte would pass 255 are pinned to 223, the
            // button is passed through untouched.
            let clamp = |v: u32| v.clamp(1, 223) as u8;
            vec![
                0x1b,
                b'[',
                b'M',
                (button + 32) as u8,
                clamp(col).wrapping_add(32),
                clamp(row).wrapping_add(32),
            ]
        }
    }
}

/// Append one Unicode scalar, UTF-8 encoded. The utf8 mouse format is
/// defined over code points, so values past 127 become multi-byte.
fn push_code_point(out: &mut Vec<u8>, value: u32) {
    match char::from_u32(value) {
        Some(c) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        None => {
            // Only reachable for surrogate-range values, which no real
            // mouse event produces.
            util::debug_panic!("mouse field {value:#x} is not a Unicode scalar");
            out.push(b' ');
        }
    }
}
