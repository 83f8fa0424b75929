//! OSC color query responses.
//!
//! Programs probe the palette with OSC 4 (indexed colors) and OSC
//! 10/11/12 (foreground/background/cursor). Replies read the active
//! theme and go back over the same channel the query arrived on.

use theme::{Rgb, TerminalColors};

/// Sent in the color-spec slot to ask for a color instead of setting
/// one.
const QUERY_MARKER: &str = "?";

/// Answers OSC 4/10/11/12 queries against a theme.
#[derive(Debug, Clone)]
pub struct OscQueryResponder {
    colors: TerminalColors,
}

impl OscQueryResponder {
    pub fn new(colors: TerminalColors) -> Self {
        Self { colors }
    }

    /// Swap in a new theme; later queries answer from it.
    pub fn set_colors(&mut self, colors: TerminalColors) {
        self.colors = colors;
    }

    /// Handle one OSC query. Replies are appended to `replies` in the
    /// order they must be written to the program. Returns whether the
    /// code was recognized — receipt of a known OSC is acknowledged
    /// even when no individual index could be resolved.
    pub fn handle_query(&self, code: u16, payload: &str, replies: &mut Vec<Vec<u8>>) -> bool {
        match code {
            4 => {
                self.handle_palette_query(payload, replies);
                true
            }
            10 => {
                replies.push(color_reply(10, self.colors.foreground));
                true
            }
            11 => {
                replies.push(color_reply(11, self.colors.background));
                true
            }
            12 => {
                replies.push(color_reply(12, self.colors.cursor));
                true
            }
            _ => false,
        }
    }

    /// OSC 4 payloads alternate `index ; spec`. Pairs whose spec is not
    /// the query marker are set requests and ignored here; indices with
    /// no palette entry are silently skipped.
    fn handle_palette_query(&self, payload: &str, replies: &mut Vec<Vec<u8>>) {
        let mut tokens = payload.split(';');
        while let (Some(index), Some(spec)) = (tokens.next(), tokens.next()) {
            if spec != QUERY_MARKER {
                continue;
            }
            let Ok(index) = index.trim().parse::<usize>() else {
                continue;
            };
            if let Some(color) = self.colors.color_for_index(index) {
                replies.push(palette_reply(index, color));
            }
        }
    }
}

fn color_reply(code: u16, color: Rgb) -> Vec<u8> {
    format!(
        "\x1b]{code};rgb:{:02x}/{:02x}/{:02x}\x07",
        color.r, color.g, color.b
    )
    .into_bytes()
}

fn palette_reply(index: usize, color: Rgb) -> Vec<u8> {
    format!(
        "\x1b]4;{index};rgb:{:02x}/{:02x}/{:02x}\x07",
        color.r, color.g, color.b
    )
    .into_bytes()
}
