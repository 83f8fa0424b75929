//! Terminal color palette for workmux.
//!
//! Holds the colors terminal programs can query over OSC: foreground,
//! background, cursor, the 16 base ANSI slots, and an optional extended
//! palette for indices 16 and above. No rendering types here — just RGB
//! triples and hex parsing.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An 8-bit-per-channel RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` hex string. Returns `None` for anything else
    /// (short form, missing `#`, bad digits).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Format as `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::parse_hex(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid color {s:?}, expected #rrggbb")))
    }
}

/// The colors a terminal program can observe for one session surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TerminalColors {
    pub foreground: Rgb,
    pub background: Rgb,
    pub cursor: Rgb,
    /// The 16 base ANSI slots (normal 0-7, bright 8-15).
    pub ansi: [Rgb; 16],
    /// Palette entries for indices 16 and above, in index order.
    #[serde(default)]
    pub extended: Vec<Rgb>,
}

impl TerminalColors {
    /// Look up a palette color by absolute index: 0-15 hit the ANSI
    /// slots, 16 and above index into the extended palette.
    pub fn color_for_index(&self, index: usize) -> Option<Rgb> {
        if index < 16 {
            Some(self.ansi[index])
        } else {
            self.extended.get(index - 16).copied()
        }
    }
}

impl Default for TerminalColors {
    fn default() -> Self {
        Self {
            foreground: Rgb::new(0xc0, 0xc0, 0xc0),
            background: Rgb::new(0x00, 0x00, 0x00),
            cursor: Rgb::new(0xc0, 0xc0, 0xc0),
            ansi: DEFAULT_ANSI,
            extended: Vec::new(),
        }
    }
}

/// Stock xterm-style base palette used until a theme is loaded.
const DEFAULT_ANSI: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xcd, 0x00, 0x00),
    Rgb::new(0x00, 0xcd, 0x00),
    Rgb::new(0xcd, 0xcd, 0x00),
    Rgb::new(0x00, 0x00, 0xee),
    Rgb::new(0xcd, 0x00, 0xcd),
    Rgb::new(0x00, 0xcd, 0xcd),
    Rgb::new(0xe5, 0xe5, 0xe5),
    Rgb::new(0x7f, 0x7f, 0x7f),
    Rgb::new(0xff, 0x00, 0x00),
    Rgb::new(0x00, 0xff, 0x00),
    Rgb::new(0xff, 0xff, 0x00),
    Rgb::new(0x5c, 0x5c, 0xff),
    Rgb::new(0xff, 0x00, 0xff),
    Rgb::new(0x00, 0xff, 0xff),
    Rgb::new(0xff, 0xff, 0xff),
];
