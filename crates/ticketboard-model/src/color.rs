//! Ticket colors
//!
//! A ticket is painted either with a token from the fixed palette or with a
//! custom `#rrggbb` triplet. Both serialize as a plain string.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed palette tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteColor {
    Red,
    Orange,
    #[default]
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
    Gray,
}

impl PaletteColor {
    /// Every palette token, in picker order
    pub const ALL: [PaletteColor; 9] = [
        PaletteColor::Red,
        PaletteColor::Orange,
        PaletteColor::Yellow,
        PaletteColor::Green,
        PaletteColor::Teal,
        PaletteColor::Blue,
        PaletteColor::Purple,
        PaletteColor::Pink,
        PaletteColor::Gray,
    ];

    /// Token as stored
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            PaletteColor::Red => "red",
            PaletteColor::Orange => "orange",
            PaletteColor::Yellow => "yellow",
            PaletteColor::Green => "green",
            PaletteColor::Teal => "teal",
            PaletteColor::Blue => "blue",
            PaletteColor::Purple => "purple",
            PaletteColor::Pink => "pink",
            PaletteColor::Gray => "gray",
        }
    }
}

impl FromStr for PaletteColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaletteColor::ALL
            .into_iter()
            .find(|p| p.token() == s)
            .ok_or_else(|| ValidationError::InvalidColor(s.to_string()))
    }
}

/// Custom `#rrggbb` color, stored lowercase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor([u8; 3]);

impl HexColor {
    /// Build from channel values
    #[inline]
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Channel values
    #[inline]
    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        (self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for HexColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidColor(s.to_string());
        let digits = s.strip_prefix('#').ok_or_else(invalid)?;
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(rgb))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// Color of a ticket card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TicketColor {
    /// Palette token
    Palette(PaletteColor),
    /// Custom triplet
    Custom(HexColor),
}

impl Default for TicketColor {
    fn default() -> Self {
        TicketColor::Palette(PaletteColor::default())
    }
}

impl FromStr for TicketColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('#') {
            s.parse().map(TicketColor::Custom)
        } else {
            s.parse().map(TicketColor::Palette)
        }
    }
}

impl TryFrom<String> for TicketColor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TicketColor> for String {
    fn from(value: TicketColor) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TicketColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketColor::Palette(p) => f.write_str(p.token()),
            TicketColor::Custom(hex) => hex.fmt(f),
        }
    }
}

impl From<PaletteColor> for TicketColor {
    fn from(value: PaletteColor) -> Self {
        TicketColor::Palette(value)
    }
}

impl From<HexColor> for TicketColor {
    fn from(value: HexColor) -> Self {
        TicketColor::Custom(value)
    }
}
