//! Path glyphs and zone prefixes.
//!
//! Glyphs are typed internally and only rendered to their legacy
//! symbols when a path is looked up in the action table, so user
//! tables written against the symbol strings keep working.

use std::fmt;

/// Cardinal swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Resolve the dominant direction of a displacement.
    ///
    /// Horizontal wins only when `dx²` exceeds `1.42 × dy²`; equal
    /// weights resolve vertical.
    pub fn from_displacement(dx: f64, dy: f64) -> Self {
        if dx * dx > HORIZONTAL_BIAS * dy * dy {
            if dx > 0.0 { Self::Right } else { Self::Left }
        } else if dy > 0.0 {
            Self::Down
        } else {
            Self::Up
        }
    }
}

/// Multiplier applied to the vertical weight when picking a direction.
pub const HORIZONTAL_BIAS: f64 = 1.42;

/// One symbolic step of a gesture path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    Swipe(Direction),
    Tap,
    LongPressStart,
    LongPressStop,
    SlideStart,
    SlideStop,
}

impl Glyph {
    pub fn symbol(self) -> char {
        match self {
            Glyph::Swipe(Direction::Up) => '↑',
            Glyph::Swipe(Direction::Down) => '↓',
            Glyph::Swipe(Direction::Left) => '←',
            Glyph::Swipe(Direction::Right) => '→',
            Glyph::Tap => '◆',
            Glyph::LongPressStart => '●',
            Glyph::LongPressStop => '○',
            Glyph::SlideStart => '▶',
            Glyph::SlideStop => '▷',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        Some(match c {
            '↑' => Glyph::Swipe(Direction::Up),
            '↓' => Glyph::Swipe(Direction::Down),
            '←' => Glyph::Swipe(Direction::Left),
            '→' => Glyph::Swipe(Direction::Right),
            '◆' => Glyph::Tap,
            '●' => Glyph::LongPressStart,
            '○' => Glyph::LongPressStop,
            '▶' => Glyph::SlideStart,
            '▷' => Glyph::SlideStop,
            _ => return None,
        })
    }

    /// Whether this glyph leaves the gesture waiting for a release.
    pub fn awaits_release(self) -> bool {
        matches!(self, Glyph::LongPressStart | Glyph::SlideStart)
    }

    /// The glyph appended at release to close an open start glyph.
    pub fn release_pair(self) -> Option<Glyph> {
        match self {
            Glyph::LongPressStart => Some(Glyph::LongPressStop),
            Glyph::SlideStart => Some(Glyph::SlideStop),
            _ => None,
        }
    }
}

impl fmt::Display for Glyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Starting-context classification placed at position 0 of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZonePrefix {
    Text,
    Image,
    Video,
    /// More than one simultaneous contact.
    Interrupt,
}

impl ZonePrefix {
    pub fn symbol(self) -> char {
        match self {
            ZonePrefix::Text => 'T',
            ZonePrefix::Image => 'I',
            ZonePrefix::Video => 'V',
            ZonePrefix::Interrupt => 'X',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            'T' => Some(ZonePrefix::Text),
            'I' => Some(ZonePrefix::Image),
            'V' => Some(ZonePrefix::Video),
            'X' => Some(ZonePrefix::Interrupt),
            _ => None,
        }
    }
}
