//! Gesture path: ordered glyphs behind an optional zone prefix.

use std::fmt;
use std::str::FromStr;

use super::glyph::{Glyph, ZonePrefix};

/// Errors from parsing a legacy path string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty gesture path")]
    Empty,
    #[error("unknown glyph {0:?} at position {1}")]
    UnknownGlyph(char, usize),
}

/// One gesture's symbolic path.
///
/// The prefix is write-once: [`GesturePath::assign_prefix`] refuses to
/// overwrite it. Appends only ever touch the glyph list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GesturePath {
    prefix: Option<ZonePrefix>,
    glyphs: Vec<Glyph>,
}

impl GesturePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: ZonePrefix) -> Self {
        Self {
            prefix: Some(prefix),
            glyphs: Vec::new(),
        }
    }

    /// Set the zone prefix if none is present yet.
    ///
    /// Returns `false` (and leaves the path untouched) if a prefix was
    /// already assigned.
    pub fn assign_prefix(&mut self, prefix: ZonePrefix) -> bool {
        if self.prefix.is_some() {
            return false;
        }
        self.prefix = Some(prefix);
        true
    }

    pub fn prefix(&self) -> Option<ZonePrefix> {
        self.prefix
    }

    #[allow(dead_code)]
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn push(&mut self, glyph: Glyph) {
        self.glyphs.push(glyph);
    }

    pub fn last(&self) -> Option<Glyph> {
        self.glyphs.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn contains(&self, glyph: Glyph) -> bool {
        self.glyphs.contains(&glyph)
    }

    /// Whether the last glyph is a start glyph still waiting for release.
    pub fn awaits_release(&self) -> bool {
        self.last().is_some_and(Glyph::awaits_release)
    }

    /// The same glyphs without the zone prefix.
    pub fn stripped(&self) -> GesturePath {
        GesturePath {
            prefix: None,
            glyphs: self.glyphs.clone(),
        }
    }

    /// The same glyphs under a different prefix.
    pub fn reprefixed(&self, prefix: ZonePrefix) -> GesturePath {
        GesturePath {
            prefix: Some(prefix),
            glyphs: self.glyphs.clone(),
        }
    }
}

impl fmt::Display for GesturePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix {
            write!(f, "{}", prefix.symbol())?;
        }
        for glyph in &self.glyphs {
            write!(f, "{}", glyph.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for GesturePath {
    type Err = PathError;

    /// Parse a legacy symbol string such as `V●○` or `→←`.
    ///
    /// A bare prefix (`X`) is accepted; an empty string is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars().peekable();
        let mut path = GesturePath::new();

        if let Some(prefix) = chars.peek().copied().and_then(ZonePrefix::from_symbol) {
            path.prefix = Some(prefix);
            chars.next();
        }

        let offset = usize::from(path.prefix.is_some());
        for (i, c) in chars.enumerate() {
            let glyph = Glyph::from_symbol(c).ok_or(PathError::UnknownGlyph(c, i + offset))?;
            path.glyphs.push(glyph);
        }

        if path.prefix.is_none() && path.glyphs.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(path)
    }
}
