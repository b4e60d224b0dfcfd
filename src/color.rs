use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Linear RGB color stored as floats in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses a loose color value: `#rgb`, `#rrggbb`, or a name known to the
    /// supplied table.
    pub fn parse(value: &str, names: &ColorNames) -> EngineResult<Self> {
        let trimmed = value.trim();
        let resolved = names.resolve(trimmed).unwrap_or(trimmed);
        Self::parse_hex(resolved).ok_or_else(|| EngineError::InvalidColor(value.to_string()))
    }

    fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#')?;
        let (r, g, b) = match digits.len() {
            3 => {
                let mut nibbles = digits.chars().map(|c| c.to_digit(16));
                let r = nibbles.next()??;
                let g = nibbles.next()??;
                let b = nibbles.next()??;
                (r * 17, g * 17, b * 17)
            }
            6 => {
                let r = u32::from_str_radix(&digits[0..2], 16).ok()?;
                let g = u32::from_str_radix(&digits[2..4], 16).ok()?;
                let b = u32::from_str_radix(&digits[4..6], 16).ok()?;
                (r, g, b)
            }
            _ => return None,
        };
        Some(Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0))
    }

    /// Canonical lowercase `#rrggbb` form. `parse` of the result is stable.
    pub fn to_hex(self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Host-injectable name-to-hex table. The table contents are the host's
/// business; the engine only consults it before falling back to hex parsing.
#[derive(Debug, Clone, Default)]
pub struct ColorNames {
    entries: HashMap<String, String>,
}

impl ColorNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, hex: impl Into<String>) {
        self.entries.insert(name.into().to_ascii_lowercase(), hex.into());
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        let names = ColorNames::new();
        let long = Color::parse("#1a2b3c", &names).unwrap();
        assert_eq!(long.to_hex(), "#1a2b3c");
        let short = Color::parse("#f00", &names).unwrap();
        assert_eq!(short.to_hex(), "#ff0000");
    }

    #[test]
    fn resolves_names_through_the_table() {
        let mut names = ColorNames::new();
        names.insert("verde", "#00ff00");
        let color = Color::parse("Verde", &names).unwrap();
        assert_eq!(color.to_hex(), "#00ff00");
    }

    #[test]
    fn rejects_garbage() {
        let names = ColorNames::new();
        assert!(Color::parse("not-a-color", &names).is_err());
        assert!(Color::parse("#12345", &names).is_err());
    }
}
