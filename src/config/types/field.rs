use owo_colors::OwoColorize;
use std::fmt;

/// Dotted `section.key` of a config value, as written in `devloop.toml`.
///
/// Section structs expose one constant per key that validation can
/// complain about, e.g. `AppConfig::PORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(&'static str);

impl FieldPath {
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.cyan())
    }
}
