//! Small helpers shared across the dev loop.

pub mod mime;
pub mod path;
pub mod plural;

pub use plural::plural_count;
