//! Shared rendering helpers used by multiple screens.

pub mod duration_fmt;

pub use duration_fmt::format_dwell;
