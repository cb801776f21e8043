//! Output formatting module
//!
//! Renders run outcomes and test listings for the terminal.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
