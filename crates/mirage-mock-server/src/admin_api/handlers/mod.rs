//! Control API request handlers.

pub mod expectations;
pub mod system;
