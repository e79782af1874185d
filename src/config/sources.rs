//! Config sources, lowest precedence first.

pub mod environment;
pub mod global_file;
