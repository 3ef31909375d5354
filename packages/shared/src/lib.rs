//! Utilities shared by the Lounge client library and its binaries.

pub mod logger;
pub mod time;
