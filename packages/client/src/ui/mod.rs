//! Console front end of the `lounge-client` binary.

mod console;
mod formatter;
mod runner;

pub use console::ConsoleCommand;
pub use formatter::NoticeFormatter;
pub use runner::{ConsoleOptions, run_console};
