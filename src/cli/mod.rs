//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! the foreground runners and the daemon with its socket protocol.

pub mod app;
pub mod args;
pub mod config_cmd;
#[cfg(unix)]
pub mod daemon_app;
#[cfg(unix)]
pub mod daemon_cmd;
pub mod devices_cmd;
#[cfg(unix)]
pub mod ipc;
#[cfg(unix)]
pub mod pid_file;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{run_meter, run_record, RecordOptions, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction};
#[cfg(unix)]
pub use daemon_app::run_daemon;
pub use presenter::Presenter;
