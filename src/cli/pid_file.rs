//! PID file management for daemon mode

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use nix::sys::signal::kill;
use nix::unistd::Pid;

use super::ipc::runtime_dir;

/// PID file name inside the runtime directory
const PID_FILE_NAME: &str = "micpulse.pid";

/// PID file for daemon mode
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// PID file in `$XDG_RUNTIME_DIR`, or the temp dir without one
    pub fn new() -> Self {
        Self {
            path: runtime_dir().join(PID_FILE_NAME),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the PID file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of a live daemon holding the file, if any. Stale files are removed.
    pub fn is_running(&self) -> Option<u32> {
        let mut contents = String::new();
        File::open(&self.path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .ok()?;
        let pid: u32 = contents.trim().parse().ok()?;

        // Signal 0 probes for existence without delivering anything
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Some(pid),
            Err(nix::errno::Errno::ESRCH) => {
                let _ = fs::remove_file(&self.path);
                None
            }
            // EPERM: alive but owned by someone else
            Err(nix::errno::Errno::EPERM) => Some(pid),
            Err(_) => None,
        }
    }

    /// Acquire the PID file (fails if another daemon is running)
    pub fn acquire(&self) -> Result<(), PidFileError> {
        if let Some(pid) = self.is_running() {
            return Err(PidFileError::AlreadyRunning(pid));
        }

        let mut file = File::create(&self.path)
            .map_err(|e| PidFileError::WriteFailed(format!("Failed to create PID file: {}", e)))?;
        write!(file, "{}", process::id())
            .map_err(|e| PidFileError::WriteFailed(format!("Failed to write PID: {}", e)))?;

        Ok(())
    }

    /// Release the PID file if it still holds our PID
    pub fn release(&self) -> Result<(), PidFileError> {
        let ours = fs::read_to_string(&self.path)
            .map(|contents| contents.trim() == process::id().to_string())
            .unwrap_or(false);
        if ours {
            fs::remove_file(&self.path).map_err(|e| {
                PidFileError::RemoveFailed(format!("Failed to remove PID file: {}", e))
            })?;
        }
        Ok(())
    }
}

impl Default for PidFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// PID file errors
#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    #[error("Another daemon is already running (PID: {0})")]
    AlreadyRunning(u32),

    #[error("Failed to write PID file: {0}")]
    WriteFailed(String),

    #[error("Failed to remove PID file: {0}")]
    RemoveFailed(String),
}
