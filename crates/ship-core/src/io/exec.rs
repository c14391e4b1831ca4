//! Build script execution.
//!
//! Scripts run with the package directory as working directory and their
//! combined output redirected to a log file. A script that outlives its
//! timeout gets SIGTERM, then SIGKILL once the grace period is over.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out after {} s", .0.as_secs())]
    TimedOut(Duration),
}

/// Runs a package's build script.
pub trait Executor: Send + Sync {
    /// Run `script` in `cwd`, appending its output to `log`. Returns the exit
    /// code; death by signal is reported as -1.
    fn run(&self, script: &Path, cwd: &Path, log: &Path) -> Result<i32, ExecError>;
}

/// [`Executor`] that spawns the script directly.
#[derive(Debug, Clone, Copy)]
pub struct ScriptExecutor {
    timeout: Duration,
    grace: Duration,
}

impl ScriptExecutor {
    pub fn new(timeout: Duration, grace: Duration) -> Self {
        Self { timeout, grace }
    }
}

impl Executor for ScriptExecutor {
    fn run(&self, script: &Path, cwd: &Path, log: &Path) -> Result<i32, ExecError> {
        if let Some(parent) = log.parent() {
            fs::create_dir_all(parent)?;
        }
        let log_file = File::create(log)?;
        // A relative script path would otherwise resolve against `cwd`.
        let script = std::path::absolute(script)?;

        debug!(script = %script.display(), cwd = %cwd.display(), "running build script");
        let mut child = Command::new(&script)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|source| ExecError::Spawn {
                script: script.display().to_string(),
                source,
            })?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => Ok(status.code().unwrap_or(-1)),
            None => {
                terminate(&mut child, self.grace)?;
                Err(ExecError::TimedOut(self.timeout))
            }
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
fn terminate(child: &mut Child, grace: Duration) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Ok(raw) = i32::try_from(child.id())
            && kill(Pid::from_raw(raw), Signal::SIGTERM).is_ok()
            && child.wait_timeout(grace)?.is_some()
        {
            return Ok(());
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    warn!(pid = child.id(), "build script ignored SIGTERM, killing");
    child.kill()?;
    child.wait()?;
    Ok(())
}

/// Read the last `n` lines of a log without loading all of it.
pub fn read_last_lines(path: &Path, n: usize) -> io::Result<String> {
    // Enough for a few hundred typical lines.
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let seek_pos = len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);
    let buffer: &str = &text;

    // Drop the partial first line when we seeked mid-file.
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(buffer, |idx| &buffer[idx + 1..])
    } else {
        buffer
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}
