//! # Subprocess Progress Supervisor
//!
//! Spawns the search command with stdout redirected into the output file and
//! polls it to completion. Each tick samples the growing output file for an
//! approximate match count, emits one progress event and sleeps one poll
//! interval. The loop exits exactly when the child's exit status becomes
//! available; no events are emitted after exit.
//!
//! Progress is necessarily approximate: the wrapped matcher has no streaming
//! progress API, so line-counting the concurrently-written output file is
//! the best signal available. The poll interval trades responsiveness
//! against the cost of repeated line counts on large output files.

use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::progress::{Clock, ProgressReporter, ProgressSample};
use crate::util::count_file_lines;

/// Default pause between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("search cancelled")]
    Cancelled,
    #[error("search exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
    #[error("empty argv")]
    EmptyArgv,
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub poll_interval: Duration,
    /// Upper bound on one supervised search. `None` runs to completion.
    pub deadline: Option<Duration>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Run `argv` with stdout redirected to `output_path`, polling to completion.
///
/// The output file is opened in truncate/write mode and owned exclusively by
/// the child for the duration of the run; the supervisor only samples it
/// read-only. The cancel flag is observed once per tick.
pub fn supervise(
    argv: &[String],
    output_path: &Path,
    reporter: &dyn ProgressReporter,
    cancel: &AtomicBool,
    clock: &dyn Clock,
    options: &SupervisorOptions,
) -> Result<ExitStatus, SupervisorError> {
    let (program, args) = argv.split_first().ok_or(SupervisorError::EmptyArgv)?;
    let stdout = File::create(output_path)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            program: program.clone(),
            source,
        })?;

    let start = clock.now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        let elapsed = clock.now().duration_since(start);

        if cancel.load(Ordering::Relaxed) {
            kill_child(&mut child);
            return Err(SupervisorError::Cancelled);
        }
        if let Some(deadline) = options.deadline {
            if elapsed > deadline {
                kill_child(&mut child);
                return Err(SupervisorError::DeadlineExceeded(deadline));
            }
        }

        let matches = count_file_lines(output_path)?;
        reporter.on_progress(&ProgressSample::new(matches, elapsed));

        clock.sleep(options.poll_interval);
    };

    match status.code() {
        // grep: 0 matches found, 1 no matches. Anything else is trouble.
        Some(0) | Some(1) => {
            debug!("search finished with status {status}");
        }
        _ => {
            warn!("search exited abnormally: {status}");
        }
    }
    Ok(status)
}

fn kill_child(child: &mut std::process::Child) {
    if let Err(err) = child.kill() {
        warn!("failed to kill child process: {err}");
    }
    let _ = child.wait();
}
