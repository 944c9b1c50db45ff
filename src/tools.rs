use crate::error::{Result, ResignError};
use log::trace;
use std::ffi::OsString;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run an external tool to completion, capturing stdout and stderr.
///
/// The child is killed once `timeout` elapses and the call fails with
/// [`ResignError::ToolTimeout`]. A non-zero exit status is not an error here,
/// callers decide what a failed status means.
pub fn run<I, A>(program: &str, args: I, timeout: Duration) -> Result<Output>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    trace!("running {} {:?}", program, args);

    let handle = duct::cmd(program, &args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()
        .map_err(|e| ResignError::ExternalToolFailure {
            tool: program.to_string(),
            diagnostics: e.to_string(),
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(output) = handle.try_wait()? {
            return Ok(output.clone());
        }
        if Instant::now() >= deadline {
            let _ = handle.kill();
            return Err(ResignError::ToolTimeout {
                tool: program.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Like [`run`], but a non-zero exit status becomes an
/// [`ResignError::ExternalToolFailure`] carrying the tool's diagnostics.
pub fn run_checked<I, A>(program: &str, args: I, timeout: Duration) -> Result<Output>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString>,
{
    let output = run(program, args, timeout)?;
    if !output.status.success() {
        return Err(ResignError::ExternalToolFailure {
            tool: program.to_string(),
            diagnostics: diagnostics(&output),
        });
    }
    Ok(output)
}

/// Human readable diagnostics of a finished tool: stderr, or stdout when stderr is empty.
pub fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}
