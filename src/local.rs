//! Run a job script on this machine instead of the cluster, handy for trying a script out
use std::io::Write;
use std::process::{Command, Output, Stdio};

use log::info;

use crate::error::{Error, Result};

/// Write `script` to a temporary `.py` file and run it with `interpreter`
///
/// With `capture_output` the child's stdout and stderr are collected and echoed once it exits,
/// otherwise they go straight to this process's terminal. A non-zero exit is an error.
pub fn run_local(script: &str, interpreter: &str, capture_output: bool) -> Result<Output> {
    let mut file = tempfile::Builder::new().suffix(".py").tempfile()?;
    file.write_all(script.as_bytes())?;
    file.flush()?;

    let mut command = Command::new(interpreter);
    let cmd = command.arg(file.path());
    if !capture_output {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    info!("{:?}", &cmd);
    let output = cmd
        .output()
        .map_err(|source| Error::Transport { program: interpreter.to_string(), source })?;

    if capture_output {
        print!("{}", String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            eprint!("{}", String::from_utf8_lossy(&output.stderr));
        }
    }

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program: interpreter.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output() {
        let output = run_local("echo hi\n", "sh", true).unwrap();
        assert_eq!(output.stdout, b"hi\n");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let err = run_local("echo broken >&2\nexit 3\n", "sh", true).unwrap_err();
        match err {
            Error::CommandFailed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_interpreter() {
        let err = run_local("pass", "/nonexistent/interpreter", false).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
