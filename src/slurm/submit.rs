use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use log::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::slurm::script::RenderedJob;

/// Raw sbatch output, interpreted by [`crate::slurm::job_id::extract`]
#[derive(Debug, Clone, Default)]
pub struct SubmitOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Gets a rendered job to sbatch
///
/// Implementations block until sbatch (or the session running it) exits. A transport only fails
/// if it couldn't talk to sbatch at all, deciding whether the submission worked is left to the
/// caller.
pub trait Transport {
    fn submit(&self, job: &RenderedJob) -> Result<SubmitOutput>;
}

/// Runs sbatch as a child process, or inside an ssh session when the job names a remote host
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    sbatch: String,
    ssh: String,
}

impl ProcessTransport {
    pub fn new(config: &Config) -> ProcessTransport {
        ProcessTransport { sbatch: config.sbatch.clone(), ssh: config.ssh.clone() }
    }

    /// Pipe the wrapper into a local sbatch
    fn submit_local(&self, job: &RenderedJob) -> Result<SubmitOutput> {
        let mut sbatch = Command::new(&self.sbatch);
        let cmd = sbatch.args(&job.sbatch_args);
        info!("Running sbatch process");
        info!("{:?}", &cmd);
        communicate(&self.sbatch, cmd, job.wrapper.clone().into_bytes())
    }

    /// Write the wrapper next to the job script and run sbatch on it over ssh
    ///
    /// The `.sh` wrapper isn't deleted afterwards.
    fn submit_remote(&self, host: &str, job: &RenderedJob) -> Result<SubmitOutput> {
        let wrapper_path = job.script.path.with_extension("sh");
        let local_wrapper_path = job.script.local_path.with_extension("sh");
        info!("Writing sbatch wrapper to {}", local_wrapper_path.display());
        fs::write(&local_wrapper_path, &job.wrapper)?;

        let line = remote_command_line(&self.sbatch, &job.sbatch_args, &wrapper_path);
        let mut ssh = Command::new(&self.ssh);
        let cmd = ssh.arg(host);
        info!("Submitting on {host} over {}: {}", self.ssh, line.trim_end());
        communicate(&self.ssh, cmd, line.into_bytes())
    }
}

impl Transport for ProcessTransport {
    fn submit(&self, job: &RenderedJob) -> Result<SubmitOutput> {
        match &job.remote_host {
            Some(host) => self.submit_remote(host, job),
            None => self.submit_local(job),
        }
    }
}

/// Feed `input` to the child's stdin and collect everything it prints until it exits
fn communicate(program: &str, cmd: &mut Command, input: Vec<u8>) -> Result<SubmitOutput> {
    let transport_err = |source: io::Error| Error::Transport { program: program.to_string(), source };

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(transport_err)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| transport_err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured")))?;
    // stdin is closed when the writer finishes
    let writer = thread::spawn(move || stdin.write_all(&input));

    let output = child.wait_with_output().map_err(transport_err)?;
    writer
        .join()
        .map_err(|_| transport_err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")))?
        .map_err(transport_err)?;

    Ok(SubmitOutput { stdout: output.stdout, stderr: output.stderr })
}

/// sbatch invocation sent to the remote shell, newline terminated
fn remote_command_line(sbatch: &str, args: &[String], wrapper_path: &Path) -> String {
    let mut words = vec![shell_quote(sbatch)];
    words.extend(args.iter().map(|arg| shell_quote(arg)));
    words.push(shell_quote(&wrapper_path.display().to_string()));
    format!("{}\n", words.join(" "))
}

/// Single quote `word` unless it's plain enough for the shell as is
///
/// `~` stays unquoted in plain words so the remote shell expands it.
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:%~,=+@".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
