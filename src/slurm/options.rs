use std::path::PathBuf;

use derive_builder::Builder;

use crate::config::Config;

/// Default stdout log name. `%N` (node) and `%j` (job id) are substituted by SLURM
pub static DEFAULT_SLURM_OUT: &str = "slurm_pyscript_node_%N_job_%j.out";

/// Where a job's stderr goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorLog {
    /// stderr is written to the stdout log
    #[default]
    Combined,
    /// A separate log named `Error_<stdout log name>`
    Derived,
    /// A separate log with this name template
    Named(String),
}

impl ErrorLog {
    /// File name template of the separate error log, if any
    pub fn file_name(&self, slurm_out: &str) -> Option<String> {
        match self {
            ErrorLog::Combined => None,
            ErrorLog::Derived => Some(format!("Error_{slurm_out}")),
            ErrorLog::Named(name) => Some(name.clone()),
        }
    }
}

impl From<bool> for ErrorLog {
    fn from(separate: bool) -> Self {
        if separate {
            ErrorLog::Derived
        } else {
            ErrorLog::Combined
        }
    }
}

impl From<&str> for ErrorLog {
    fn from(name: &str) -> Self {
        ErrorLog::Named(name.to_string())
    }
}

impl From<String> for ErrorLog {
    fn from(name: String) -> Self {
        ErrorLog::Named(name)
    }
}

/// A singularity image the job command runs inside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub image: String,
    pub mount: Option<String>,
}

impl Container {
    pub fn new(image: impl Into<String>) -> Container {
        Container { image: image.into(), mount: None }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Container {
        self.mount = Some(mount.into());
        self
    }

    /// Bind mount path, an empty string means no bind mount
    pub fn bind_mount(&self) -> Option<&str> {
        self.mount.as_deref().filter(|mount| !mount.is_empty())
    }
}

/// Everything sbatch needs to know about a job
///
/// Built with [`JobOptionsBuilder`], which fills in defaults for unset fields and rejects
/// nonsensical values before anything touches the filesystem.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct JobOptions {
    /// Interpreter that runs the job script on the compute node
    #[builder(setter(into), default = "\"python3\".to_string()")]
    pub cmd: String,
    /// Directory for logs and the generated job script, shared with compute nodes
    #[builder(setter(into))]
    pub logdir: PathBuf,
    #[builder(setter(into), default = "DEFAULT_SLURM_OUT.to_string()")]
    pub slurm_out: String,
    #[builder(setter(into), default)]
    pub slurm_err: ErrorLog,
    /// Name shown in the queue, generated when unset
    #[builder(setter(into, strip_option), default)]
    pub job_name: Option<String>,
    /// Dependency spec passed to `-d`, e.g. `afterok:78823:78824`
    #[builder(setter(into, strip_option), default)]
    pub dep: Option<String>,
    /// Memory in GB
    #[builder(default = "30")]
    pub mem: u32,
    /// Memory per CPU in MB. Recorded only, sbatch gets `--mem`
    #[builder(setter(strip_option), default)]
    pub mem_per_cpu: Option<u32>,
    #[builder(default = "3")]
    pub ncpus: u32,
    /// Minutes, or any sbatch time format such as `days-hours:minutes:seconds`
    #[builder(setter(into, strip_option), default)]
    pub time_limit: Option<String>,
    #[builder(setter(into), default = "\"regular\".to_string()")]
    pub partition: String,
    #[builder(setter(into, strip_option), default)]
    pub account: Option<String>,
    /// Submit through an ssh session to this host instead of a local sbatch
    #[builder(setter(into, strip_option), default)]
    pub remote_host: Option<String>,
    #[builder(setter(strip_option), default)]
    pub container: Option<Container>,
}

impl JobOptions {
    /// Builder preloaded with the configured log directory and interpreter
    pub fn builder(config: &Config) -> JobOptionsBuilder {
        JobOptionsBuilder::default()
            .logdir(config.logdir.clone())
            .cmd(config.interpreter.clone())
    }

    /// stderr log file name template, if stderr is kept separately
    pub fn error_log_name(&self) -> Option<String> {
        self.slurm_err.file_name(&self.slurm_out)
    }
}

impl JobOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.ncpus == Some(0) {
            return Err("ncpus must be at least 1".to_string());
        }
        if self.mem == Some(0) {
            return Err("mem must be at least 1 GB".to_string());
        }
        if let Some(partition) = &self.partition {
            if partition.trim().is_empty() {
                return Err("partition can't be empty".to_string());
            }
        }
        if let Some(cmd) = &self.cmd {
            if cmd.trim().is_empty() {
                return Err("cmd can't be empty".to_string());
            }
        }
        if let Some(logdir) = &self.logdir {
            if logdir.as_os_str().is_empty() {
                return Err("logdir can't be empty".to_string());
            }
        }
        if let Some(Some(name)) = &self.job_name {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(format!("invalid job name {name:?}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> JobOptionsBuilder {
        JobOptions::builder(&Config::new("/shared/logs"))
    }

    #[test]
    fn defaults_are_applied() {
        let options = builder().build().unwrap();
        assert_eq!(options.cmd, "python3");
        assert_eq!(options.logdir, PathBuf::from("/shared/logs"));
        assert_eq!(options.slurm_out, DEFAULT_SLURM_OUT);
        assert_eq!(options.slurm_err, ErrorLog::Combined);
        assert_eq!(options.mem, 30);
        assert_eq!(options.ncpus, 3);
        assert_eq!(options.partition, "regular");
        assert!(options.job_name.is_none());
        assert!(options.remote_host.is_none());
        assert!(options.container.is_none());
    }

    #[test]
    fn logdir_is_required() {
        assert!(JobOptionsBuilder::default().build().is_err());
    }

    #[test]
    fn derived_error_log_name() {
        let options = builder().slurm_out("out_%j.out").slurm_err(true).build().unwrap();
        assert_eq!(options.error_log_name().as_deref(), Some("Error_out_%j.out"));

        let options = builder().slurm_err("err_%j.txt").build().unwrap();
        assert_eq!(options.error_log_name().as_deref(), Some("err_%j.txt"));

        let options = builder().slurm_err(false).build().unwrap();
        assert_eq!(options.error_log_name(), None);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(builder().ncpus(0).build().is_err());
        assert!(builder().mem(0).build().is_err());
        assert!(builder().partition(" ").build().is_err());
        assert!(builder().job_name("two words").build().is_err());
        assert!(builder().logdir("").build().is_err());
    }

    #[test]
    fn empty_mount_is_no_mount() {
        assert_eq!(Container::new("img.sif").bind_mount(), None);
        assert_eq!(Container::new("img.sif").with_mount("").bind_mount(), None);
        assert_eq!(Container::new("img.sif").with_mount("/data").bind_mount(), Some("/data"));
    }
}
