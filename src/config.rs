//! User configuration, read once and passed by reference to every submission
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static CONFIG_FILE: &str = "options.toml";

/// Resolved configuration
///
/// `logdir` is kept as written (a leading `~/` survives) because it ends up in scripts that run
/// on other machines. Use [`expand_home`] before touching the local filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Default directory for Slurm logs, generated scripts and payloads
    pub logdir: PathBuf,
    /// Scheduler submission program
    pub sbatch: String,
    /// Remote shell program used when a job names a remote host
    pub ssh: String,
    /// Interpreter used to run generated scripts
    pub interpreter: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default)]
    cluster: ClusterSection,
}

#[derive(Debug, Deserialize, Serialize)]
struct ClusterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logdir: Option<PathBuf>,
    #[serde(default = "default_sbatch")]
    sbatch: String,
    #[serde(default = "default_ssh")]
    ssh: String,
    #[serde(default = "default_interpreter")]
    interpreter: String,
}

impl Default for ClusterSection {
    fn default() -> Self {
        ClusterSection {
            logdir: None,
            sbatch: default_sbatch(),
            ssh: default_ssh(),
            interpreter: default_interpreter(),
        }
    }
}

fn default_sbatch() -> String {
    "sbatch".to_string()
}

fn default_ssh() -> String {
    "ssh".to_string()
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Config {
    pub fn new(logdir: impl Into<PathBuf>) -> Config {
        let cluster = ClusterSection::default();
        Config {
            logdir: logdir.into(),
            sbatch: cluster.sbatch,
            ssh: cluster.ssh,
            interpreter: cluster.interpreter,
        }
    }

    /// Path of the per-user configuration file
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "slurm-submit")
            .ok_or_else(|| Error::Config("can't find a home directory for the user config".to_string()))?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load the user configuration, writing a skeleton file first if none exists
    ///
    /// Fails if the file doesn't set `cluster.logdir`.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            warn!("No config at {}, writing a skeleton", path.display());
            write_skeleton(path)?;
        }
        info!("Reading config {}", path.display());
        let contents = fs::read_to_string(path)?;
        Config::parse(&contents, path)
    }

    /// Parse TOML config text, `origin` is only used for error messages
    pub fn parse(contents: &str, origin: &Path) -> Result<Config> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|err| Error::Config(format!("can't parse {}: {}", origin.display(), err)))?;
        let cluster = file.cluster;

        let logdir = match cluster.logdir {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => {
                return Err(Error::Config(format!(
                    "No slurm log directory set!\nPlease set `logdir` in the [cluster] table of {}",
                    origin.display()
                )))
            }
        };

        Ok(Config {
            logdir,
            sbatch: cluster.sbatch,
            ssh: cluster.ssh,
            interpreter: cluster.interpreter,
        })
    }

    /// Write this configuration as TOML, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = ConfigFile {
            cluster: ClusterSection {
                logdir: Some(self.logdir.clone()),
                sbatch: self.sbatch.clone(),
                ssh: self.ssh.clone(),
                interpreter: self.interpreter.clone(),
            },
        };
        let contents = toml::to_string_pretty(&file)
            .map_err(|err| Error::Config(format!("can't serialise config: {}", err)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        info!("Writing config to {}", path.display());
        fs::write(path, contents)?;
        Ok(())
    }
}

fn write_skeleton(path: &Path) -> Result<()> {
    /// included skeleton, `logdir` is commented out
    static SKELETON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/options.toml"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, SKELETON)?;
    Ok(())
}

/// Replace a leading `~` with the local home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
