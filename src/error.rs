use std::io;

use thiserror::Error;

use crate::slurm::options::JobOptionsBuilderError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not run `{program}`: {source}")]
    Transport {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Slurm job submission failed!\n=== Stderr: ===\n{stderr}")]
    SubmissionFailed { stdout: String, stderr: String },
    #[error("`{program}` exited with {status}\n=== Stderr: ===\n{stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid job options: {0}")]
    InvalidOptions(#[from] JobOptionsBuilderError),
    #[error("no function registered as `{0}`")]
    UnknownFunction(String),
    #[error("function `{name}` failed: {error:#}")]
    FunctionFailed { name: String, error: anyhow::Error },
    #[error("template error: {0}")]
    Template(#[from] tinytemplate::error::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
