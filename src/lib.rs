//! Submit batch jobs to a SLURM cluster, locally or through an ssh hop
//!
//! A job is a script body plus [`JobOptions`]. The body is wrapped with an interpreter header and
//! an optional error log cleanup, written to the shared log directory, and handed to sbatch by a
//! small bash wrapper that deletes the script again when the job is done. The only thing that
//! comes back is the [`JobId`].
//!
//! ```no_run
//! use slurm_submit::{Client, Config};
//!
//! # fn main() -> slurm_submit::Result<()> {
//! let config = Config::load(&Config::default_path()?)?;
//! let client = Client::new(config);
//! let options = client.job_options().partition("regular").ncpus(2).mem(10).build()?;
//! let job_id = client.submit_script("print('hi')", &options)?;
//! println!("{job_id}");
//! # Ok(())
//! # }
//! ```

/// Explicit configuration, loaded once and passed around
pub mod config;

pub mod error;

/// Collision-free names for files on the shared log directory
pub mod id;

/// Job scripts, sbatch arguments and submission
pub mod slurm;

pub mod function;

pub mod local;

mod client;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use function::payload::CallPayload;
pub use function::registry::FunctionRegistry;
pub use slurm::job_id::JobId;
pub use slurm::options::{Container, ErrorLog, JobOptions, JobOptionsBuilder};
pub use slurm::submit::{ProcessTransport, SubmitOutput, Transport};
