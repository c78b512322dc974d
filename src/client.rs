use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::slurm::job_id::{self, JobId};
use crate::slurm::options::{JobOptions, JobOptionsBuilder};
use crate::slurm::script::{self, RenderedJob};
use crate::slurm::submit::{ProcessTransport, Transport};

/// Submits jobs with a fixed configuration
///
/// Every submission blocks until sbatch has answered. Submitting from several threads at once is
/// fine: generated file names never collide and nothing else is shared.
#[derive(Debug)]
pub struct Client<T = ProcessTransport> {
    config: Config,
    transport: T,
}

impl Client<ProcessTransport> {
    pub fn new(config: Config) -> Client<ProcessTransport> {
        let transport = ProcessTransport::new(&config);
        Client { config, transport }
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: Config, transport: T) -> Client<T> {
        Client { config, transport }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Job options preloaded from the configuration
    pub fn job_options(&self) -> JobOptionsBuilder {
        JobOptions::builder(&self.config)
    }

    /// Submit a script, given as text or as the path of a script file
    pub fn submit_script(&self, body: &str, options: &JobOptions) -> Result<JobId> {
        let job = script::build(body, options)?;
        self.submit_rendered(&job)
    }

    pub fn submit_rendered(&self, job: &RenderedJob) -> Result<JobId> {
        info!("Submitting job {}", job.job_name);
        let output = self.transport.submit(job)?;
        job_id::extract(&output.stdout, &output.stderr)
    }
}
