#![allow(dead_code)]

use std::cell::RefCell;

use slurm_submit::slurm::script::RenderedJob;
use slurm_submit::{Result, SubmitOutput, Transport};

/// Records every job and answers like sbatch would
pub struct MockTransport {
    pub submitted: RefCell<Vec<RenderedJob>>,
    stdout: String,
    stderr: String,
}

impl MockTransport {
    pub fn accepting(job_id: u32) -> MockTransport {
        MockTransport {
            submitted: RefCell::new(Vec::new()),
            stdout: format!("Submitted batch job {job_id}\n"),
            stderr: String::new(),
        }
    }

    pub fn rejecting(stderr: &str) -> MockTransport {
        MockTransport {
            submitted: RefCell::new(Vec::new()),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn last(&self) -> RenderedJob {
        self.submitted.borrow().last().cloned().expect("a submitted job")
    }
}

impl Transport for MockTransport {
    fn submit(&self, job: &RenderedJob) -> Result<SubmitOutput> {
        self.submitted.borrow_mut().push(job.clone());
        Ok(SubmitOutput { stdout: self.stdout.clone().into_bytes(), stderr: self.stderr.clone().into_bytes() })
    }
}
