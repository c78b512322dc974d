use std::fmt;

use log::{info, warn};

use crate::error::{Error, Result};

static SUBMITTED_MARKER: &str = "Submitted batch job ";

/// Job id assigned by SLURM, always a non-empty run of digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Find the job id in sbatch stdout, or fail with the captured stderr
pub fn extract(stdout: &[u8], stderr: &[u8]) -> Result<JobId> {
    let stdout = String::from_utf8_lossy(stdout);
    match parse_job_id(&stdout) {
        Some(job_id) => {
            info!("SLURM job id: {job_id}");
            Ok(job_id)
        }
        None => {
            warn!("No job id in sbatch output\n=== Stdout: ===\n{stdout}");
            Err(Error::SubmissionFailed {
                stdout: stdout.into_owned(),
                stderr: String::from_utf8_lossy(stderr).into_owned(),
            })
        }
    }
}

fn parse_job_id(stdout: &str) -> Option<JobId> {
    let start = stdout.find(SUBMITTED_MARKER)? + SUBMITTED_MARKER.len();
    let digits: String = stdout[start..].chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(JobId(digits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sbatch_output() {
        let job_id = extract(b"Submitted batch job 12345\n", b"").unwrap();
        assert_eq!(job_id.as_str(), "12345");
        assert_eq!(job_id.to_string(), "12345");
    }

    #[test]
    fn marker_after_other_output() {
        // ssh sessions print login banners before the sbatch output
        let stdout = b"Welcome to the cluster\nsbatch: info\nSubmitted batch job 987 on cluster x\n";
        assert_eq!(extract(stdout, b"").unwrap().as_str(), "987");
    }

    #[test]
    fn failure_carries_stderr() {
        let err = extract(b"", b"error: invalid partition").unwrap_err();
        match &err {
            Error::SubmissionFailed { stderr, .. } => assert!(stderr.contains("invalid partition")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("invalid partition"));
    }

    #[test]
    fn marker_without_digits_is_a_failure() {
        assert!(extract(b"Submitted batch job \n", b"").is_err());
    }
}
