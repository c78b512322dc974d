//! Render job scripts and submit them to SLURM

/// Job options with defaults and validation
pub mod options;

/// Render the wrapper script and sbatch arguments, write the job script to the log directory
pub mod script;

/// Hand a rendered job to sbatch, locally or over ssh
pub mod submit;

/// Recover the job id from sbatch output
pub mod job_id;
