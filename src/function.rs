//! Submit a registered Rust function as a SLURM job
//!
//! Arguments are written to a payload file in the log directory. The job script runs the
//! executable hosting the [`registry::FunctionRegistry`] with `call <payload>`, which looks the
//! function up by name and invokes it, then deletes the payload.

/// Arguments of a deferred call and the payload file they live in
pub mod payload;

/// Name to function lookup, used on both sides of the submission
pub mod registry;

/// Render the calling script and submit it
pub mod submit;
