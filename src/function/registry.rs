use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::expand_home;
use crate::error::{Error, Result};
use crate::function::payload::CallPayload;

type RegisteredFn = Box<dyn Fn(&CallPayload) -> anyhow::Result<()> + Send + Sync>;

/// Functions that can be submitted by name
///
/// The submitting process and the job must agree on the registry: the job runs `runner` (by
/// default the submitting executable) with `call <payload>`, and the runner dispatches through
/// its own registry with [`FunctionRegistry::run_payload_file`].
#[derive(Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, RegisteredFn>,
    runner: Option<PathBuf>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut FunctionRegistry
    where
        F: Fn(&CallPayload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }

    /// Run jobs with this program instead of the current executable
    ///
    /// A bare name is looked up on the compute node's `PATH`.
    pub fn with_runner(mut self, runner: impl Into<PathBuf>) -> FunctionRegistry {
        self.runner = Some(runner.into());
        self
    }

    /// Program that jobs run to call back into this registry
    pub fn runner(&self) -> Result<PathBuf> {
        match &self.runner {
            Some(runner) => Ok(runner.clone()),
            None => Ok(std::env::current_exe()?),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Invoke the function named in `payload`
    pub fn call(&self, payload: &CallPayload) -> Result<()> {
        let function = self
            .functions
            .get(&payload.function)
            .ok_or_else(|| Error::UnknownFunction(payload.function.clone()))?;
        info!("Calling function {}", payload.function);
        function(payload).map_err(|error| Error::FunctionFailed { name: payload.function.clone(), error })
    }

    /// Load a payload written at submission time and invoke its function
    ///
    /// The payload file is left in place, the job script removes it once this returns. A leading
    /// `~` in `path` is the home directory of the user running the job.
    pub fn run_payload_file(&self, path: &Path) -> Result<()> {
        let payload = CallPayload::read(&expand_home(path))?;
        self.call(&payload)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("runner", &self.runner)
            .finish()
    }
}
