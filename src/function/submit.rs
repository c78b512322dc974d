use std::path::Path;

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tinytemplate::TinyTemplate;

use crate::client::Client;
use crate::config::expand_home;
use crate::error::{Error, Result};
use crate::function::payload::CallPayload;
use crate::function::registry::FunctionRegistry;
use crate::id::new_id;
use crate::slurm::job_id::JobId;
use crate::slurm::options::JobOptionsBuilder;
use crate::slurm::script::TIMESTAMP_FORMAT;
use crate::slurm::submit::Transport;

/// Rendering context for the calling script, every field is a quoted string literal
#[derive(Serialize)]
struct CallContext {
    runner: String,
    function: String,
    payload: String,
}

impl<T: Transport> Client<T> {
    /// Submit a call to a registered function
    ///
    /// Defaults are 3 CPUs, 30 GB, the configured log directory, and stdout/stderr logs named
    /// after the function and the submission time. `configure` gets the builder with those
    /// defaults and can override anything.
    pub fn submit_function<F>(&self, registry: &FunctionRegistry, call: CallPayload, configure: F) -> Result<JobId>
    where
        F: FnOnce(JobOptionsBuilder) -> JobOptionsBuilder,
    {
        let runner = registry.runner()?;
        self.submit_function_with_runner(registry, &runner, call, configure)
    }

    /// Like [`Client::submit_function`], but the job calls back through `runner` instead of the
    /// registry's runner
    ///
    /// `runner` must register the same function. A bare name is looked up on the compute node's
    /// `PATH`.
    pub fn submit_function_with_runner<F>(
        &self,
        registry: &FunctionRegistry,
        runner: &Path,
        call: CallPayload,
        configure: F,
    ) -> Result<JobId>
    where
        F: FnOnce(JobOptionsBuilder) -> JobOptionsBuilder,
    {
        if !registry.contains(&call.function) {
            return Err(Error::UnknownFunction(call.function));
        }

        let id = new_id();
        let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let name = short_name(&call.function);
        let defaults = self
            .job_options()
            .ncpus(3)
            .mem(30)
            .job_name(format!("{name}_{now}_{id}"))
            .slurm_out(format!("{name}_{now}_%j_%N.out"))
            .slurm_err(format!("ErrorFile_{name}_{now}_%j_%N.out"));
        let options = configure(defaults).build()?;

        let payload_path = options.logdir.join(format!("TempSlurmVars_{now}_{id}.pik"));
        call.write(&expand_home(&payload_path))?;

        let body = render_call(runner, &call.function, &payload_path)?;
        self.submit_script(&body, &options)
    }

    /// Submit one call per item, each with the item prepended to the positional arguments
    pub fn scatter<I, F>(&self, registry: &FunctionRegistry, call: &CallPayload, items: I, configure: F) -> Result<Vec<JobId>>
    where
        I: IntoIterator<Item = Value>,
        F: Fn(JobOptionsBuilder) -> JobOptionsBuilder,
    {
        items
            .into_iter()
            .map(|item| {
                let mut call = call.clone();
                call.args.insert(0, item);
                self.submit_function(registry, call, &configure)
            })
            .collect()
    }
}

/// Last path segment of a registered name, `stats::fit` becomes `fit`
fn short_name(function: &str) -> &str {
    function.rsplit("::").next().unwrap_or(function)
}

/// Script body that runs the registry's runner on the payload, then deletes the payload
fn render_call(runner: &Path, function: &str, payload_path: &Path) -> Result<String> {
    /// included calling script template
    static CALL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/function_call.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("call", CALL)?;

    let context = CallContext {
        runner: literal(runner)?,
        function: serde_json::to_string(function)?,
        payload: literal(payload_path)?,
    };
    Ok(tt.render("call", &context)?)
}

/// Double quoted string literal, valid in the job script
fn literal(path: &Path) -> Result<String> {
    Ok(serde_json::to_string(&path.display().to_string())?)
}
