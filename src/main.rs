use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::Value;

use slurm_submit::id::new_id;
use slurm_submit::local::run_local;
use slurm_submit::{CallPayload, Client, Config, Container, FunctionRegistry, JobOptionsBuilder};

/// Submit batch jobs to SLURM
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// User configuration file, defaults to the per-user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a script, given as text or as a path to a script file
    Submit {
        script: String,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Submit a call to one of the built-in functions
    SubmitFn {
        name: String,
        /// Positional argument as JSON, repeatable
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Keyword argument as KEY=JSON, repeatable
        #[arg(long = "kwarg")]
        kwargs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Run a call payload, this is what submitted function jobs execute
    Call { payload: PathBuf },
    /// Run a script here instead of on the cluster
    RunLocal {
        script: String,
        /// Defaults to the configured interpreter
        #[arg(long)]
        interpreter: Option<String>,
        /// Collect output and print it when the script exits
        #[arg(long)]
        capture: bool,
    },
    /// Print a fresh identifier
    NewId,
    /// Write a user configuration file
    InitConfig {
        #[arg(long)]
        logdir: PathBuf,
    },
}

/// sbatch options, unset flags keep their defaults
#[derive(Args)]
struct JobArgs {
    /// Interpreter for the job script
    #[arg(long)]
    cmd: Option<String>,
    #[arg(long)]
    logdir: Option<PathBuf>,
    /// Output log name, %j is the job id and %N the node name
    #[arg(long = "out")]
    slurm_out: Option<String>,
    /// Separate error log, named after the output log unless a name is given
    #[arg(long = "err", num_args = 0..=1)]
    slurm_err: Option<Option<String>>,
    #[arg(long, short = 'J')]
    job_name: Option<String>,
    /// Dependency spec, e.g. afterok:78823
    #[arg(long, short = 'd')]
    dep: Option<String>,
    /// Memory in GB
    #[arg(long)]
    mem: Option<u32>,
    /// Memory per CPU in MB
    #[arg(long)]
    mem_per_cpu: Option<u32>,
    #[arg(long, short = 'c')]
    ncpus: Option<u32>,
    #[arg(long, short = 't')]
    time_limit: Option<String>,
    #[arg(long, short = 'p')]
    partition: Option<String>,
    #[arg(long)]
    account: Option<String>,
    /// Submit over ssh on this host
    #[arg(long)]
    remote_host: Option<String>,
    /// Singularity image to run the job in
    #[arg(long)]
    container: Option<String>,
    /// Bind mount for the singularity image
    #[arg(long, requires = "container")]
    mount: Option<String>,
}

impl JobArgs {
    fn apply(self, mut builder: JobOptionsBuilder) -> JobOptionsBuilder {
        if let Some(cmd) = self.cmd {
            builder = builder.cmd(cmd);
        }
        if let Some(logdir) = self.logdir {
            builder = builder.logdir(logdir);
        }
        if let Some(slurm_out) = self.slurm_out {
            builder = builder.slurm_out(slurm_out);
        }
        match self.slurm_err {
            Some(Some(name)) => builder = builder.slurm_err(name),
            Some(None) => builder = builder.slurm_err(true),
            None => {}
        }
        if let Some(job_name) = self.job_name {
            builder = builder.job_name(job_name);
        }
        if let Some(dep) = self.dep {
            builder = builder.dep(dep);
        }
        if let Some(mem) = self.mem {
            builder = builder.mem(mem);
        }
        if let Some(mem_per_cpu) = self.mem_per_cpu {
            builder = builder.mem_per_cpu(mem_per_cpu);
        }
        if let Some(ncpus) = self.ncpus {
            builder = builder.ncpus(ncpus);
        }
        if let Some(time_limit) = self.time_limit {
            builder = builder.time_limit(time_limit);
        }
        if let Some(partition) = self.partition {
            builder = builder.partition(partition);
        }
        if let Some(account) = self.account {
            builder = builder.account(account);
        }
        if let Some(remote_host) = self.remote_host {
            builder = builder.remote_host(remote_host);
        }
        if let Some(image) = self.container {
            let container = match self.mount {
                Some(mount) => Container::new(image).with_mount(mount),
                None => Container::new(image),
            };
            builder = builder.container(container);
        }
        builder
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { script, job } => {
            let client = Client::new(load_config(cli.config)?);
            let options = job.apply(client.job_options()).build()?;
            let job_id = client.submit_script(&script, &options)?;
            println!("{job_id}");
        }
        Commands::SubmitFn { name, args, kwargs, job } => {
            let client = Client::new(load_config(cli.config)?);
            let call = parse_call(&name, &args, &kwargs)?;
            let job_id = client.submit_function(&builtin_registry(), call, |builder| job.apply(builder))?;
            println!("{job_id}");
        }
        Commands::Call { payload } => {
            builtin_registry()
                .run_payload_file(&payload)
                .with_context(|| format!("Calling payload {}", payload.display()))?;
        }
        Commands::RunLocal { script, interpreter, capture } => {
            let script = match std::fs::read_to_string(&script) {
                Ok(contents) => contents,
                Err(_) => script,
            };
            let interpreter = local_interpreter(interpreter, cli.config)?;
            run_local(&script, &interpreter, capture)?;
        }
        Commands::NewId => println!("{}", new_id()),
        Commands::InitConfig { logdir } => {
            let path = config_path(cli.config)?;
            Config::new(logdir).write(&path)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn config_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(Config::default_path()?),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = config_path(path)?;
    Config::load(&path).with_context(|| format!("Loading config {}", path.display()))
}

fn local_interpreter(flag: Option<String>, config: Option<PathBuf>) -> anyhow::Result<String> {
    match flag {
        Some(interpreter) => Ok(interpreter),
        None => Ok(load_config(config)?.interpreter),
    }
}

/// Functions this binary can run as jobs
fn builtin_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry.register("echo", |call| {
        info!("echo called with {} args", call.args.len());
        println!("args: {}", serde_json::to_string(&call.args)?);
        println!("kwargs: {}", serde_json::to_string(&call.kwargs)?);
        Ok(())
    });
    registry
}

fn parse_call(name: &str, args: &[String], kwargs: &[String]) -> anyhow::Result<CallPayload> {
    let mut call = CallPayload::new(name);
    for raw in args {
        let value: Value = serde_json::from_str(raw).with_context(|| format!("--arg {raw} is not JSON"))?;
        call = call.with_arg(value)?;
    }
    for raw in kwargs {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("--kwarg {raw} should look like KEY=JSON"))?;
        let value: Value = serde_json::from_str(value).with_context(|| format!("--kwarg {raw} is not JSON"))?;
        call = call.with_kwarg(key, value)?;
    }
    Ok(call)
}
