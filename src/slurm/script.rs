use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info};
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::config::expand_home;
use crate::error::Result;
use crate::id::new_id;
use crate::slurm::options::{Container, JobOptions};

/// Timestamp format shared by generated job names and file names
pub static TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M";

/// A job script written to the shared log directory
///
/// `path` is the path as the scheduler and compute nodes see it (a leading `~/` is kept), while
/// `local_path` is where this process wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPath {
    pub path: PathBuf,
    pub local_path: PathBuf,
}

/// A job ready to be handed to sbatch
///
/// The job script itself is already on disk. The wrapper is the batch script sbatch receives: it
/// runs the interpreter on the job script and deletes the job script when it's done.
#[derive(Debug, Clone)]
pub struct RenderedJob {
    pub job_name: String,
    pub script: ScriptPath,
    pub wrapper: String,
    /// sbatch arguments, without the program name
    pub sbatch_args: Vec<String>,
    pub remote_host: Option<String>,
}

/// Rendering context for the job script header
#[derive(Serialize)]
struct HeaderContext {
    interpreter: String,
}

/// Rendering context for the error log cleanup epilogue
#[derive(Serialize)]
struct CleanupContext {
    /// error log path as a quoted string literal
    errfile: String,
}

/// Rendering context for the sbatch wrapper
#[derive(Serialize)]
struct WrapperContext {
    container: String,
    cmd: String,
    script_path: String,
}

/// Render the job script and wrapper for `body` and write the job script to the log directory
///
/// `body` is script text, or the path of a script file whose contents are used verbatim.
pub fn build(body: &str, options: &JobOptions) -> Result<RenderedJob> {
    let body = read_body(body)?;
    let job_name = options.job_name.clone().unwrap_or_else(autogen_job_name);

    let logfile = options.logdir.join(&options.slurm_out);
    let errfile = options.error_log_name().map(|name| options.logdir.join(name));

    let mut content = render_header(&options.cmd)?;
    content.push_str(&body);
    if let Some(errfile) = &errfile {
        content.push_str(&render_cleanup(errfile)?);
    }

    let script = script_path(&options.logdir, &job_name);
    info!("Writing job script to {}", script.local_path.display());
    fs::write(&script.local_path, content)?;

    let sbatch_args = sbatch_args(options, &job_name, &logfile, errfile.as_deref());
    let wrapper = render_wrapper(options, &script.path)?;
    debug!("Rendered wrapper:\n{wrapper}");

    Ok(RenderedJob {
        job_name,
        script,
        wrapper,
        sbatch_args,
        remote_host: options.remote_host.clone(),
    })
}

/// Use the contents of `body` if it names an existing file
fn read_body(body: &str) -> Result<String> {
    let path = Path::new(body);
    if !body.contains('\n') && path.is_file() {
        info!("Reading job script body from {}", path.display());
        return Ok(fs::read_to_string(path)?);
    }
    Ok(body.to_string())
}

fn autogen_job_name() -> String {
    let now = Local::now().format(TIMESTAMP_FORMAT);
    format!("autogen_{}_{}", now, &new_id()[..8])
}

/// Unique job script location: `<logdir>/<job_name>_<id>.py`
fn script_path(logdir: &Path, job_name: &str) -> ScriptPath {
    let path = logdir.join(format!("{}_{}.py", job_name, new_id()));
    let local_path = expand_home(&path);
    ScriptPath { path, local_path }
}

/// sbatch arguments in the order sbatch documents them, optional flags last
fn sbatch_args(options: &JobOptions, job_name: &str, logfile: &Path, errfile: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "-c".to_string(),
        options.ncpus.to_string(),
        "-p".to_string(),
        options.partition.clone(),
        "--mem".to_string(),
        format!("{}G", options.mem),
        "-o".to_string(),
        logfile.display().to_string(),
        "-J".to_string(),
        job_name.to_string(),
    ];
    if let Some(dep) = &options.dep {
        args.extend(["-d".to_string(), dep.clone()]);
    }
    if let Some(errfile) = errfile {
        args.extend(["-e".to_string(), errfile.display().to_string()]);
    }
    if let Some(time_limit) = &options.time_limit {
        args.extend(["-t".to_string(), time_limit.clone()]);
    }
    if let Some(account) = &options.account {
        args.extend(["--account".to_string(), account.clone()]);
    }
    args
}

fn templates() -> Result<TinyTemplate<'static>> {
    static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));
    static CLEANUP: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/error_cleanup.txt"));
    static WRAPPER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/wrapper.txt"));
    let mut tt = TinyTemplate::new();
    // scripts, not HTML
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("header", HEADER)?;
    tt.add_template("cleanup", CLEANUP)?;
    tt.add_template("wrapper", WRAPPER)?;
    Ok(tt)
}

fn render_header(cmd: &str) -> Result<String> {
    let interpreter = cmd.split_whitespace().next().unwrap_or(cmd).to_string();
    let context = HeaderContext { interpreter };
    Ok(templates()?.render("header", &context)?)
}

/// Epilogue that prints and deletes the error log at the end of the job
///
/// The error log is deleted whether or not it had content.
fn render_cleanup(errfile: &Path) -> Result<String> {
    let context = CleanupContext { errfile: serde_json::to_string(&errfile.display().to_string())? };
    Ok(templates()?.render("cleanup", &context)?)
}

fn render_wrapper(options: &JobOptions, script_path: &Path) -> Result<String> {
    let context = WrapperContext {
        container: options.container.as_ref().map(container_line).unwrap_or_default(),
        cmd: options.cmd.clone(),
        script_path: script_path.display().to_string(),
    };
    Ok(templates()?.render("wrapper", &context)?)
}

fn container_line(container: &Container) -> String {
    match container.bind_mount() {
        Some(mount) => format!(
            "SINGULARITY_SHELL=/bin/bash\nsingularity exec -B {} {} ",
            mount, container.image
        ),
        None => format!("SINGULARITY_SHELL=/bin/bash\nsingularity exec {} ", container.image),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::slurm::options::JobOptionsBuilder;

    fn builder(dir: &TempDir) -> JobOptionsBuilder {
        JobOptions::builder(&Config::new(dir.path()))
    }

    #[test]
    fn writes_header_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir).job_name("hello").build().unwrap();
        let job = build("print('hi')\n", &options).unwrap();

        let script = fs::read_to_string(&job.script.local_path).unwrap();
        assert!(script.starts_with("#!/usr/bin/env python3\n#SBATCH\n\n"));
        assert!(script.contains("print('hi')"));
        assert!(!script.contains("Cleanup error files"));

        let file_name = job.script.path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("hello_"));
        assert!(file_name.ends_with(".py"));
        assert_eq!(file_name.len(), "hello_".len() + 32 + ".py".len());
        assert_eq!(job.script.path.parent(), Some(dir.path()));
    }

    #[test]
    fn sbatch_args_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir)
            .job_name("args")
            .ncpus(2)
            .mem(10)
            .slurm_out("out_%j.out")
            .build()
            .unwrap();
        let job = build("pass", &options).unwrap();
        let logfile = dir.path().join("out_%j.out").display().to_string();
        assert_eq!(
            job.sbatch_args,
            vec!["-c", "2", "-p", "regular", "--mem", "10G", "-o", logfile.as_str(), "-J", "args"]
        );
    }

    #[test]
    fn optional_flags_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir)
            .job_name("flags")
            .dep("afterok:12")
            .slurm_err(true)
            .slurm_out("out_%j.out")
            .time_limit("90")
            .account("lab")
            .build()
            .unwrap();
        let job = build("pass", &options).unwrap();
        let errfile = dir.path().join("Error_out_%j.out").display().to_string();
        assert_eq!(
            &job.sbatch_args[10..],
            &["-d", "afterok:12", "-e", errfile.as_str(), "-t", "90", "--account", "lab"]
        );
    }

    #[test]
    fn error_log_adds_cleanup_epilogue() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir).slurm_err("err_%j_%N.txt").build().unwrap();
        let job = build("pass\n", &options).unwrap();
        let script = fs::read_to_string(&job.script.local_path).unwrap();

        let errfile = dir.path().join("err_%j_%N.txt").display().to_string();
        assert!(script.contains("# Cleanup error files"));
        assert!(script.contains(&format!("ef = \"{errfile}\".replace('%j'")));
        assert!(script.contains("print('Warnings detected!')"));
        assert_eq!(script.matches("os.unlink(ef)").count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn cleanup_epilogue_removes_error_log() {
        use std::process::Command;

        if Command::new("python3").arg("--version").output().is_err() {
            eprintln!("python3 not found, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let errfile = dir.path().join("err.txt");
        let options = builder(&dir).slurm_err("err.txt").build().unwrap();

        for contents in ["", "careful now\n"] {
            let job = build("print('job ran')\n", &options).unwrap();
            fs::write(&errfile, contents).unwrap();

            let output = Command::new("python3").arg(&job.script.local_path).output().unwrap();
            assert!(output.status.success());
            let stdout = String::from_utf8(output.stdout).unwrap();
            assert!(stdout.contains("job ran"));
            assert!(!errfile.exists());
            if contents.is_empty() {
                assert!(stdout.contains("Cleanup -> removing"));
                assert!(!stdout.contains("Warnings detected!"));
            } else {
                assert!(stdout.contains("Warnings detected!"));
                assert!(stdout.contains("careful now"));
            }
        }
    }

    #[test]
    fn wrapper_runs_and_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir).build().unwrap();
        let job = build("pass", &options).unwrap();
        let path = job.script.path.display().to_string();

        assert!(job.wrapper.starts_with("#!/bin/bash\n#SBATCH\nsource ~/.bashrc\n"));
        assert!(job.wrapper.contains(&format!("stdbuf -o0 -e0 python3 {path}\n")));
        assert!(job.wrapper.contains(&format!("rm {path}")));
        assert!(!job.wrapper.contains("singularity"));
    }

    #[test]
    fn wrapper_container_mount() {
        let dir = tempfile::tempdir().unwrap();

        let options = builder(&dir).container(Container::new("img.sif").with_mount("")).build().unwrap();
        let job = build("pass", &options).unwrap();
        assert!(job.wrapper.contains("SINGULARITY_SHELL=/bin/bash\nsingularity exec img.sif stdbuf"));
        assert!(!job.wrapper.contains("-B"));

        let options = builder(&dir).container(Container::new("img.sif").with_mount("/data")).build().unwrap();
        let job = build("pass", &options).unwrap();
        assert!(job.wrapper.contains("singularity exec -B /data img.sif stdbuf"));
    }

    #[test]
    fn same_options_never_share_a_script() {
        let dir = tempfile::tempdir().unwrap();
        let options = builder(&dir).job_name("twice").build().unwrap();
        let first = build("pass", &options).unwrap();
        let second = build("pass", &options).unwrap();
        assert_ne!(first.script.path, second.script.path);
        assert!(first.script.local_path.exists());
        assert!(second.script.local_path.exists());
    }

    #[test]
    fn body_can_be_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("job_body.py");
        fs::write(&source, "print('from file')\n").unwrap();

        let options = builder(&dir).build().unwrap();
        let job = build(source.to_str().unwrap(), &options).unwrap();
        let script = fs::read_to_string(&job.script.local_path).unwrap();
        assert!(script.contains("print('from file')"));
        assert!(job.job_name.starts_with("autogen_"));
    }
}
