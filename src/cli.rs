//! Command line entry point
//!
//! Parses the worker budget and the named-task requests, runs the tasks and
//! reports every error on stderr. Exit code 0 means no task errored.

use std::process::ExitCode;

use clap::Parser;

use crate::config::RunnerConfig;
use crate::named::NamedTaskSet;
use crate::start_with_config;

#[derive(Debug, Parser)]
#[command(name = "taskmill")]
#[command(about = "Run named tasks with deduplicated, dependency-driven scheduling")]
pub struct Args {
    /// Number of concurrent workers (defaults to the logical CPU count)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Tasks to run, each `name` or `name(arg)`
    #[arg(value_name = "TASK")]
    pub tasks: Vec<String>,
}

pub(crate) fn config_from_args(args: &Args) -> Result<RunnerConfig, String> {
    let mut config = RunnerConfig::default();
    if let Some(jobs) = args.jobs {
        config.max_parallel = jobs;
    }
    config.validate()?;
    Ok(config)
}

/// Runs the requested tasks against the registered suppliers, draining the
/// error stream to stderr. Returns exit code 1 if anything failed.
pub async fn run(tasks: &NamedTaskSet, args: Args) -> ExitCode {
    let config = match config_from_args(&args) {
        Ok(config) => config,
        Err(reason) => {
            eprintln!("invalid arguments: {reason}");
            return ExitCode::FAILURE;
        }
    };
    let root = match tasks.build(&args.tasks) {
        Ok(root) => root,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let mut errors = start_with_config(root, config);
    let mut seen_errors = false;
    while let Some(error) = errors.recv().await {
        seen_errors = true;
        eprintln!("{error}");
    }
    if seen_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jobs_and_tasks() {
        let args = Args::try_parse_from(["taskmill", "-j", "4", "build", "test(unit)"]).unwrap();
        assert_eq!(args.jobs, Some(4));
        assert_eq!(args.tasks, vec!["build", "test(unit)"]);
    }

    #[test]
    fn long_jobs_flag() {
        let args = Args::try_parse_from(["taskmill", "--jobs", "2", "link"]).unwrap();
        assert_eq!(args.jobs, Some(2));
    }

    #[test]
    fn double_dash_ends_flag_parsing() {
        let args = Args::try_parse_from(["taskmill", "--", "-j"]).unwrap();
        assert_eq!(args.jobs, None);
        assert_eq!(args.tasks, vec!["-j"]);
    }

    #[test]
    fn defaults_to_cpu_count() {
        let args = Args::try_parse_from(["taskmill"]).unwrap();
        let config = config_from_args(&args).unwrap();
        assert_eq!(config.max_parallel, num_cpus::get());
    }

    #[test]
    fn zero_jobs_is_rejected() {
        let args = Args::try_parse_from(["taskmill", "-j", "0", "build"]).unwrap();
        assert!(config_from_args(&args).is_err());
    }
}
