// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use morto::{
    config::CONFIG_FILE_NAME, Environment, FileAssignment, Git2ChangeDetector, JunitMerger,
    MonorepoConfig, PartitionFilter, Phase, PhaseRunner, ProjectRegistry, ProjectSet, RunOptions,
    RunReport, SelectionPlanner, SelectionSource, ShellExecutor, WorkerSlot,
};

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    env,
    fs::read_to_string,
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  morto <command> [options]\n  morto test [options] [<project>/<file>]...",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<i32> {
        match self.command {
            Command::Install(opts) => run_phase(Phase::Install, opts),
            Command::Setup(opts) => run_phase(Phase::Setup, opts),
            Command::Test(opts) => run_test(opts),
            Command::Clean(opts) => run_phase(Phase::Clean, opts),
            Command::Distribute(opts) => run_phase(Phase::Distribute, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run install commands of selected projects, stopping at first failure.
    #[command(override_usage = "morto install [options]")]
    Install(PhaseOptions),

    /// Run setup commands of selected projects and their trigger groups.
    #[command(override_usage = "morto setup [options]")]
    Setup(PhaseOptions),

    /// Run tests of selected projects and the projects they trigger.
    #[command(override_usage = "morto test [options] [<project>/<file>]...")]
    Test(TestOptions),

    /// Run clean commands of selected projects.
    #[command(override_usage = "morto clean [options]")]
    Clean(PhaseOptions),

    /// Run distribute commands of selected projects and the projects they
    /// trigger.
    #[command(override_usage = "morto distribute [options]")]
    Distribute(PhaseOptions),
}

#[derive(Args, Clone, Debug)]
struct PhaseOptions {
    /// Run CI variant of commands instead of local variant.
    #[arg(long)]
    pub ci: bool,

    /// Only run for target project, ignoring change detection.
    #[arg(long = "onlyProject", value_name = "name")]
    pub only_project: Vec<String>,

    /// Detect changes against target revision instead of running everything.
    #[arg(long, value_name = "revision", env = "MORTO_BASE")]
    pub base: Option<String>,

    /// Path to configuration file.
    #[arg(long, value_name = "path", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct TestOptions {
    #[command(flatten)]
    pub phase: PhaseOptions,

    /// Files for file-level test runners, relative to the monorepo root.
    #[arg(value_name = "file")]
    pub files: Vec<String>,

    /// Merge JUnit XML reports of tested projects into target file.
    #[arg(long = "junitOutput", value_name = "path")]
    pub junit_output: Option<PathBuf>,

    /// Run bulk test runners too.
    #[arg(long = "runTestRunners")]
    pub run_test_runners: bool,

    /// Index of this worker among parallel workers.
    #[arg(long = "nodeIndex", value_name = "index", env = "CIRCLE_NODE_INDEX")]
    pub node_index: Option<usize>,

    /// Total number of parallel workers.
    #[arg(long = "nodeTotal", value_name = "total", env = "CIRCLE_NODE_TOTAL")]
    pub node_total: Option<usize>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            if let Err(error) = err.print() {
                error!("failed to print usage: {error}");
            }
            exit(code);
        }
    };

    match cli.run() {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

/// Loaded configuration shared by every phase.
struct Context {
    root: PathBuf,
    base_ref: String,
    registry: ProjectRegistry,
}

impl Context {
    fn load(opts: &PhaseOptions) -> Result<Self> {
        let root = env::current_dir().context("cannot determine working directory")?;
        let path = root.join(&opts.config);
        let config = read_to_string(&path)
            .with_context(|| format!("failed to read configuration at {:?}", path.display()))?
            .parse::<MonorepoConfig>()
            .with_context(|| format!("invalid configuration at {:?}", path.display()))?;

        let base_ref = config.base_ref().to_string();
        let registry = ProjectRegistry::load(config)?;

        Ok(Self {
            root,
            base_ref,
            registry,
        })
    }

    /// Projects to run target phase for.
    fn select(&self, opts: &PhaseOptions, phase: Phase) -> Result<ProjectSet> {
        let source =
            SelectionSource::resolve(&opts.only_project, opts.base.as_deref(), &self.base_ref);
        let selected = SelectionPlanner::new(&self.registry).plan(&source, phase, || {
            Git2ChangeDetector::discover(&self.root)
        })?;

        Ok(selected)
    }

    fn run(&self, selected: &ProjectSet, phase: Phase, options: RunOptions) -> RunReport {
        let executor = ShellExecutor::new(&self.root);
        PhaseRunner::new(&self.registry, executor, options).run(selected, phase)
    }
}

fn run_phase(phase: Phase, opts: PhaseOptions) -> Result<i32> {
    let context = Context::load(&opts)?;
    let selected = context.select(&opts, phase)?;
    let options = RunOptions {
        environment: Environment::from_ci_flag(opts.ci),
        ..Default::default()
    };

    let report = context.run(&selected, phase, options);
    summarize(phase, &report);

    Ok(report.exit_code())
}

fn run_test(opts: TestOptions) -> Result<i32> {
    let context = Context::load(&opts.phase)?;
    let files = FileAssignment::from_paths(&context.registry, &opts.files)?;
    let slot = WorkerSlot::from_parts(opts.node_index, opts.node_total)?;

    let selected = context.select(&opts.phase, Phase::Test)?;
    let selected = PartitionFilter::new(&context.registry).partition(&selected, slot);
    let options = RunOptions {
        environment: Environment::from_ci_flag(opts.phase.ci),
        run_test_runners: opts.run_test_runners,
        files,
    };
    let mut report = context.run(&selected, Phase::Test, options);

    match opts.junit_output.as_deref() {
        Some(output) => {
            let merger = JunitMerger::new(&context.registry, &context.root);
            if let Err(error) = merger.merge(&selected, output) {
                report.record(error);
            }
        }
        None => info!("skipping JUnit XML merging (no --junitOutput given)"),
    }
    summarize(Phase::Test, &report);

    Ok(report.exit_code())
}

fn summarize(phase: Phase, report: &RunReport) {
    if report.is_success() {
        info!("{phase} finished without failures");
        return;
    }

    for failure in &report.failures {
        error!("{failure}");
    }
    error!("{phase} finished with {} failure(s)", report.failures.len());
}
