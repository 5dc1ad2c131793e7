pub mod api_client;
pub mod commands;
pub mod config;
pub mod entry_store;
pub mod frontmatter;
pub mod local_store;
pub mod log_stream;
pub mod memory;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod supervisor;
pub mod tui;
pub mod types;

use clap::{Parser, Subcommand};

use crate::types::Classification;

#[derive(Parser)]
#[command(
    name = "brain-runner",
    version,
    about = "Task runner for AI coding agents",
    long_about = "brain-runner watches notebook projects for ready tasks and dispatches \
                  agent CLI processes under dependency and capacity constraints."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the runner loop
    Start {
        /// Run in the foreground (default)
        #[arg(short = 'f', long)]
        foreground: bool,

        /// Detach and run in the background
        #[arg(short = 'b', long, conflicts_with = "foreground")]
        background: bool,

        /// Attach the TUI dashboard
        #[arg(long)]
        tui: bool,

        /// Alias for --tui
        #[arg(long, hide = true)]
        dashboard: bool,

        /// Max parallel agents (overrides config)
        #[arg(short = 'p', long, value_name = "N")]
        max_parallel: Option<usize>,

        /// Poll interval in seconds
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,

        /// Default working directory for tasks without one
        #[arg(short = 'w', long, value_name = "PATH")]
        workdir: Option<String>,

        /// Agent CLI to spawn
        #[arg(long, value_name = "NAME")]
        agent: Option<String>,

        /// Model passed to the agent CLI
        #[arg(short = 'm', long, value_name = "NAME")]
        model: Option<String>,

        /// Log scheduling decisions without dispatching
        #[arg(long)]
        dry_run: bool,

        /// Skip tasks whose path contains PATTERN (repeatable)
        #[arg(short = 'e', long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Leave orphaned in_progress tasks untouched at startup
        #[arg(long)]
        no_resume: bool,

        /// Verbose diagnostics
        #[arg(short = 'v', long)]
        verbose: bool,
    },

    /// Stop the background runner
    Stop,

    /// Show runner status and configuration
    Status,

    /// Execute a single task by id and wait for it
    RunOne {
        /// Task id (8 lowercase alphanumerics)
        task_id: String,

        /// Agent CLI to spawn
        #[arg(long, value_name = "NAME")]
        agent: Option<String>,

        /// Model passed to the agent CLI
        #[arg(short = 'm', long, value_name = "NAME")]
        model: Option<String>,
    },

    /// List all tasks with their resolved classification
    List {
        /// Project name (defaults to all configured projects)
        project: Option<String>,
    },

    /// List only ready tasks
    Ready {
        project: Option<String>,
    },

    /// List only waiting tasks
    Waiting {
        project: Option<String>,
    },

    /// List only blocked tasks
    Blocked {
        project: Option<String>,
    },

    /// Tail the structured task logs
    Logs {
        /// Project name (defaults to all configured projects)
        project: Option<String>,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },

    /// Show the effective runner configuration
    Config {
        /// Open the config file in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },

    /// Check notebook layout, config invariants, and template integrity
    Doctor {
        /// Apply fixable repairs
        #[arg(long)]
        fix: bool,

        /// With --fix, also reset drifted templates
        #[arg(long, requires = "fix")]
        force: bool,

        /// Report intended repairs without performing them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start {
            foreground: _,
            background,
            tui,
            dashboard,
            max_parallel,
            poll_interval,
            workdir,
            agent,
            model,
            dry_run,
            exclude,
            no_resume,
            verbose,
        } => commands::start::run(commands::start::StartOptions {
            background,
            tui: tui || dashboard,
            max_parallel,
            poll_interval,
            workdir,
            agent,
            model,
            dry_run,
            exclude,
            no_resume,
            verbose,
        }),
        Command::Stop => commands::stop::run(),
        Command::Status => commands::status::run(),
        Command::RunOne {
            task_id,
            agent,
            model,
        } => commands::run_one::run(&task_id, agent.as_deref(), model.as_deref()),
        Command::List { project } => commands::list::run(project.as_deref(), None),
        Command::Ready { project } => {
            commands::list::run(project.as_deref(), Some(Classification::Ready))
        }
        Command::Waiting { project } => {
            commands::list::run(project.as_deref(), Some(Classification::Waiting))
        }
        Command::Blocked { project } => {
            commands::list::run(project.as_deref(), Some(Classification::Blocked))
        }
        Command::Logs { project, lines } => commands::logs::run(project.as_deref(), lines),
        Command::Config { edit } => commands::config::run(edit),
        Command::Doctor {
            fix,
            force,
            dry_run,
        } => commands::doctor::run(fix, force, dry_run),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
