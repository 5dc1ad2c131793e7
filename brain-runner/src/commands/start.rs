//! Start command - bring up the runner loop, optionally with the TUI
//! dashboard attached, in the foreground or as a background process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::api_client::ApiClient;
use crate::config::{brain_dir, pidfile_path, runner_config_path};
use crate::entry_store::EntryStore;
use crate::local_store::LocalStore;
use crate::log_stream::LogStream;
use crate::memory::SystemMemory;
use crate::resolver::ResolveOptions;
use crate::runner::Runner;
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::tui;
use crate::types::RunnerConfig;

pub struct StartOptions {
    pub background: bool,
    pub tui: bool,
    pub max_parallel: Option<usize>,
    pub poll_interval: Option<u64>,
    pub workdir: Option<String>,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub dry_run: bool,
    pub exclude: Vec<String>,
    pub no_resume: bool,
    pub verbose: bool,
}

pub fn run(options: StartOptions) -> Result<()> {
    let base = brain_dir();
    let mut config = crate::config::read_config_with_env(&runner_config_path(&base))
        .context("reading runner config")?;
    apply_cli_overrides(&mut config, &options);

    if config.projects.is_empty() {
        bail!("no projects configured; add them to {}", runner_config_path(&base).display());
    }
    preflight(&base)?;

    if options.background {
        return spawn_background(&base, &options);
    }

    init_tracing(&base, options.verbose, options.tui)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_runner(base, config, options))
}

fn apply_cli_overrides(config: &mut RunnerConfig, options: &StartOptions) {
    if let Some(parallel) = options.max_parallel {
        config.max_parallel = parallel;
    }
    if let Some(interval) = options.poll_interval {
        config.poll_interval_secs = interval.max(1);
    }
    if let Some(ref workdir) = options.workdir {
        config.default_workdir = Some(workdir.clone());
    }
    if let Some(ref agent) = options.agent {
        config.agent = agent.clone();
    }
    if let Some(ref model) = options.model {
        config.model = Some(model.clone());
    }
    for pattern in &options.exclude {
        config.exclude.push(pattern.clone());
    }
    if options.no_resume {
        config.resume = false;
    }
}

/// Re-exec ourselves detached and record the child pid.
fn spawn_background(base: &std::path::Path, options: &StartOptions) -> Result<()> {
    let pidfile = pidfile_path(base);
    if let Some(pid) = read_live_pid(&pidfile) {
        bail!("runner already running (pid {pid})");
    }

    let exe = std::env::current_exe().context("locating own executable")?;
    let mut command = std::process::Command::new(exe);
    command.arg("start").arg("--foreground");
    if options.dry_run {
        command.arg("--dry-run");
    }
    if options.no_resume {
        command.arg("--no-resume");
    }
    if options.verbose {
        command.arg("--verbose");
    }
    for pattern in &options.exclude {
        command.arg("--exclude").arg(pattern);
    }
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    let child = command.spawn().context("spawning background runner")?;
    std::fs::create_dir_all(base)?;
    std::fs::write(&pidfile, child.id().to_string())?;
    println!(
        "{}",
        format!("Runner started in background (pid {})", child.id()).green()
    );
    Ok(())
}

async fn run_runner(base: PathBuf, config: RunnerConfig, options: StartOptions) -> Result<()> {
    let pidfile = pidfile_path(&base);
    if let Some(pid) = read_live_pid(&pidfile) {
        // A background parent records our own pid before we get here.
        if pid != std::process::id() {
            bail!("runner already running (pid {pid})");
        }
    }
    std::fs::create_dir_all(&base)?;
    std::fs::write(&pidfile, std::process::id().to_string())?;

    let store: Arc<EntryStore> = Arc::new(match config.api_base() {
        Some(url) => EntryStore::Http(ApiClient::new(
            url,
            Duration::from_secs(config.store_timeout_secs),
        )?),
        None => EntryStore::Local(LocalStore::new(base.clone())),
    });

    let logs = Arc::new(LogStream::new(
        Some(base.clone()),
        config.log_buffer.max(64),
        config.log_buffer,
    ));

    let home = crate::config::home_dir();
    let default_workdir = config
        .default_workdir
        .as_deref()
        .map(|raw| crate::resolver::join_home(&home, raw));
    let resolve_opts = ResolveOptions {
        home,
        default_workdir: default_workdir.clone(),
    };

    let (supervisor, exit_rx) = Supervisor::new(
        SupervisorConfig {
            agent: config.agent.clone(),
            model: config.model.clone(),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            cancel_grace: Duration::from_secs(config.cancel_grace_secs),
            default_workdir,
            outcome_dir: std::env::temp_dir().join("brain-runner"),
        },
        store.clone(),
        logs.clone(),
    );

    let tui_config = config.tui.clone();
    let log_buffer = config.log_buffer;
    let (runner, handle) = Runner::new(
        config,
        store,
        supervisor,
        exit_rx,
        logs.clone(),
        Arc::new(SystemMemory),
        resolve_opts,
        options.dry_run,
    );

    let result = if options.tui {
        let runner_task = tokio::spawn(runner.run());
        let dashboard = tokio::task::block_in_place(|| {
            tui::run_dashboard(handle, logs, &tui_config, base.clone(), log_buffer)
        });
        runner_task.await.ok();
        dashboard
    } else {
        println!("{}", "Runner started. Ctrl-C to stop.".dimmed());
        runner.run().await;
        Ok(())
    };

    let _ = std::fs::remove_file(&pidfile);
    result
}

/// Refuse to start against a notebook whose config invariants are broken;
/// ids would stop matching entry filenames. Absent config is fine (the
/// store may not be initialised yet).
fn preflight(base: &std::path::Path) -> Result<()> {
    let path = crate::config::notebook_config_path(base);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(());
    };
    let value: toml::Value = toml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    let id_length = value.get("id-length").and_then(|v| v.as_integer());
    let id_charset = value.get("id-charset").and_then(|v| v.as_str());
    if id_length != Some(8) || id_charset != Some("alphanum") {
        bail!(
            "notebook config invariants violated in {} (run 'brain-runner doctor')",
            path.display()
        );
    }
    Ok(())
}

/// Read the pidfile and return the pid only if that process is alive.
pub fn read_live_pid(pidfile: &std::path::Path) -> Option<u32> {
    let pid: u32 = std::fs::read_to_string(pidfile).ok()?.trim().parse().ok()?;
    let alive = unsafe { libc::kill(pid as i32, 0) } == 0;
    if alive {
        Some(pid)
    } else {
        None
    }
}

fn init_tracing(base: &std::path::Path, verbose: bool, tui_mode: bool) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    if tui_mode {
        // Diagnostics to a file so the alternate screen stays clean.
        let log_dir = base.join("logs").join("brain-runner");
        std::fs::create_dir_all(&log_dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("runner.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_apply() {
        let mut config = RunnerConfig::default();
        let options = StartOptions {
            background: false,
            tui: false,
            max_parallel: Some(7),
            poll_interval: Some(0),
            workdir: Some("~/src".to_string()),
            agent: Some("opencode".to_string()),
            model: Some("sonnet".to_string()),
            dry_run: false,
            exclude: vec!["archive/".to_string()],
            no_resume: true,
            verbose: false,
        };
        apply_cli_overrides(&mut config, &options);
        assert_eq!(config.max_parallel, 7);
        assert_eq!(config.poll_interval_secs, 1, "zero interval clamps to 1");
        assert_eq!(config.agent, "opencode");
        assert_eq!(config.model.as_deref(), Some("sonnet"));
        assert_eq!(config.exclude, vec!["archive/"]);
        assert!(!config.resume);
    }

    #[test]
    fn test_preflight_checks_notebook_invariants() {
        let tmp = tempfile::tempdir().unwrap();
        // No notebook config yet: fine, the store may not be initialised.
        assert!(preflight(tmp.path()).is_ok());

        std::fs::write(
            tmp.path().join("config.toml"),
            "id-length = 8\nid-charset = \"alphanum\"\n",
        )
        .unwrap();
        assert!(preflight(tmp.path()).is_ok());

        std::fs::write(tmp.path().join("config.toml"), "id-length = 12\n").unwrap();
        assert!(preflight(tmp.path()).is_err());
    }

    #[test]
    fn test_read_live_pid_rejects_dead_and_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let pidfile = tmp.path().join("runner.pid");

        assert!(read_live_pid(&pidfile).is_none());

        std::fs::write(&pidfile, "not-a-pid").unwrap();
        assert!(read_live_pid(&pidfile).is_none());

        // Our own pid is certainly alive.
        std::fs::write(&pidfile, std::process::id().to_string()).unwrap();
        assert_eq!(read_live_pid(&pidfile), Some(std::process::id()));
    }
}
