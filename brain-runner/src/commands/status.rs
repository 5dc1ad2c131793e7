//! Status command - report whether the runner is up and what it watches.

use anyhow::Result;
use colored::Colorize;

use crate::commands::start::read_live_pid;
use crate::config::{brain_dir, pidfile_path, runner_config_path};

pub fn run() -> Result<()> {
    let base = brain_dir();
    let config = crate::config::read_config_with_env(&runner_config_path(&base))?;

    println!("Notebook: {}", base.display());
    match read_live_pid(&pidfile_path(&base)) {
        Some(pid) => println!("Runner:   {} (pid {pid})", "running".green()),
        None => println!("Runner:   {}", "stopped".red()),
    }
    match config.api_base() {
        Some(url) => println!("Store:    {url}"),
        None => println!("Store:    local ({})", base.display()),
    }
    println!(
        "Limits:   {} parallel, poll every {}s",
        config.max_parallel, config.poll_interval_secs
    );

    if config.projects.is_empty() {
        println!("Projects: {}", "none configured".yellow());
    } else {
        println!("Projects:");
        for project in &config.projects {
            match project.limit {
                Some(limit) => println!("  - {} (limit {limit})", project.name),
                None => println!("  - {}", project.name),
            }
        }
    }
    Ok(())
}
