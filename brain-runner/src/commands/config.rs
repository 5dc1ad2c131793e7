//! Config command - show the effective runner configuration.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::{brain_dir, editor, runner_config_path};

pub fn run(edit: bool) -> Result<()> {
    let base = brain_dir();
    let path = runner_config_path(&base);

    if edit {
        let status = std::process::Command::new(editor())
            .arg(&path)
            .status()
            .context("launching editor")?;
        if !status.success() {
            anyhow::bail!("editor exited with {status}");
        }
        // Validate what the user saved.
        crate::config::read_config_with_env(&path)?;
        println!("{}", "Config saved and valid.".green());
        return Ok(());
    }

    let config = crate::config::read_config_with_env(&path)?;
    if path.exists() {
        println!("{}", format!("Config: {}", path.display()).dimmed());
    } else {
        println!(
            "{}",
            format!("Config: {} (not found, showing defaults)", path.display()).yellow()
        );
    }
    println!();
    print!("{}", serde_yaml::to_string(&config)?);

    let overrides: Vec<&str> = [
        "BRAIN_DIR",
        "BRAIN_API_URL",
        "BRAIN_API_PORT",
        "BRAIN_MAX_PARALLEL",
        "BRAIN_POLL_INTERVAL",
    ]
    .into_iter()
    .filter(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
    .collect();
    if !overrides.is_empty() {
        println!();
        println!(
            "{}",
            format!("Active environment overrides: {}", overrides.join(", ")).dimmed()
        );
    }
    Ok(())
}
