//! List command family - print resolved tasks, optionally filtered by
//! classification (`list`, `ready`, `waiting`, `blocked`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use crate::api_client::ApiClient;
use crate::config::{brain_dir, runner_config_path};
use crate::entry_store::EntryStore;
use crate::local_store::LocalStore;
use crate::resolver::{resolve, ResolveOptions};
use crate::types::{Classification, ResolvedTask};

pub fn run(project: Option<&str>, filter: Option<Classification>) -> Result<()> {
    let base = brain_dir();
    let config = crate::config::read_config_with_env(&runner_config_path(&base))?;

    let store: Arc<EntryStore> = Arc::new(match config.api_base() {
        Some(url) => EntryStore::Http(ApiClient::new(
            url,
            Duration::from_secs(config.store_timeout_secs),
        )?),
        None => EntryStore::Local(LocalStore::new(base.clone())),
    });

    let projects: Vec<String> = match project {
        Some(name) => vec![name.to_string()],
        None => config.projects.iter().map(|p| p.name.clone()).collect(),
    };
    if projects.is_empty() {
        eprintln!("{}", "No projects configured.".yellow());
        return Ok(());
    }

    let home = crate::config::home_dir();
    let opts = ResolveOptions {
        default_workdir: config
            .default_workdir
            .as_deref()
            .map(|raw| crate::resolver::join_home(&home, raw)),
        home,
    };

    // Fetch every project in one round trip's worth of wall time.
    let runtime = tokio::runtime::Runtime::new()?;
    let listings = runtime.block_on(futures::future::join_all(
        projects.iter().map(|name| store.list(name)),
    ));

    for (name, listed) in projects.iter().zip(listings) {
        let tasks = match listed {
            Ok(tasks) => tasks,
            Err(e) => {
                eprintln!("{}", format!("{name}: {e}").red());
                continue;
            }
        };
        let graph = resolve(&tasks, &opts);

        println!(
            "{} {}",
            name.bold(),
            format!(
                "({} ready, {} waiting, {} blocked, {} done of {})",
                graph.stats.ready,
                graph.stats.waiting,
                graph.stats.blocked,
                graph.stats.completed,
                graph.stats.total
            )
            .dimmed()
        );
        for task in &graph.tasks {
            if let Some(wanted) = filter {
                if task.classification != wanted {
                    continue;
                }
            }
            println!("{}", render_row(task));
        }
        println!();
    }
    Ok(())
}

fn render_row(task: &ResolvedTask) -> String {
    let label = format!(
        "  {} {} [{}] {}",
        task.id(),
        task.task.title,
        task.task.priority,
        task.classification
    );
    let line = match task.classification {
        Classification::Ready => label.cyan().to_string(),
        Classification::Completed => label.green().to_string(),
        Classification::Blocked => label.red().to_string(),
        Classification::Waiting => label.dimmed().to_string(),
    };
    let mut detail = String::new();
    if let Some(ref reason) = task.blocked_by_reason {
        detail = format!(" ({reason})").dimmed().to_string();
    } else if !task.waiting_on.is_empty() {
        detail = format!(" (waiting on {})", task.waiting_on.join(", "))
            .dimmed()
            .to_string();
    } else if !task.blocked_by.is_empty() {
        detail = format!(" (blocked by {})", task.blocked_by.join(", "))
            .dimmed()
            .to_string();
    }
    format!("{line}{detail}")
}
