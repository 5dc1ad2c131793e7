//! Run-one command - dispatch a single task by id and wait for its outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::api_client::ApiClient;
use crate::config::{brain_dir, runner_config_path};
use crate::entry_store::EntryStore;
use crate::local_store::LocalStore;
use crate::log_stream::LogStream;
use crate::resolver::{resolve, ResolveOptions};
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::types::{Classification, Outcome};

pub fn run(task_id: &str, agent_override: Option<&str>, model_override: Option<&str>) -> Result<()> {
    let base = brain_dir();
    let mut config = crate::config::read_config_with_env(&runner_config_path(&base))?;
    if let Some(agent) = agent_override {
        config.agent = agent.to_string();
    }
    if let Some(model) = model_override {
        config.model = Some(model.to_string());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let store: Arc<EntryStore> = Arc::new(match config.api_base() {
            Some(url) => EntryStore::Http(ApiClient::new(
                url,
                Duration::from_secs(config.store_timeout_secs),
            )?),
            None => EntryStore::Local(LocalStore::new(base.clone())),
        });
        let logs = Arc::new(LogStream::new(Some(base.clone()), 256, config.log_buffer));

        let home = crate::config::home_dir();
        let default_workdir = config
            .default_workdir
            .as_deref()
            .map(|raw| crate::resolver::join_home(&home, raw));
        let opts = ResolveOptions {
            home,
            default_workdir: default_workdir.clone(),
        };

        // Find the task in any configured project.
        let mut found = None;
        for project in &config.projects {
            let tasks = match store.list(&project.name).await {
                Ok(tasks) => tasks,
                Err(_) => continue,
            };
            let graph = resolve(&tasks, &opts);
            if let Some(task) = graph.get(task_id) {
                found = Some(task.clone());
                break;
            }
        }
        let task = found.with_context(|| format!("task {task_id} not found in any project"))?;

        if task.classification != Classification::Ready {
            bail!(
                "task {task_id} is {} ({}), not ready",
                task.classification,
                task.blocked_by_reason.as_deref().unwrap_or("dependencies unsettled")
            );
        }

        println!(
            "{}",
            format!("Running {}: {}", task.id(), task.task.title).blue()
        );

        // Echo the agent's output while we wait.
        let mut subscriber = logs.subscribe();
        let echo = tokio::spawn(async move {
            while let Some(record) = subscriber.recv().await {
                if record.task_id.is_some() {
                    println!("{}", record.message);
                }
            }
        });

        let (supervisor, mut exits) = Supervisor::new(
            SupervisorConfig {
                agent: config.agent.clone(),
                model: config.model.clone(),
                task_timeout: Duration::from_secs(config.task_timeout_secs),
                cancel_grace: Duration::from_secs(config.cancel_grace_secs),
                default_workdir,
                outcome_dir: std::env::temp_dir().join("brain-runner"),
            },
            store,
            logs.clone(),
        );

        supervisor.launch(&task).await?;
        let exit = exits.recv().await.context("supervisor exited unexpectedly")?;
        echo.abort();

        match exit.outcome {
            Outcome::Completed => {
                println!("{}", format!("✓ {task_id} completed").green());
                Ok(())
            }
            Outcome::Blocked { reason } => {
                bail!("task {task_id} blocked: {reason}");
            }
            Outcome::Cancelled => {
                bail!("task {task_id} cancelled");
            }
        }
    })
}
