//! Logs command - tail the per-project JSONL log files.

use anyhow::Result;
use colored::Colorize;

use crate::config::{brain_dir, project_log_path, runner_config_path};
use crate::log_stream::LogRecord;
use crate::types::LogLevel;

pub fn run(project: Option<&str>, lines: usize) -> Result<()> {
    let base = brain_dir();
    let config = crate::config::read_config_with_env(&runner_config_path(&base))?;

    let projects: Vec<String> = match project {
        Some(name) => vec![name.to_string()],
        None => config.projects.iter().map(|p| p.name.clone()).collect(),
    };

    let mut records: Vec<LogRecord> = Vec::new();
    for name in &projects {
        let path = project_log_path(&base, name);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        for line in content.lines() {
            match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => records.push(record),
                Err(_) => continue, // tolerate partial trailing writes
            }
        }
    }

    if records.is_empty() {
        eprintln!("{}", "No log entries found.".yellow());
        return Ok(());
    }

    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let start = records.len().saturating_sub(lines);
    for record in &records[start..] {
        println!("{}", render(record));
    }
    Ok(())
}

fn render(record: &LogRecord) -> String {
    let level = match record.level {
        LogLevel::Error => "ERROR".red().to_string(),
        LogLevel::Warn => "WARN ".yellow().to_string(),
        LogLevel::Info => "INFO ".normal().to_string(),
        LogLevel::Debug => "DEBUG".dimmed().to_string(),
    };
    let task = record
        .task_id
        .as_deref()
        .map(|id| format!("[{id}] "))
        .unwrap_or_default();
    let project = record
        .project_id
        .as_deref()
        .map(|p| format!("{p} "))
        .unwrap_or_default();
    format!(
        "{} {level} {}{}{}",
        record.timestamp.dimmed(),
        project.dimmed(),
        task,
        record.message
    )
}
