//! Markdown + YAML frontmatter codec for notebook entries.
//!
//! An entry is a markdown file whose leading `---` block carries the task
//! fields. The id is derived from the filename (8 lowercase alphanumerics);
//! the body is opaque to the runner.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{EntryStatus, Priority, Task};

/// YAML frontmatter fields recognised by the runner. Unknown keys are
/// preserved on rewrite via `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

/// A parsed entry: frontmatter plus the raw markdown body.
#[derive(Debug, Clone)]
pub struct Entry {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Validate an id: exactly 8 lowercase alphanumerics.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 8
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Derive the entry id from its file path.
pub fn id_from_path(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("No file stem in {}", path.display()))?;
    if !is_valid_id(stem) {
        bail!("Invalid entry id '{stem}': expected 8 lowercase alphanumerics");
    }
    Ok(stem.to_string())
}

/// Split raw file content into frontmatter YAML and body.
fn split(content: &str) -> Result<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .context("Entry has no frontmatter delimiter")?;
    if let Some(end) = rest.find("\n---\n") {
        return Ok((&rest[..end], rest[end + 5..].trim_start_matches('\n')));
    }
    if let Some(end) = rest.find("\n---\r\n") {
        return Ok((&rest[..end], rest[end + 6..].trim_start_matches('\n')));
    }
    if let Some(yaml) = rest.strip_suffix("\n---") {
        return Ok((yaml, ""));
    }
    bail!("Unterminated frontmatter block")
}

/// Parse raw file content into an entry.
pub fn parse(content: &str) -> Result<Entry> {
    let (yaml, body) = split(content)?;
    let frontmatter: Frontmatter =
        serde_yaml::from_str(yaml).context("Invalid frontmatter YAML")?;
    Ok(Entry {
        frontmatter,
        body: body.to_string(),
    })
}

/// Render an entry back to file content.
pub fn render(entry: &Entry) -> Result<String> {
    let yaml = serde_yaml::to_string(&entry.frontmatter)?;
    Ok(format!("---\n{yaml}---\n\n{}", entry.body))
}

/// Build a `Task` from a parsed entry and its location.
pub fn to_task(id: &str, rel_path: &str, project: &str, entry: &Entry) -> Task {
    let fm = &entry.frontmatter;
    Task {
        id: id.to_string(),
        path: rel_path.to_string(),
        project: project.to_string(),
        title: fm.title.clone(),
        status: fm.status,
        priority: fm.priority,
        feature_id: fm.feature_id.clone(),
        parent_id: fm.parent_id.clone(),
        depends_on: fm.depends_on.clone(),
        workdir: fm.workdir.clone(),
        worktree: fm.worktree.clone(),
        git_remote: fm.git_remote.clone(),
        git_branch: fm.git_branch.clone(),
        tags: fm.tags.clone(),
        created: fm.created.clone(),
        content: entry.body.clone(),
    }
}

/// Rewrite only the status field, preserving everything else.
pub fn set_status(content: &str, status: EntryStatus) -> Result<String> {
    let mut entry = parse(content)?;
    entry.frontmatter.status = status;
    render(&entry)
}

/// Append a timestamped note section to the body.
pub fn append_note(content: &str, note: &str) -> Result<String> {
    let mut entry = parse(content)?;
    let stamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    if !entry.body.is_empty() && !entry.body.ends_with('\n') {
        entry.body.push('\n');
    }
    entry.body.push_str(&format!("\n## Note ({stamp})\n\n{note}\n"));
    render(&entry)
}
