//! Doctor command - verify the notebook layout, config invariants, and
//! template integrity, with idempotent repairs.

use std::path::Path;

use colored::Colorize;
use sha2::{Digest, Sha256};

use crate::config::{
    brain_dir, database_path, notebook_config_path, runner_config_path, templates_dir,
};

/// Reference notebook config written by `--fix` when missing.
const REFERENCE_NOTEBOOK_CONFIG: &str = "id-length = 8\nid-charset = \"alphanum\"\n";

/// Reference templates, keyed by entry type.
const TEMPLATES: &[(&str, &str)] = &[
    (
        "task",
        "---\ntitle: \"\"\nstatus: draft\npriority: medium\ntags:\n  - task\n---\n\n## Goal\n\n## Notes\n",
    ),
    (
        "note",
        "---\ntitle: \"\"\nstatus: draft\ntags:\n  - note\n---\n\n",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

/// What `--fix` would do for a failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Repair {
    /// No automatic repair exists.
    None,
    /// Applied by plain `--fix`.
    Fix(String),
    /// Content drift; rewritten only with `--fix --force`.
    ForceFix(String),
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    required: bool,
    repair: Repair,
}

fn format_result(result: &CheckResult) -> String {
    let icon = match result.status {
        CheckStatus::Pass => "✓".green().to_string(),
        CheckStatus::Fail => "✗".red().to_string(),
        CheckStatus::Warn => "!".yellow().to_string(),
    };
    let required_suffix = if result.required {
        String::new()
    } else {
        " (optional)".dimmed().to_string()
    };
    let message = match result.status {
        CheckStatus::Fail => result.message.red().to_string(),
        _ => result.message.clone(),
    };
    format!("  {} {}: {}{}", icon, result.name, message, required_suffix)
}

fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn check_notebook_dir(base: &Path) -> CheckResult {
    if base.is_dir() {
        CheckResult {
            name: "Notebook directory".into(),
            status: CheckStatus::Pass,
            message: format!("Found at {}", base.display()),
            required: true,
            repair: Repair::None,
        }
    } else {
        CheckResult {
            name: "Notebook directory".into(),
            status: CheckStatus::Fail,
            message: format!("Not found at {}", base.display()),
            required: true,
            repair: Repair::Fix(format!("create {}", base.display())),
        }
    }
}

fn check_notebook_config(base: &Path) -> CheckResult {
    let path = notebook_config_path(base);
    let name = "Notebook config".to_string();
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => {
            return CheckResult {
                name,
                status: CheckStatus::Fail,
                message: format!("Not found at {}", path.display()),
                required: true,
                repair: Repair::Fix(format!("write reference config to {}", path.display())),
            }
        }
    };
    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            return CheckResult {
                name,
                status: CheckStatus::Fail,
                message: format!("Parse error: {e}"),
                required: true,
                repair: Repair::None,
            }
        }
    };

    let id_length = value.get("id-length").and_then(|v| v.as_integer());
    let id_charset = value.get("id-charset").and_then(|v| v.as_str());
    let mut problems = Vec::new();
    if id_length != Some(8) {
        problems.push(format!("id-length = {id_length:?}, expected 8"));
    }
    if id_charset != Some("alphanum") {
        problems.push(format!("id-charset = {id_charset:?}, expected \"alphanum\""));
    }

    if problems.is_empty() {
        CheckResult {
            name,
            status: CheckStatus::Pass,
            message: "id-length = 8, id-charset = \"alphanum\"".into(),
            required: true,
            repair: Repair::None,
        }
    } else {
        // Invariant drift in a live notebook is not auto-repaired: ids in
        // existing entries would stop matching.
        CheckResult {
            name,
            status: CheckStatus::Fail,
            message: problems.join("; "),
            required: true,
            repair: Repair::None,
        }
    }
}

fn check_template(base: &Path, kind: &str, reference: &str) -> CheckResult {
    let path = templates_dir(base).join(format!("{kind}.md"));
    let name = format!("Template {kind}.md");
    match std::fs::read_to_string(&path) {
        Err(_) => CheckResult {
            name,
            status: CheckStatus::Fail,
            message: format!("Not found at {}", path.display()),
            required: true,
            repair: Repair::Fix(format!("write reference template to {}", path.display())),
        },
        Ok(content) if sha256_hex(&content) == sha256_hex(reference) => CheckResult {
            name,
            status: CheckStatus::Pass,
            message: "Matches reference".into(),
            required: true,
            repair: Repair::None,
        },
        Ok(_) => CheckResult {
            name,
            status: CheckStatus::Warn,
            message: "Content drifted from reference".into(),
            required: false,
            repair: Repair::ForceFix(format!("reset {} to reference", path.display())),
        },
    }
}

fn check_database(base: &Path) -> CheckResult {
    let path = database_path(base);
    let name = "Database".to_string();
    if !path.exists() {
        return CheckResult {
            name,
            status: CheckStatus::Fail,
            message: format!("Not found at {}", path.display()),
            required: true,
            repair: Repair::Fix(format!("initialize {}", path.display())),
        };
    }
    match trivial_query(&path) {
        Ok(()) => CheckResult {
            name,
            status: CheckStatus::Pass,
            message: "Responds to queries".into(),
            required: true,
            repair: Repair::None,
        },
        Err(e) => CheckResult {
            name,
            status: CheckStatus::Fail,
            message: format!("Query failed: {e}"),
            required: true,
            repair: Repair::None,
        },
    }
}

fn trivial_query(path: &Path) -> Result<(), rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
    debug_assert_eq!(one, 1);
    Ok(())
}

fn check_permissions(base: &Path) -> CheckResult {
    let name = "Base directory permissions".to_string();
    if !base.is_dir() {
        return CheckResult {
            name,
            status: CheckStatus::Fail,
            message: "Notebook directory missing".into(),
            required: true,
            repair: Repair::None,
        };
    }
    let probe = base.join(".doctor-probe");
    match std::fs::write(&probe, b"probe").and_then(|()| std::fs::remove_file(&probe)) {
        Ok(()) => CheckResult {
            name,
            status: CheckStatus::Pass,
            message: "Read and write OK".into(),
            required: true,
            repair: Repair::None,
        },
        Err(e) => CheckResult {
            name,
            status: CheckStatus::Fail,
            message: format!("Cannot write: {e}"),
            required: true,
            repair: Repair::None,
        },
    }
}

fn check_runner_config(base: &Path) -> CheckResult {
    let path = runner_config_path(base);
    let name = "Runner config".to_string();
    if !path.exists() {
        return CheckResult {
            name,
            status: CheckStatus::Warn,
            message: format!("Not found at {} (defaults apply)", path.display()),
            required: false,
            repair: Repair::None,
        };
    }
    match crate::config::read_config(&path) {
        Ok(_) => CheckResult {
            name,
            status: CheckStatus::Pass,
            message: format!("Valid at {}", path.display()),
            required: false,
            repair: Repair::None,
        },
        Err(e) => CheckResult {
            name,
            status: CheckStatus::Fail,
            message: format!("{e}"),
            required: true,
            repair: Repair::None,
        },
    }
}

fn check_agent_cli(agent: &str) -> CheckResult {
    let name = format!("Agent CLI ({agent})");
    if which::which(agent).is_ok() {
        CheckResult {
            name,
            status: CheckStatus::Pass,
            message: "Installed".into(),
            required: false,
            repair: Repair::None,
        }
    } else {
        CheckResult {
            name,
            status: CheckStatus::Warn,
            message: "Not found in PATH".into(),
            required: false,
            repair: Repair::None,
        }
    }
}

fn run_checks(base: &Path, agent: &str) -> Vec<CheckResult> {
    let mut results = vec![
        check_notebook_dir(base),
        check_notebook_config(base),
    ];
    for (kind, reference) in TEMPLATES {
        results.push(check_template(base, kind, reference));
    }
    results.push(check_database(base));
    results.push(check_permissions(base));
    results.push(check_runner_config(base));
    results.push(check_agent_cli(agent));
    results
}

/// Apply the repairs the flags allow. Returns descriptions of actions
/// performed (or that would be performed under `--dry-run`).
fn apply_repairs(
    base: &Path,
    results: &[CheckResult],
    force: bool,
    dry_run: bool,
) -> std::io::Result<Vec<String>> {
    let mut actions = Vec::new();
    for result in results {
        let action = match (&result.repair, force) {
            (Repair::Fix(action), _) => action.clone(),
            (Repair::ForceFix(action), true) => action.clone(),
            _ => continue,
        };
        actions.push(action);
        if dry_run {
            continue;
        }
        repair_one(base, result)?;
    }
    Ok(actions)
}

fn repair_one(base: &Path, result: &CheckResult) -> std::io::Result<()> {
    match result.name.as_str() {
        "Notebook directory" => std::fs::create_dir_all(base),
        "Notebook config" => {
            std::fs::create_dir_all(base)?;
            std::fs::write(notebook_config_path(base), REFERENCE_NOTEBOOK_CONFIG)
        }
        "Database" => {
            std::fs::create_dir_all(base)?;
            trivial_query(&database_path(base))
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(())
        }
        name => {
            // Template reset/creation.
            if let Some(kind) = name.strip_prefix("Template ").and_then(|n| n.strip_suffix(".md")) {
                if let Some((_, reference)) = TEMPLATES.iter().find(|(k, _)| *k == kind) {
                    let dir = templates_dir(base);
                    std::fs::create_dir_all(&dir)?;
                    return std::fs::write(dir.join(format!("{kind}.md")), reference);
                }
            }
            Ok(())
        }
    }
}

pub fn run(fix: bool, force: bool, dry_run: bool) -> anyhow::Result<()> {
    let base = brain_dir();
    let agent = crate::config::read_config_with_env(&runner_config_path(&base))
        .map(|c| c.agent)
        .unwrap_or_else(|_| "claude".to_string());

    println!("{}", "\nRunner Doctor\n".bold());
    println!("Notebook: {}\n", base.display());

    let mut results = run_checks(&base, &agent);
    for result in &results {
        println!("{}", format_result(result));
    }

    if fix || dry_run {
        let actions = apply_repairs(&base, &results, force, dry_run)?;
        if actions.is_empty() {
            println!("\n{}", "Nothing to repair.".dimmed());
        } else {
            let verb = if dry_run { "Would repair" } else { "Repaired" };
            println!("\n{}:", verb.bold());
            for action in &actions {
                println!("  - {action}");
            }
        }
        if !dry_run && !actions.is_empty() {
            // Re-run so the summary reflects the repaired state.
            results = run_checks(&base, &agent);
        }
    }

    let failed = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail && r.required)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();

    println!();
    if failed > 0 {
        eprintln!("{}", format!("✗ {failed} required check(s) failed").red());
        if !fix {
            eprintln!("{}", "  Run 'brain-runner doctor --fix' to repair\n".dimmed());
        }
        std::process::exit(1);
    } else if warnings > 0 {
        println!("{}", format!("! All required checks passed, {warnings} warning(s)").yellow());
    } else {
        println!("{}", "✓ All checks passed.\n".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_notebook() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
        std::fs::write(notebook_config_path(base), REFERENCE_NOTEBOOK_CONFIG).unwrap();
        let dir = templates_dir(base);
        std::fs::create_dir_all(&dir).unwrap();
        for (kind, reference) in TEMPLATES {
            std::fs::write(dir.join(format!("{kind}.md")), reference).unwrap();
        }
        trivial_query(&database_path(base)).unwrap();
        tmp
    }

    fn failed_count(results: &[CheckResult]) -> usize {
        results
            .iter()
            .filter(|r| r.status == CheckStatus::Fail && r.required)
            .count()
    }

    #[test]
    fn test_healthy_notebook_passes() {
        let tmp = healthy_notebook();
        let results = run_checks(tmp.path(), "definitely-not-a-real-binary");
        assert_eq!(failed_count(&results), 0);
    }

    #[test]
    fn test_empty_notebook_fails_then_fix_repairs() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("notebook");

        let results = run_checks(&base, "x");
        assert!(failed_count(&results) > 0);

        let actions = apply_repairs(&base, &results, false, false).unwrap();
        assert!(!actions.is_empty());

        // Idempotent: everything required now passes, nothing left to fix.
        let results = run_checks(&base, "x");
        assert_eq!(failed_count(&results), 0);
        let actions = apply_repairs(&base, &results, false, false).unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_dry_run_reports_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("notebook");
        let results = run_checks(&base, "x");
        let actions = apply_repairs(&base, &results, false, true).unwrap();
        assert!(!actions.is_empty());
        assert!(!base.exists(), "dry-run must not create anything");
    }

    #[test]
    fn test_config_invariant_violation_is_not_fixable() {
        let tmp = healthy_notebook();
        std::fs::write(
            notebook_config_path(tmp.path()),
            "id-length = 12\nid-charset = \"hex\"\n",
        )
        .unwrap();
        let results = run_checks(tmp.path(), "x");
        let config_check = results
            .iter()
            .find(|r| r.name == "Notebook config")
            .unwrap();
        assert_eq!(config_check.status, CheckStatus::Fail);
        assert_eq!(config_check.repair, Repair::None);
        assert!(config_check.message.contains("id-length"));
        assert!(config_check.message.contains("id-charset"));
    }

    #[test]
    fn test_template_drift_needs_force() {
        let tmp = healthy_notebook();
        let task_template = templates_dir(tmp.path()).join("task.md");
        std::fs::write(&task_template, "---\ntitle: drifted\n---\n").unwrap();

        let results = run_checks(tmp.path(), "x");
        let template_check = results
            .iter()
            .find(|r| r.name == "Template task.md")
            .unwrap();
        assert_eq!(template_check.status, CheckStatus::Warn);

        // Plain fix leaves drifted content alone.
        let actions = apply_repairs(tmp.path(), &results, false, false).unwrap();
        assert!(actions.is_empty());
        assert!(std::fs::read_to_string(&task_template)
            .unwrap()
            .contains("drifted"));

        // Force resets to the reference.
        let actions = apply_repairs(tmp.path(), &results, true, false).unwrap();
        assert_eq!(actions.len(), 1);
        let content = std::fs::read_to_string(&task_template).unwrap();
        assert_eq!(sha256_hex(&content), sha256_hex(TEMPLATES[0].1));
    }

    #[test]
    fn test_database_check_catches_garbage() {
        let tmp = healthy_notebook();
        std::fs::write(database_path(tmp.path()), b"not a database").unwrap();
        let results = run_checks(tmp.path(), "x");
        let db_check = results.iter().find(|r| r.name == "Database").unwrap();
        assert_eq!(db_check.status, CheckStatus::Fail);
    }

    #[test]
    fn test_sha256_hex_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
