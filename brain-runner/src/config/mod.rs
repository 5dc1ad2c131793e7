pub mod error;
pub mod loader;
pub mod paths;

pub use error::ConfigError;
pub use loader::{config_exists, read_config, read_config_with_env, validate_config, write_config};
pub use paths::{
    brain_dir, database_path, editor, home_dir, notebook_config_path, pidfile_path,
    project_log_path, project_task_dir, runner_config_path, templates_dir,
};
