use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE_NAME};
use crate::error::{BugLocatorError, Result};

use super::resolve_work_dir;

/// Options for the `init` command.
pub struct InitOptions {
    pub root: PathBuf,
    pub config_path: Option<PathBuf>,
    pub force: bool,
}

/// Result of a successful `init` operation.
#[derive(Debug)]
pub struct InitResult {
    pub config_path: PathBuf,
    pub work_dir: PathBuf,
    pub created_work_dir: bool,
}

/// Run the init command: write a default config and create the work directory.
pub fn run(options: InitOptions) -> Result<InitResult> {
    if !options.root.exists() {
        return Err(BugLocatorError::invalid_path(
            options.root.display().to_string(),
            "directory does not exist",
        ));
    }
    if !options.root.is_dir() {
        return Err(BugLocatorError::invalid_path(
            options.root.display().to_string(),
            "not a directory",
        ));
    }

    let config_path = options
        .config_path
        .unwrap_or_else(|| options.root.join(CONFIG_FILE_NAME));

    if config_path.exists() && !options.force {
        return Err(BugLocatorError::config(format!(
            "config already exists at '{}' (use --force to overwrite)",
            config_path.display()
        )));
    }

    let config = Config::default();
    config.save(&config_path)?;

    let work_dir = resolve_work_dir(&options.root, &config.experiment.work_dir);
    let created_work_dir = create_dir_if_needed(&work_dir)?;

    Ok(InitResult {
        config_path,
        work_dir,
        created_work_dir,
    })
}

fn create_dir_if_needed(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(path).map_err(|e| {
        BugLocatorError::io(format!("creating directory '{}'", path.display()), e)
    })?;
    Ok(true)
}
