//! The external rank learner.
//!
//! Learning to rank happens outside this crate: a separate program is
//! trained on a feature file and later scores another one. The exchange is
//! file based; see [`crate::dataset`] for the formats.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::config::LearnerConfig;
use crate::error::{BugLocatorError, Result};

/// Trains a model on a feature file and scores feature files with it.
pub trait RankLearner {
    fn train(&self, features: &Path, model: &Path) -> Result<()>;

    /// Write one score per line of `features` to `scores`.
    fn predict(&self, model: &Path, features: &Path, scores: &Path) -> Result<()>;
}

/// Runs a configured command line, e.g. a RankLib jar.
#[derive(Debug, Clone)]
pub struct ExternalLearner {
    program: String,
    train_args: Vec<String>,
    predict_args: Vec<String>,
}

impl ExternalLearner {
    pub fn from_config(config: &LearnerConfig) -> Self {
        Self {
            program: config.program.clone(),
            train_args: config.train_args.clone(),
            predict_args: config.predict_args.clone(),
        }
    }

    fn run(&self, args: &[String], bindings: &[(&str, &Path)]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| substitute(a, bindings)).collect();
        debug!(program = %self.program, ?args, "running rank learner");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                BugLocatorError::learner(format!("failed to execute '{}': {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BugLocatorError::learner(if stderr.is_empty() {
                format!("'{}' exited with status {}", self.program, output.status)
            } else {
                stderr
            }));
        }
        Ok(())
    }
}

impl RankLearner for ExternalLearner {
    fn train(&self, features: &Path, model: &Path) -> Result<()> {
        self.run(&self.train_args, &[("train", features), ("model", model)])?;
        if !model.exists() {
            return Err(BugLocatorError::learner(format!(
                "no model written to '{}'",
                model.display()
            )));
        }
        Ok(())
    }

    fn predict(&self, model: &Path, features: &Path, scores: &Path) -> Result<()> {
        self.run(
            &self.predict_args,
            &[("model", model), ("test", features), ("scores", scores)],
        )
    }
}

/// Replace `{name}` placeholders with the bound paths.
pub fn substitute(arg: &str, bindings: &[(&str, &Path)]) -> String {
    bindings.iter().fold(arg.to_string(), |acc, (name, path)| {
        acc.replace(&format!("{{{name}}}"), &path.display().to_string())
    })
}
