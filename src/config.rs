use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{BugLocatorError, Result};
use crate::similarity::Similarity;
use crate::weighting::WeightingScheme;

pub const CONFIG_FILE_NAME: &str = "buglocator.toml";

/// Top-level configuration for buglocator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub ranking: RankingConfig,
    pub experiment: ExperimentConfig,
    pub learner: LearnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Terms occurring fewer times across the corpus are dropped on a full
    /// fit. 0 keeps every term.
    pub min_term_frequency: u64,
    pub file_extensions: Vec<String>,
    pub ignore: Vec<String>,
    /// Scheme for file, method, and bug-report vectors in the source index.
    pub content_scheme: WeightingScheme,
    /// Scheme for bug-report vectors in the report-to-report index.
    pub report_scheme: WeightingScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Maximum candidates kept per training bug report.
    pub candidate_cap: usize,
    /// How many similar reports feed the collaborative score; unset means all.
    pub similar_reports: Option<usize>,
    /// Rank label written for ground-truth candidates.
    pub positive_label: u32,
    /// Take the best method-level score when it beats the file-level one.
    pub method_similarity: bool,
    /// Measure used for report-to-source content similarity.
    pub similarity: Similarity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    pub folds: usize,
    /// Worker threads; unset means one per CPU core.
    pub threads: Option<usize>,
    /// Where feature, bounds, model, and score files are written.
    pub work_dir: PathBuf,
}

/// External rank learner invocation. Arguments may contain the
/// placeholders `{train}`, `{model}`, `{test}`, and `{scores}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LearnerConfig {
    pub program: String,
    pub train_args: Vec<String>,
    pub predict_args: Vec<String>,
}

// --- Defaults ---

impl Default for Config {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            ranking: RankingConfig::default(),
            experiment: ExperimentConfig::default(),
            learner: LearnerConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_term_frequency: 0,
            file_extensions: vec!["java".into()],
            ignore: vec!["target/".into(), "build/".into()],
            content_scheme: WeightingScheme::Tfidf,
            report_scheme: WeightingScheme::Tfidf,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidate_cap: 300,
            similar_reports: None,
            positive_label: 100,
            method_similarity: true,
            similarity: Similarity::Vsm,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            folds: 10,
            threads: None,
            work_dir: PathBuf::from(".buglocator"),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        let args = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            program: "java".into(),
            train_args: args(&[
                "-jar", "RankLib.jar", "-train", "{train}", "-ranker", "4", "-metric2t", "MAP",
                "-save", "{model}",
            ]),
            predict_args: args(&[
                "-jar", "RankLib.jar", "-load", "{model}", "-rank", "{test}", "-score", "{scores}",
            ]),
        }
    }
}

// --- Config methods ---

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BugLocatorError::io(format!("reading config from '{}'", path.display()), e)
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| BugLocatorError::config_with_source("failed to parse config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| BugLocatorError::config_with_source("failed to serialize config", e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BugLocatorError::io(
                    format!("creating config directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            BugLocatorError::io(format!("writing config to '{}'", path.display()), e)
        })
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<()> {
        validate_scheme("index.content_scheme", &self.index.content_scheme)?;
        validate_scheme("index.report_scheme", &self.index.report_scheme)?;
        if self.index.file_extensions.is_empty() {
            return Err(BugLocatorError::validation(
                "index.file_extensions",
                "must list at least one extension",
            ));
        }
        if self.ranking.candidate_cap == 0 {
            return Err(BugLocatorError::validation(
                "ranking.candidate_cap",
                "must be greater than 0",
            ));
        }
        if self.ranking.similar_reports == Some(0) {
            return Err(BugLocatorError::validation(
                "ranking.similar_reports",
                "must be greater than 0 (leave unset to use all reports)",
            ));
        }
        if self.ranking.positive_label <= 1 {
            return Err(BugLocatorError::validation(
                "ranking.positive_label",
                "must be greater than the negative label 1",
            ));
        }
        if self.experiment.folds == 0 {
            return Err(BugLocatorError::validation(
                "experiment.folds",
                "must be greater than 0",
            ));
        }
        if self.experiment.threads == Some(0) {
            return Err(BugLocatorError::validation(
                "experiment.threads",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn validate_scheme(field: &str, scheme: &WeightingScheme) -> Result<()> {
    if let WeightingScheme::Okapi { k1, b } = *scheme {
        if k1 <= 0.0 {
            return Err(BugLocatorError::validation(field, "okapi k1 must be positive"));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(BugLocatorError::validation(field, "okapi b must be within [0, 1]"));
        }
    }
    Ok(())
}

/// Builder for constructing Config with selective overrides.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.config.experiment.folds = folds;
        self
    }

    pub fn with_candidate_cap(mut self, cap: usize) -> Self {
        self.config.ranking.candidate_cap = cap;
        self
    }

    pub fn with_content_scheme(mut self, scheme: WeightingScheme) -> Self {
        self.config.index.content_scheme = scheme;
        self
    }

    pub fn with_similar_reports(mut self, limit: Option<usize>) -> Self {
        self.config.ranking.similar_reports = limit;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.experiment.work_dir = dir.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Discover the config file using standard search order:
/// 1. Explicit path (if provided)
/// 2. ./buglocator.toml
/// 3. ~/.buglocator.toml
/// 4. XDG config dir
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
        return None;
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
        let home_config = home.join(format!(".{CONFIG_FILE_NAME}"));
        if home_config.exists() {
            return Some(home_config);
        }
    }

    if let Some(proj_dirs) = ProjectDirs::from("", "", "buglocator") {
        let xdg = proj_dirs.config_dir().join(CONFIG_FILE_NAME);
        if xdg.exists() {
            return Some(xdg);
        }
    }

    None
}

/// Load config from an explicit path, the discovered file, or defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(BugLocatorError::invalid_path(
                p.display().to_string(),
                "config file does not exist",
            ));
        }
    }
    match find_config_file(explicit) {
        Some(p) => Config::load(&p),
        None => Ok(Config::default()),
    }
}
