use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "buglocator",
    about = "Rank the source files of a git repository by how likely they are to fix a bug report",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Color output mode
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default buglocator.toml
    Init {
        /// Where to write the config (defaults to <root>/buglocator.toml)
        #[arg(long = "out")]
        config: Option<PathBuf>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Index the source tree at a revision and print vocabulary statistics
    ///
    /// The revision is checked out in the repository at --root.
    Index {
        /// Revision to check out and index
        revision: String,
    },

    /// Print the time-ordered folds of a bug-report file
    Split {
        /// Bug reports (JSON array)
        #[arg(long)]
        reports: PathBuf,

        /// Number of folds (overrides experiment.folds)
        #[arg(long)]
        folds: Option<usize>,
    },

    /// Rank bug reports at a revision and write a learner feature file
    Features {
        /// Bug reports to rank (JSON array)
        #[arg(long)]
        reports: PathBuf,

        /// Revision whose source tree is ranked
        #[arg(long)]
        revision: String,

        /// train: compute and save bounds; test: normalize with saved bounds
        #[arg(long, value_enum)]
        mode: FeatureMode,

        /// Feature file to write
        #[arg(long)]
        out: PathBuf,

        /// Normalization bounds file (written in train mode, read in test mode)
        #[arg(long)]
        bounds: PathBuf,

        /// Reports backing the collaborative score (defaults to --reports)
        #[arg(long)]
        training: Option<PathBuf>,

        /// Change history (JSON map of path to commit timestamps); mined from git if omitted
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Run the fold-by-fold train/test experiment
    Experiment {
        /// Bug reports (JSON array)
        #[arg(long)]
        reports: PathBuf,

        /// Change history (JSON map of path to commit timestamps); mined from git if omitted
        #[arg(long)]
        history: Option<PathBuf>,

        /// Number of folds (overrides experiment.folds)
        #[arg(long)]
        folds: Option<usize>,

        /// Directory for feature, bounds, model, and score files
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeatureMode {
    Train,
    Test,
}
