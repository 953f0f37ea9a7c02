use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use buglocator::cli::{Cli, ColorMode, Command};
use buglocator::commands;
use buglocator::commands::experiment::ExperimentCommandOptions;
use buglocator::commands::features::FeaturesCommandOptions;
use buglocator::commands::index::IndexCommandOptions;
use buglocator::commands::init::{InitOptions, InitResult};
use buglocator::commands::split::SplitCommandOptions;
use buglocator::config::{self, Config};
use buglocator::error::BugLocatorError;

fn main() {
    let cli = Cli::parse();

    // Configure color output
    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    // Init tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), BugLocatorError> {
    let root = resolve_root(cli.root)?;
    let prepare = || -> Result<Config, BugLocatorError> {
        let config = config::load_config(cli.config.as_deref())?;
        init_thread_pool(cli.threads.or(config.experiment.threads))?;
        Ok(config)
    };

    match cli.command {
        Command::Init { config, force } => {
            let result = commands::init::run(InitOptions {
                root,
                config_path: config,
                force,
            })?;
            if !cli.quiet {
                print_init_result(&result);
            }
            Ok(())
        }
        Command::Index { revision } => commands::index::run(IndexCommandOptions {
            root,
            revision,
            config: prepare()?,
            json: cli.json,
            quiet: cli.quiet,
        }),
        Command::Split { reports, folds } => {
            let config = prepare()?;
            commands::split::run(SplitCommandOptions {
                reports,
                folds: folds.unwrap_or(config.experiment.folds),
                json: cli.json,
                quiet: cli.quiet,
            })
        }
        Command::Features {
            reports,
            revision,
            mode,
            out,
            bounds,
            training,
            history,
        } => commands::features::run(FeaturesCommandOptions {
            root,
            reports,
            revision,
            mode,
            out,
            bounds,
            training,
            history,
            config: prepare()?,
            json: cli.json,
            quiet: cli.quiet,
        }),
        Command::Experiment {
            reports,
            history,
            folds,
            work_dir,
        } => {
            let mut config = prepare()?;
            if let Some(folds) = folds {
                config.experiment.folds = folds;
                config.validate()?;
            }
            commands::experiment::run(ExperimentCommandOptions {
                root,
                reports,
                history,
                work_dir,
                config,
                json: cli.json,
                quiet: cli.quiet,
            })
        }
    }
}

fn init_thread_pool(threads: Option<usize>) -> Result<(), BugLocatorError> {
    let Some(threads) = threads else {
        return Ok(());
    };
    if threads == 0 {
        return Err(BugLocatorError::validation("threads", "must be greater than 0"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| BugLocatorError::config_with_source("failed to build thread pool", e))
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf, BugLocatorError> {
    match root {
        Some(p) => Ok(p),
        None => std::env::current_dir()
            .map_err(|e| BugLocatorError::io("getting current directory", e)),
    }
}

fn print_init_result(result: &InitResult) {
    println!(
        "{} Created config at {}",
        "ok".green().bold(),
        result.config_path.display()
    );
    if result.created_work_dir {
        println!(
            "{} Created work directory at {}",
            "ok".green().bold(),
            result.work_dir.display()
        );
    }
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} to point [learner] at your rank learner",
        config::CONFIG_FILE_NAME.bold()
    );
    println!(
        "  2. Run {} to check the fold layout",
        "buglocator split --reports <file>".bold()
    );
    println!(
        "  3. Run {} to evaluate",
        "buglocator experiment --reports <file>".bold()
    );
}
