pub mod experiment;
pub mod features;
pub mod index;
pub mod init;
pub mod split;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::RevisionedCorpus;
use crate::error::{BugLocatorError, Result};
use crate::git::{GitRepository, Vcs};
use crate::history::FileHistories;
use crate::scanner::FileFilter;
use crate::tokenizer::RegexTokenizer;

/// A corpus over the git repository at `repo`, configured from `config`.
pub fn open_corpus(repo: &GitRepository, config: &Config) -> RevisionedCorpus {
    RevisionedCorpus::new(
        Box::new(repo.clone()),
        Box::new(RegexTokenizer),
        FileFilter::from_config(config),
        config.index.content_scheme,
        config.index.min_term_frequency,
    )
}

/// Read change history from `path`, or mine it from the current HEAD.
pub fn load_histories(repo: &GitRepository, path: Option<&Path>) -> Result<FileHistories> {
    let histories = match path {
        Some(p) => FileHistories::load(p)?,
        None => {
            let head = repo.resolve("HEAD")?;
            FileHistories::new(repo.change_history(&head)?)
        }
    };
    info!(files = histories.len(), "loaded change history");
    Ok(histories)
}

/// Resolve a config-relative directory against the repository root.
pub fn resolve_work_dir(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        BugLocatorError::config_with_source(format!("failed to serialize {what} as JSON"), e)
    })?;
    println!("{json}");
    Ok(())
}

/// Run `body`, then check the repository back out at the ref it started on.
///
/// Refuses to start when tracked files have uncommitted changes, since
/// checking out other revisions would discard them. The body's error wins
/// over a failed restore; a failed restore after a successful body is
/// reported.
pub fn with_restored_checkout<T>(
    repo: &GitRepository,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if repo.has_local_changes()? {
        return Err(BugLocatorError::git(format!(
            "working tree at '{}' has uncommitted changes to tracked files; commit or stash them first",
            repo.root().display()
        )));
    }
    let original = repo.current_ref()?;
    let result = body();
    match (result, repo.checkout(&original)) {
        (Err(e), restore) => {
            if let Err(restore_err) = restore {
                warn!(%restore_err, original = %original, "could not restore checkout");
            }
            Err(e)
        }
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_is_relative_to_root() {
        assert_eq!(
            resolve_work_dir(Path::new("/repo"), Path::new(".buglocator")),
            PathBuf::from("/repo/.buglocator")
        );
        assert_eq!(
            resolve_work_dir(Path::new("/repo"), Path::new("/tmp/work")),
            PathBuf::from("/tmp/work")
        );
    }
}
