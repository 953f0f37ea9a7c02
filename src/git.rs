//! Git integration for buglocator.
//!
//! Provides the [`Vcs`] collaborator used by the revisioned corpus:
//! checking out a revision, listing the files added, modified, and deleted
//! between two revisions, and mining per-file change timestamps. All git
//! access goes through the `git` CLI; every other module works with the
//! parsed [`ChangeSet`] and history maps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{BugLocatorError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Files that changed between two revisions, by kind of change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Version-control operations the corpus depends on.
pub trait Vcs: Send + Sync {
    /// Materialize the tree at `revision` and return its root directory.
    fn checkout(&self, revision: &str) -> Result<PathBuf>;

    /// Classify the files that differ between two revisions.
    fn diff(&self, from: &str, to: &str) -> Result<ChangeSet>;
}

/// A git working copy driven through the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

// ---------------------------------------------------------------------------
// Git command execution
// ---------------------------------------------------------------------------

/// Run a git command in the given directory and return its stdout.
///
/// Returns a [`BugLocatorError::Git`] if the command fails or if git
/// is not installed.
fn run_git(args: &[&str], cwd: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| BugLocatorError::git(format!("failed to execute git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BugLocatorError::git(if stderr.is_empty() {
            format!("git exited with status {}", output.status)
        } else {
            stderr
        }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Verify that the given path is inside a git repository.
pub fn verify_git_repo(root: &Path) -> Result<()> {
    run_git(&["rev-parse", "--git-dir"], root).map(|_| ())
}

impl GitRepository {
    /// Open the repository rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        verify_git_repo(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a revision expression (e.g. `abc123^`) to a full commit id.
    pub fn resolve(&self, revision: &str) -> Result<String> {
        let out = run_git(&["rev-parse", "--verify", &format!("{revision}^{{commit}}")], &self.root)?;
        Ok(out.trim().to_string())
    }

    /// The checked-out branch name, or the commit id when HEAD is detached.
    pub fn current_ref(&self) -> Result<String> {
        let name = run_git(&["rev-parse", "--abbrev-ref", "HEAD"], &self.root)?;
        match name.trim() {
            "HEAD" => self.resolve("HEAD"),
            branch => Ok(branch.to_string()),
        }
    }

    /// Whether tracked files have uncommitted changes, staged or not.
    pub fn has_local_changes(&self) -> Result<bool> {
        let status = run_git(&["status", "--porcelain", "--untracked-files=no"], &self.root)?;
        Ok(!status.trim().is_empty())
    }

    /// Mine, for every file ever touched up to `until`, the ascending list
    /// of commit timestamps (epoch seconds) at which it changed.
    pub fn change_history(&self, until: &str) -> Result<HashMap<String, Vec<i64>>> {
        let raw = run_git(
            &["log", "--no-renames", "--name-only", "--format=%x00%ct", until],
            &self.root,
        )?;
        let history = parse_change_log(&raw)?;
        debug!(files = history.len(), until, "mined change history");
        Ok(history)
    }
}

impl Vcs for GitRepository {
    fn checkout(&self, revision: &str) -> Result<PathBuf> {
        run_git(&["checkout", "--quiet", "--force", revision], &self.root)?;
        debug!(revision, "checked out");
        Ok(self.root.clone())
    }

    fn diff(&self, from: &str, to: &str) -> Result<ChangeSet> {
        let raw = run_git(&["diff", "--name-status", "--no-renames", from, to], &self.root)?;
        parse_name_status(&raw, from, to)
    }
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// Parse `git diff --name-status --no-renames` output.
///
/// Any status other than added, modified, type-changed, or deleted is
/// reported as a malformed diff.
pub fn parse_name_status(input: &str, from: &str, to: &str) -> Result<ChangeSet> {
    let mut changes = ChangeSet::default();
    for line in input.lines().filter(|l| !l.trim().is_empty()) {
        let malformed = || BugLocatorError::MalformedDiff {
            from: from.to_string(),
            to: to.to_string(),
            line: line.to_string(),
        };
        let (status, path) = line.split_once('\t').ok_or_else(malformed)?;
        if path.is_empty() {
            return Err(malformed());
        }
        let path = path.to_string();
        match status {
            "A" => changes.added.push(path),
            "M" | "T" => changes.modified.push(path),
            "D" => changes.deleted.push(path),
            _ => return Err(malformed()),
        }
    }
    Ok(changes)
}

/// Parse `git log --name-only --format=%x00%ct` output into ascending
/// per-file timestamp lists.
///
/// Commit lines start with a NUL byte, which no path can.
pub fn parse_change_log(input: &str) -> Result<HashMap<String, Vec<i64>>> {
    let mut history: HashMap<String, Vec<i64>> = HashMap::new();
    let mut current: Option<i64> = None;
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(ts) = line.strip_prefix('\0') {
            let ts = ts
                .parse()
                .map_err(|_| BugLocatorError::malformed("git log", format!("bad timestamp '{line}'")))?;
            current = Some(ts);
            continue;
        }
        let ts = current.ok_or_else(|| {
            BugLocatorError::malformed("git log", format!("file '{line}' before any commit"))
        })?;
        history.entry(line.to_string()).or_default().push(ts);
    }
    for stamps in history.values_mut() {
        stamps.sort_unstable();
    }
    Ok(history)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NAME_STATUS: &str = "\
A\tsrc/main/java/org/demo/NewThing.java
M\tsrc/main/java/org/demo/Parser.java
D\tsrc/main/java/org/demo/Old.java
T\tscripts/run.sh
";

    const LOG: &str = "\
\01700000300
src/A.java
src/B.java

\01700000100
src/A.java

\01700000200
src/C.java
";

    #[test]
    fn parse_name_status_classifies_changes() {
        let changes = parse_name_status(NAME_STATUS, "a", "b").unwrap();
        assert_eq!(changes.added, vec!["src/main/java/org/demo/NewThing.java"]);
        assert_eq!(
            changes.modified,
            vec!["src/main/java/org/demo/Parser.java", "scripts/run.sh"]
        );
        assert_eq!(changes.deleted, vec!["src/main/java/org/demo/Old.java"]);
        assert_eq!(changes.len(), 4);
    }

    #[test]
    fn parse_name_status_empty() {
        let changes = parse_name_status("", "a", "b").unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn parse_name_status_rejects_unknown_status() {
        let err = parse_name_status("R100\told.java\tnew.java\n", "a", "b").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("R100"));
    }

    #[test]
    fn parse_name_status_rejects_missing_path() {
        assert!(parse_name_status("M\n", "a", "b").is_err());
        assert!(parse_name_status("M\t\n", "a", "b").is_err());
    }

    #[test]
    fn parse_change_log_sorts_timestamps() {
        let history = parse_change_log(LOG).unwrap();
        assert_eq!(history["src/A.java"], vec![1_700_000_100, 1_700_000_300]);
        assert_eq!(history["src/B.java"], vec![1_700_000_300]);
        assert_eq!(history["src/C.java"], vec![1_700_000_200]);
    }

    #[test]
    fn parse_change_log_rejects_orphan_file() {
        assert!(parse_change_log("src/A.java\n\01\n").is_err());
        assert!(parse_change_log("\0notanumber\n").is_err());
    }

    #[test]
    fn parse_change_log_accepts_at_sign_paths() {
        let history = parse_change_log("\01700000000\n@types/index.java\nsrc/A.java\n").unwrap();
        assert_eq!(history["@types/index.java"], vec![1_700_000_000]);
        assert_eq!(history["src/A.java"], vec![1_700_000_000]);
    }
}
