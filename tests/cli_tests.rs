use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process;
use tempfile::tempdir;

fn cmd() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("buglocator").unwrap()
}

/// Run a git command in the given directory, panicking on failure.
fn git(dir: &Path, args: &[&str]) -> String {
    let output = process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to start");
    assert!(output.status.success(), "git {args:?} failed in {}", dir.display());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Commit everything with a fixed author and committer date.
fn commit(dir: &Path, message: &str, time: i64) -> String {
    git(dir, &["add", "-A"]);
    let date = format!("{time} +0000");
    let status = process::Command::new("git")
        .args(["commit", "--quiet", "-m", message])
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .current_dir(dir)
        .status()
        .expect("git commit failed to start");
    assert!(status.success(), "git commit failed in {}", dir.display());
    git(dir, &["rev-parse", "HEAD"])
}

fn java(class: &str, method: &str, body: &str) -> String {
    format!("public class {class} {{\n    public void {method}() {{\n        {body}\n    }}\n}}\n")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A small Java repository with one initial commit and four bug fixes.
struct Fixture {
    dir: tempfile::TempDir,
    commits: Vec<String>,
}

impl Fixture {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a bug-report file covering the fixes numbered in `ids` (1-4).
    fn reports(&self, name: &str, ids: &[usize]) -> PathBuf {
        let summaries = [
            "Reader fails to read buffer",
            "Writer does not flush output",
            "Cache cannot evict entry",
            "Reader buffer corrupted on read",
        ];
        let fixed = ["src/Reader.java", "src/Writer.java", "src/Cache.java", "src/Reader.java"];
        let entries: Vec<String> = ids
            .iter()
            .map(|&id| {
                format!(
                    r#"{{"id": {id}, "summary": "{}", "description": "", "report_time": {}, "commit_id": "{}", "commit_time": {}, "fixed_files": ["{}"]}}"#,
                    summaries[id - 1],
                    fix_time(id) - 3600,
                    self.commits[id],
                    fix_time(id),
                    fixed[id - 1]
                )
            })
            .collect();
        let path = self.path(name);
        std::fs::write(&path, format!("[{}]", entries.join(",\n"))).unwrap();
        path
    }
}

fn fix_time(id: usize) -> i64 {
    1_600_000_000 + id as i64 * 86_400 * 40
}

fn setup_git_repo() -> Fixture {
    let dir = tempdir().unwrap();
    let root = dir.path();

    git(root, &["init", "--quiet"]);
    git(root, &["config", "user.email", "test@test.com"]);
    git(root, &["config", "user.name", "Test"]);

    write(root, "src/Reader.java", &java("Reader", "readBuffer", "buffer.read();"));
    write(root, "src/Writer.java", &java("Writer", "flushOutput", "output.flush();"));
    write(root, "src/Cache.java", &java("Cache", "evictEntry", "entries.evict();"));
    write(root, "README.md", "sample project\n");
    let mut commits = vec![commit(root, "initial", 1_600_000_000)];

    let fixes = [
        ("src/Reader.java", java("Reader", "readBuffer", "if (buffer != null) buffer.read();")),
        ("src/Writer.java", java("Writer", "flushOutput", "output.flush(); output.sync();")),
        ("src/Cache.java", java("Cache", "evictEntry", "entries.evictOldest();")),
        ("src/Reader.java", java("Reader", "readBuffer", "buffer.verify(); buffer.read();")),
    ];
    for (i, (path, content)) in fixes.iter().enumerate() {
        write(root, path, content);
        commits.push(commit(root, &format!("fix bug {}", i + 1), fix_time(i + 1)));
    }

    Fixture { dir, commits }
}

/// Write a config whose learner scores each candidate by its content feature.
fn write_shell_learner_config(fixture: &Fixture, folds: usize) -> PathBuf {
    let path = fixture.path("buglocator.toml");
    std::fs::write(
        &path,
        format!(
            r#"[experiment]
folds = {folds}

[learner]
program = "sh"
train_args = ["-c", "cp {{train}} {{model}}"]
predict_args = ["-c", "cut -d' ' -f3 {{test}} | cut -d: -f2 > {{scores}}"]
"#
        ),
    )
    .unwrap();
    path
}

// -----------------------------------------------------------------------
// General CLI tests
// -----------------------------------------------------------------------

#[test]
fn help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("split"))
        .stdout(predicate::str::contains("features"))
        .stdout(predicate::str::contains("experiment"));
}

#[test]
fn missing_explicit_config_errors() {
    let fixture = setup_git_repo();
    cmd()
        .args(["index", "HEAD", "--config", "/nonexistent/buglocator.toml", "--root"])
        .arg(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file does not exist"));
}

// -----------------------------------------------------------------------
// init
// -----------------------------------------------------------------------

#[test]
fn init_creates_config_and_work_dir() {
    let dir = tempdir().unwrap();
    cmd()
        .args(["init", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config"))
        .stdout(predicate::str::contains("Next steps"));

    assert!(dir.path().join("buglocator.toml").exists());
    assert!(dir.path().join(".buglocator").is_dir());
}

#[test]
fn init_errors_on_existing_without_force() {
    let dir = tempdir().unwrap();
    cmd().args(["init", "--root"]).arg(dir.path()).assert().success();

    cmd()
        .args(["init", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn init_force_overwrites() {
    let dir = tempdir().unwrap();
    cmd().args(["init", "--root"]).arg(dir.path()).assert().success();

    cmd()
        .args(["init", "--force", "--quiet", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// -----------------------------------------------------------------------
// index
// -----------------------------------------------------------------------

#[test]
fn index_prints_vocabulary_statistics() {
    let fixture = setup_git_repo();
    cmd()
        .args(["index", &fixture.commits[0], "--root"])
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("documents:       3"))
        .stdout(predicate::str::contains("methods:         3"));
}

#[test]
fn index_json_is_valid_and_restores_checkout() {
    let fixture = setup_git_repo();
    let branch = git(fixture.root(), &["rev-parse", "--abbrev-ref", "HEAD"]);

    let output = cmd()
        .args(["index", &fixture.commits[1], "--json", "--root"])
        .arg(fixture.root())
        .current_dir(fixture.root())
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["documents"], 3);
    assert_eq!(parsed["revision"], fixture.commits[1].as_str());
    assert!(parsed["terms"].as_u64().unwrap() > 0);

    assert_eq!(git(fixture.root(), &["rev-parse", "--abbrev-ref", "HEAD"]), branch);
    assert_eq!(git(fixture.root(), &["rev-parse", "HEAD"]), fixture.commits[4]);
}

#[test]
fn index_refuses_dirty_working_tree() {
    let fixture = setup_git_repo();
    let edited = java("Reader", "readBuffer", "// local edit");
    write(fixture.root(), "src/Reader.java", &edited);

    cmd()
        .args(["index", &fixture.commits[0], "--root"])
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("uncommitted changes"));

    let on_disk = std::fs::read_to_string(fixture.path("src/Reader.java")).unwrap();
    assert_eq!(on_disk, edited);
    assert_eq!(git(fixture.root(), &["rev-parse", "HEAD"]), fixture.commits[4]);
}

#[test]
fn index_ignores_untracked_files() {
    let fixture = setup_git_repo();
    write(fixture.root(), "notes.txt", "scratch\n");

    cmd()
        .args(["index", &fixture.commits[0], "--root"])
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .success();
    assert!(fixture.path("notes.txt").exists());
}

#[test]
fn index_unknown_revision_errors() {
    let fixture = setup_git_repo();
    cmd()
        .args(["index", "no-such-revision", "--root"])
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("git error"));
}

#[test]
fn index_non_git_directory_errors() {
    let dir = tempdir().unwrap();
    cmd()
        .args(["index", "HEAD", "--root"])
        .arg(dir.path())
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// -----------------------------------------------------------------------
// split
// -----------------------------------------------------------------------

#[test]
fn split_prints_folds_with_checkpoints() {
    let fixture = setup_git_repo();
    let reports = fixture.reports("reports.json", &[4, 2, 1, 3]);
    cmd()
        .args(["split", "--folds", "2", "--reports"])
        .arg(&reports)
        .current_dir(fixture.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 reports in 2 folds"))
        .stdout(predicate::str::contains(fixture.commits[2].as_str()))
        .stdout(predicate::str::contains(fixture.commits[4].as_str()));
}

#[test]
fn split_json_orders_reports_by_commit_time() {
    let fixture = setup_git_repo();
    let reports = fixture.reports("reports.json", &[4, 2, 1, 3]);
    let output = cmd()
        .args(["split", "--folds", "2", "--json", "--reports"])
        .arg(&reports)
        .current_dir(fixture.root())
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let folds = parsed.as_array().unwrap();
    assert_eq!(folds.len(), 2);
    assert_eq!(folds[0]["bug_ids"], serde_json::json!([1, 2]));
    assert_eq!(folds[1]["bug_ids"], serde_json::json!([3, 4]));
    assert_eq!(folds[0]["checkpoint"], fixture.commits[2].as_str());
}

#[test]
fn split_zero_folds_errors() {
    let fixture = setup_git_repo();
    let reports = fixture.reports("reports.json", &[1, 2]);
    cmd()
        .args(["split", "--folds", "0", "--reports"])
        .arg(&reports)
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("folds"));
}

#[test]
fn split_malformed_reports_errors() {
    let dir = tempdir().unwrap();
    let reports = dir.path().join("reports.json");
    std::fs::write(&reports, "{not json").unwrap();
    cmd()
        .args(["split", "--reports"])
        .arg(&reports)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed"));
}

// -----------------------------------------------------------------------
// features
// -----------------------------------------------------------------------

#[test]
fn features_train_then_test() {
    let fixture = setup_git_repo();
    let train = fixture.reports("train.json", &[1, 2]);
    let test = fixture.reports("test.json", &[3, 4]);
    let out = fixture.dir.path().join(".buglocator");
    let bounds = out.join("bounds.txt");

    cmd()
        .args(["features", "--mode", "train", "--revision", &fixture.commits[2], "--reports"])
        .arg(&train)
        .arg("--out")
        .arg(out.join("train.txt"))
        .arg("--bounds")
        .arg(&bounds)
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 candidates for 2 reports"))
        .stdout(predicate::str::contains("Saved bounds"));

    let train_lines = std::fs::read_to_string(out.join("train.txt")).unwrap();
    assert_eq!(train_lines.lines().count(), 6);
    assert_eq!(train_lines.lines().filter(|l| l.starts_with("100 ")).count(), 2);
    assert!(std::fs::read_to_string(&bounds).unwrap().contains("content_max:"));

    cmd()
        .args(["features", "--mode", "test", "--revision", &fixture.commits[4], "--reports"])
        .arg(&test)
        .arg("--training")
        .arg(&train)
        .arg("--out")
        .arg(out.join("test.txt"))
        .arg("--bounds")
        .arg(&bounds)
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 candidates for 2 reports"))
        .stdout(predicate::str::contains("Saved bounds").not());

    let test_lines = std::fs::read_to_string(out.join("test.txt")).unwrap();
    assert!(test_lines.lines().all(|l| l.contains(" qid:")));
}

#[test]
fn features_test_without_bounds_errors() {
    let fixture = setup_git_repo();
    let test = fixture.reports("test.json", &[3]);
    cmd()
        .args(["features", "--mode", "test", "--revision", "HEAD", "--reports"])
        .arg(&test)
        .arg("--out")
        .arg(fixture.path("test.txt"))
        .arg("--bounds")
        .arg(fixture.path("missing-bounds.txt"))
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-bounds.txt"));
}

#[test]
fn features_counts_excluded_reports() {
    let fixture = setup_git_repo();
    let path = fixture.path("reports.json");
    std::fs::write(
        &path,
        r#"[
  {"id": 1, "summary": "Reader fails", "report_time": 1600000000, "commit_id": "x", "commit_time": 1600000001, "fixed_files": ["src/Reader.java"]},
  {"id": 2, "summary": "No fix recorded", "report_time": 1600000000, "commit_id": "y", "commit_time": 1600000002},
  {"id": 3, "summary": "Fixed elsewhere", "report_time": 1600000000, "commit_id": "z", "commit_time": 1600000003, "fixed_files": ["src/Gone.java"]}
]"#,
    )
    .unwrap();
    let output = cmd()
        .args(["features", "--mode", "train", "--json", "--revision", "HEAD", "--reports"])
        .arg(&path)
        .arg("--out")
        .arg(fixture.path(".buglocator/train.txt"))
        .arg("--bounds")
        .arg(fixture.path(".buglocator/bounds.txt"))
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["reports"], 1);
    assert_eq!(parsed["excluded_no_ground_truth"], 1);
    assert_eq!(parsed["excluded_not_in_tree"], 1);
}

// -----------------------------------------------------------------------
// experiment
// -----------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn experiment_runs_folds_with_external_learner() {
    let fixture = setup_git_repo();
    let config = write_shell_learner_config(&fixture, 2);
    let reports = fixture.reports("reports.json", &[1, 2, 3, 4]);

    let output = cmd()
        .args(["experiment", "--json", "--reports"])
        .arg(&reports)
        .arg("--config")
        .arg(&config)
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["folds"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["overall"]["reports"], 2);

    let work = fixture.path(".buglocator/fold0");
    for file in ["train.txt", "bounds.txt", "model.txt", "test.txt", "scores.txt"] {
        assert!(work.join(file).exists(), "missing {file}");
    }
    assert_eq!(git(fixture.root(), &["rev-parse", "HEAD"]), fixture.commits[4]);
}

#[cfg(unix)]
#[test]
fn experiment_prints_metrics_table() {
    let fixture = setup_git_repo();
    let config = write_shell_learner_config(&fixture, 2);
    let reports = fixture.reports("reports.json", &[1, 2, 3, 4]);

    cmd()
        .args(["experiment", "--reports"])
        .arg(&reports)
        .arg("--config")
        .arg(&config)
        .arg("--work-dir")
        .arg(fixture.path(".buglocator/run"))
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Per fold:"))
        .stdout(predicate::str::contains("Overall"))
        .stdout(predicate::str::contains("MRR"));
    assert!(fixture.path(".buglocator/run/fold0/scores.txt").exists());
}

#[test]
fn experiment_learner_failure_is_reported() {
    let fixture = setup_git_repo();
    let config = fixture.path("buglocator.toml");
    std::fs::write(
        &config,
        "[experiment]\nfolds = 2\n\n[learner]\nprogram = \"buglocator-missing-learner\"\n",
    )
    .unwrap();
    let reports = fixture.reports("reports.json", &[1, 2, 3, 4]);

    cmd()
        .args(["experiment", "--reports"])
        .arg(&reports)
        .arg("--config")
        .arg(&config)
        .arg("--root")
        .arg(fixture.root())
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("rank learner failed"));
    assert_eq!(git(fixture.root(), &["rev-parse", "HEAD"]), fixture.commits[4]);
}
