use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rdigest_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rdigest"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let papers_dir = root.join("papers");
    fs::create_dir_all(&papers_dir).unwrap();

    // Not a real PDF: extraction fails and the paper is skipped.
    fs::write(papers_dir.join("broken.pdf"), "Abstract\nnot a pdf").unwrap();
    fs::write(papers_dir.join("notes.txt"), "ignored").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/summaries.sqlite"

[papers]
dir = "{root}/papers"

[output]
dir = "{root}/weekly"

[embedding]
provider = "disabled"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("rdigest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rdigest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rdigest_binary();
    let cwd = config_path.parent().unwrap();
    let output = Command::new(&binary)
        .current_dir(cwd)
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rdigest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rdigest(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/summaries.sqlite").exists());

    // Idempotent
    let (_, stderr, ok) = run_rdigest(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config) = setup_test_env();
    run_rdigest(&config, &["init"]);
    let (stdout, stderr, ok) = run_rdigest(&config, &["stats"]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Summaries:   0"));
    assert!(stdout.contains("Latest report: none"));
}

#[test]
fn test_ingest_dry_run_reports_counts() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rdigest(&config, &["ingest", "--dry-run"]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("ingest\n  scanned: 1"));
    assert!(stdout.contains("  failed: 1"));
    assert!(stdout.ends_with("ok\n"));
    assert!(!tmp.path().join("data/summaries.sqlite.lock").exists());
}

#[test]
fn test_digest_dry_run_writes_nothing() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_rdigest(&config, &["digest", "--dry-run"]);
    assert!(ok, "digest failed: {}", stderr);
    assert!(stdout.contains("digest\n  scanned: 1"));
    assert!(stdout.contains("report: not written"));
    assert!(!tmp.path().join("weekly").exists());
}

#[test]
fn test_similar_requires_embeddings() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_rdigest(&config, &["similar", "graph neural networks"]);
    assert!(!ok);
    assert!(stderr.contains("embedding provider"));
}

#[test]
fn test_held_lock_blocks_run() {
    let (tmp, config) = setup_test_env();
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    fs::write(tmp.path().join("data/summaries.sqlite.lock"), "pid=1").unwrap();

    let (_, stderr, ok) = run_rdigest(&config, &["run", "--dry-run"]);
    assert!(!ok);
    assert!(stderr.contains("Another run holds the lock"));
}
