//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chatter"));
    cmd.env_remove("CHATTER_DB_PATH")
        .env_remove("CHATTER_BOT_NAME")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("train"), "Expected train subcommand in --help output");
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chatter"), "Expected binary name in --version output");
}

#[test]
fn test_train_then_stats() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("brain.db");
    let corpus = dir.path().join("corpus.txt");
    std::fs::write(&corpus, "the quick brown fox\n\njumps over the lazy dog\ntoo short\n").unwrap();

    // A nonexistent config file falls back to defaults.
    let output = cli_bin()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("--db")
        .arg(&db)
        .arg("train")
        .arg(&corpus)
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Learned 2 of 3 lines"), "unexpected output: {stdout}");

    let output = cli_bin()
        .arg("--db")
        .arg(&db)
        .arg("stats")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ngrams:       5"), "unexpected output: {stdout}");
}

#[test]
fn test_db_and_bot_from_environment() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("env.db");
    let corpus = dir.path().join("corpus.txt");
    std::fs::write(&corpus, "the quick brown fox\n").unwrap();

    let output = cli_bin()
        .env("CHATTER_DB_PATH", &db)
        .arg("train")
        .arg(&corpus)
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    assert!(db.exists(), "expected the brain at {}", db.display());

    let output = cli_bin()
        .env("CHATTER_DB_PATH", &db)
        .env("CHATTER_BOT_NAME", "envbot")
        .arg("stats")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bot:          envbot"), "unexpected output: {stdout}");
    assert!(stdout.contains("ngrams:       2"), "unexpected output: {stdout}");
}
