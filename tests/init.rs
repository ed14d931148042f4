use std::process::Command;

use prscope_core::{CommentMode, PrscopeConfig, ProviderKind, ReviewProfile};

fn prscope(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_prscope"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn init_creates_loadable_config() {
    let dir = tempfile::tempdir().unwrap();

    let output = prscope(
        dir.path(),
        &["init", "--provider", "anthropic", "--model", "claude-sonnet-4-20250514", "--profile", "security"],
    );
    assert!(
        output.status.success(),
        "prscope init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join("prscope.config.json");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.ends_with("}\n"));
    assert!(content.contains("\"apiKeyEnv\": \"ANTHROPIC_API_KEY\""));

    let config = PrscopeConfig::from_file(&config_path).unwrap();
    assert_eq!(config.provider, ProviderKind::Anthropic);
    assert_eq!(config.profile, ReviewProfile::Security);
    assert_eq!(config.comment_mode, CommentMode::SummaryOnly);
    assert_eq!(config.max_files, 30);
    assert!(config.base_url.is_none());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Add a repository secret named ANTHROPIC_API_KEY"));
    assert!(!dir.path().join(".github").exists());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("prscope.config.json"), "{}").unwrap();

    let output = prscope(dir.path(), &["init", "--model", "gpt-4o"]);

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join("prscope.config.json")).unwrap();
    assert_eq!(content, "{}");
}

#[test]
fn init_writes_workflow_with_secret() {
    let dir = tempfile::tempdir().unwrap();

    let output = prscope(
        dir.path(),
        &[
            "init",
            "--provider",
            "openai-compat",
            "--model",
            "qwen2.5-coder",
            "--base-url",
            "http://localhost:1234",
            "--workflow",
        ],
    );
    assert!(output.status.success());

    let config = PrscopeConfig::from_file(&dir.path().join("prscope.config.json")).unwrap();
    assert_eq!(config.api_key_env, "LLM_API_KEY");
    assert_eq!(config.base_url.as_deref(), Some("http://localhost:1234"));

    let workflow =
        std::fs::read_to_string(dir.path().join(".github/workflows/prscope.yml")).unwrap();
    assert!(workflow.contains("pull-requests: write"));
    assert!(workflow.contains("prscope review --post"));
    assert!(workflow.contains("LLM_API_KEY: ${{ secrets.LLM_API_KEY }}"));
    assert!(!workflow.contains("__API_KEY_ENV__"));
}
