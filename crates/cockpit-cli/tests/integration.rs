#![allow(deprecated)]
use assert_cmd::Command;
use cockpit_core::memory::MemoryStore;
use cockpit_core::store::KvStore;
use cockpit_core::types::Agent;
use predicates::prelude::*;
use tempfile::TempDir;

const USER: &str = "15551234567";

fn cockpit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cockpit").unwrap();
    cmd.current_dir(dir.path())
        .env("COCKPIT_ROOT", dir.path())
        .env_remove("CLAUDE_API_KEY")
        .env_remove("WHATSAPP_TOKEN")
        .env_remove("WHATSAPP_ACCESS_TOKEN")
        .env_remove("WHATSAPP_PHONE_NUMBER_ID")
        .env_remove("WHATSAPP_VERIFY_TOKEN")
        .env_remove("WHATSAPP_APP_SECRET")
        .env_remove("OPENAI_API_KEY");
    cmd
}

/// Write one exchange straight into the store the CLI will open.
fn seed_memory(dir: &TempDir) {
    let kv = KvStore::open(&dir.path().join("cockpit.redb")).unwrap();
    let memory = MemoryStore::new(kv, 10);
    memory
        .append(USER, Agent::Growth, "How do I get my first 100 users?", "Start with communities you already belong to.")
        .unwrap();
    memory.set_last_active(USER, Agent::Growth).unwrap();
}

fn agent_markdown() -> String {
    let mut md = String::from("# Growth Hacker\n\n## Role\nYou find scrappy acquisition channels.\n\n");
    md.push_str("## Personality\nDirect and numbers-driven.\n\n");
    md.push_str("## Core Responsibilities\n- Channel experiments\n- Funnel reviews\n\n");
    md.push_str("## Knowledge Base\nPLG, referral loops, community-led growth.\n\n");
    md.push_str("## Output Format\nShort bullet lists with one next step.\n\n");
    md.push_str("## Constraints\nNo paid ads advice below $1k budget.\n\n");
    md.push_str("## Example\nUser: how do I grow? Agent: pick one channel and run a 2-week test.\n\n");
    md.push_str(&"Always tie advice to a measurable weekly metric. ".repeat(20));
    md
}

// ---------------------------------------------------------------------------
// cockpit route
// ---------------------------------------------------------------------------

#[test]
fn route_prints_agent_query() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["route", "@strategist Should I raise now?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("agent: strategist"))
        .stdout(predicate::str::contains("query: Should I raise now?"));
}

#[test]
fn route_json_has_kind_tag() {
    let dir = TempDir::new().unwrap();
    let output = cockpit(&dir)
        .args(["--json", "route", "@collaborate publicist growth launch plan"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "collaboration");
    assert_eq!(json["agent_a"], "publicist");
    assert_eq!(json["agent_b"], "growth");
}

#[test]
fn route_special_command() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["route", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("special: clear"));
}

#[test]
fn route_invalid_collaborator_fails() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["route", "@collaborate publicist wizard plan a launch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wizard"));
}

// ---------------------------------------------------------------------------
// cockpit memory
// ---------------------------------------------------------------------------

#[test]
fn memory_show_prints_history() {
    let dir = TempDir::new().unwrap();
    seed_memory(&dir);
    cockpit(&dir)
        .args(["memory", "show", "--user", USER, "--agent", "growth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("How do I get my first 100 users?"))
        .stdout(predicate::str::contains("[growth] Start with communities"))
        .stdout(predicate::str::contains("last active agent: growth"));
}

#[test]
fn memory_show_empty_conversation() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["memory", "show", "--user", USER, "--agent", "credit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversation with credit"));
}

#[test]
fn memory_show_unknown_agent_fails() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["memory", "show", "--user", USER, "--agent", "wizard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wizard"));
}

#[test]
fn memory_clear_forgets_history() {
    let dir = TempDir::new().unwrap();
    seed_memory(&dir);
    cockpit(&dir)
        .args(["memory", "clear", "--user", USER])
        .assert()
        .success();

    let output = cockpit(&dir)
        .args(["--json", "memory", "show", "--user", USER, "--agent", "growth"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["history"].as_array().unwrap().is_empty());
    assert!(json["last_active"].is_null());
}

// ---------------------------------------------------------------------------
// cockpit usage
// ---------------------------------------------------------------------------

#[test]
fn usage_for_new_user_is_zero() {
    let dir = TempDir::new().unwrap();
    let output = cockpit(&dir)
        .args(["--json", "usage", "--user", USER, "--month", "2025-10"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["month"], "2025-10");
    assert_eq!(json["usage"]["messages"], 0);
    assert_eq!(json["team"]["tokens"], 0);
}

#[test]
fn usage_rejects_bad_month() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["usage", "--user", USER, "--month", "October"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM"));
}

// ---------------------------------------------------------------------------
// cockpit agents lint
// ---------------------------------------------------------------------------

#[test]
fn lint_passes_complete_agent() {
    let dir = TempDir::new().unwrap();
    let agents = dir.path().join("agents");
    std::fs::create_dir_all(&agents).unwrap();
    std::fs::write(agents.join("growth-hacker.md"), agent_markdown()).unwrap();

    cockpit(&dir)
        .args(["agents", "lint"])
        .arg(&agents)
        .assert()
        .success()
        .stdout(predicate::str::contains("growth-hacker.md"))
        .stdout(predicate::str::contains("pass"));
}

#[test]
fn lint_fails_file_missing_sections() {
    let dir = TempDir::new().unwrap();
    let agents = dir.path().join("agents");
    std::fs::create_dir_all(&agents).unwrap();
    std::fs::write(agents.join("stub.md"), "# Stub\n\nTODO\n").unwrap();

    cockpit(&dir)
        .args(["agents", "lint"])
        .arg(&agents)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Missing required section: ## Role"))
        .stderr(predicate::str::contains("failed lint"));
}

// ---------------------------------------------------------------------------
// cockpit config check
// ---------------------------------------------------------------------------

#[test]
fn config_check_reports_missing_secrets() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] CLAUDE_API_KEY is not set"));
}

#[test]
fn config_check_passes_with_secrets() {
    let dir = TempDir::new().unwrap();
    cockpit(&dir)
        .env("CLAUDE_API_KEY", "sk-ant-test")
        .env("WHATSAPP_TOKEN", "wa-token")
        .env("WHATSAPP_PHONE_NUMBER_ID", "1234")
        .env("WHATSAPP_VERIFY_TOKEN", "verify")
        .env("WHATSAPP_APP_SECRET", "secret")
        .env("OPENAI_API_KEY", "sk-openai")
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[error]").not());
}
