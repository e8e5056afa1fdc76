//! Command-line behavior of the `clonar` binary

use assert_cmd::Command;
use predicates::prelude::*;

mod common;

const OFFLINE_CONFIG: &str = r#"
provider:
  type: ollama
  ollama:
    host: http://127.0.0.1:9
    model: llama3.2:latest
planner:
  default_mode: quick
actions:
  serpapi:
    endpoint: http://127.0.0.1:9/search.json
logging:
  level: warn
"#;

fn clonar(config_path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("clonar").unwrap();
    cmd.env_remove("SERPAPI_KEY")
        .env_remove("SERPAPI_ENDPOINT")
        .env_remove("CLONAR_PLANNER_MODE")
        .env_remove("CLONAR_PROVIDER")
        .arg("--config")
        .arg(config_path);
    cmd
}

#[test]
fn test_novelty_ranks_and_drops_repeats() {
    let (_dir, config_path) = common::temp_config_file(OFFLINE_CONFIG);

    clonar(&config_path)
        .arg("novelty")
        .arg("tell me more")
        .arg("What do people regret about this hotel?")
        .arg("any cheaper options")
        .arg("--recent")
        .arg("any cheaper options nearby?")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "1.00  What do people regret about this hotel?",
        ))
        .stdout(predicate::str::contains("0.30  tell me more"))
        .stdout(predicate::str::contains("cheaper").not());
}

#[test]
fn test_quick_plan_json_is_offline() {
    let (_dir, config_path) = common::temp_config_file(OFFLINE_CONFIG);

    clonar(&config_path)
        .args(["plan", "flights to Tokyo and a hotel near the airport", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"vertical\": \"flight\""))
        .stdout(predicate::str::contains("\"slot\": \"airport\""))
        .stdout(predicate::str::contains("\"city_only\""));
}

#[test]
fn test_invalid_plan_mode_fails() {
    let (_dir, config_path) = common::temp_config_file(OFFLINE_CONFIG);

    clonar(&config_path)
        .args(["plan", "hotels in Rome", "--mode", "fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid plan mode"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_dir, config_path) = common::temp_config_file(
        r#"
provider:
  type: ollama
session:
  capacity: 0
"#,
    );

    clonar(&config_path)
        .args(["novelty", "anything else?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.capacity"));
}

#[test]
fn test_shop_without_key_reports_failed_sub_query() {
    let (_dir, config_path) = common::temp_config_file(OFFLINE_CONFIG);

    clonar(&config_path)
        .args(["shop", "wireless headphones"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sub-queries failed"))
        .stdout(predicate::str::contains("No results"));
}

#[test]
fn test_shop_rejects_too_many_queries() {
    let (_dir, config_path) = common::temp_config_file(OFFLINE_CONFIG);

    clonar(&config_path)
        .args(["shop", "a", "b", "c", "d"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid action input"));
}
