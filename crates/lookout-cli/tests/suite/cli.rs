use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn lookout() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("lookout"))
}

#[test]
fn help_mentions_core_commands() {
    lookout().arg("--help").assert().success().stdout(
        predicate::str::contains("check-config")
            .and(predicate::str::contains("schema"))
            .and(predicate::str::contains("hash-password"))
            .and(predicate::str::contains("sign-eval"))
            .and(predicate::str::contains("dump")),
    );
}

#[test]
fn check_config_accepts_a_valid_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("lookout.toml");
    file.write_str("password = \"pw\"\neval_enabled = true\nip_masks = [\"127.0.0.1\"]\n")
        .unwrap();

    lookout()
        .arg("check-config")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(": ok"));
}

#[test]
fn check_config_reports_problems_as_json() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("lookout.toml");
    file.write_str("eval_enabled = true\n").unwrap();

    let output = lookout()
        .arg("check-config")
        .arg(file.path())
        .arg("--json")
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["valid"], serde_json::Value::Bool(false));
    assert_eq!(
        report["errors"][0],
        serde_json::Value::String("eval_enabled requires a password".into())
    );
}

#[test]
fn check_config_names_unknown_options() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("lookout.toml");
    file.write_str("isEnabled = true\n").unwrap();

    lookout()
        .arg("check-config")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("unknown configuration option `isEnabled`"));
}

#[test]
fn check_config_fails_hard_on_missing_files() {
    lookout()
        .arg("check-config")
        .arg("definitely/not/here.toml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn schema_is_json() {
    let output = lookout().arg("schema").assert().success().get_output().stdout.clone();
    let schema: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(schema["properties"]["headers_limit"].is_object());
}

#[test]
fn hashed_password_signs_eval_code() {
    let output = lookout()
        .arg("hash-password")
        .write_stdin("hunter2\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let hash = String::from_utf8(output).unwrap().trim().to_owned();
    assert_eq!(hash.len(), 64);

    lookout()
        .args(["sign-eval", "--password-hash", &hash, "1 + 1"])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap());

    lookout()
        .args(["client-hello", "visitor", "--password-hash", &hash])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn sign_eval_rejects_malformed_hashes() {
    lookout()
        .args(["sign-eval", "--password-hash", "nothex", "code"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("64 lowercase hex"));
}

#[test]
fn dump_applies_limits() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("value.json");
    file.write_str(r#"{"a": {"b": {"c": {"d": 1}}}}"#).unwrap();

    let output = lookout()
        .arg("dump")
        .arg(file.path())
        .args(["--level-limit", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let dumped: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let third = &dumped["entries"][0]["value"]["entries"][0]["value"];
    assert_eq!(third["type"], "truncated");
    assert_eq!(third["reason"], "level");
}

#[test]
fn dump_rejects_level_limits_above_the_ceiling() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("value.json");
    file.write_str("[1]").unwrap();

    lookout()
        .arg("dump")
        .arg(file.path())
        .args(["--level-limit", "100000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at most 64"));
}
