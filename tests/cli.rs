//! 命令行集成测试

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "LINGUISE_CONFIG",
    "LINGUISE_API_URL",
    "LINGUISE_TARGET_LANG",
    "LINGUISE_TIMEOUT",
    "LINGUISE_STRICT",
    "LINGUISE_LOG_LEVEL",
];

/// 每个测试独立的工作目录，避免读到仓库里的配置或 .env
fn workdir() -> TempDir {
    TempDir::new().unwrap()
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("linguise-fragments").unwrap();
    cmd.current_dir(dir);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help() {
    let tmp = workdir();
    let dir = tmp.path();
    let output = cli(dir).arg("--help").output().unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["collect", "patch", "translate"] {
        assert!(help.contains(subcommand), "Help lists `{}`", subcommand);
    }
}

#[test]
fn test_collect_json_prints_carrier() {
    let tmp = workdir();
    let dir = tmp.path();
    let input = dir.join("payload.json");
    fs::write(&input, r#"{"title":"Welcome back","count":3}"#).unwrap();

    let output = cli(dir).arg("collect").arg(&input).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#"class="linguise-fragment""#));
    assert!(stdout.contains(r#"data-fragment-key="title""#));
    assert!(stdout.contains(">Welcome back</div>"));
}

#[test]
fn test_patch_json_with_carrier() {
    let tmp = workdir();
    let dir = tmp.path();
    let input = dir.join("payload.json");
    fs::write(&input, r#"{"title":"Welcome back","count":3}"#).unwrap();

    let collected = cli(dir).arg("collect").arg(&input).output().unwrap();
    assert!(collected.status.success());
    let carrier = String::from_utf8_lossy(&collected.stdout).replace(">Welcome back<", ">Bienvenue<");
    let carrier_path = dir.join("carrier.html");
    fs::write(&carrier_path, carrier).unwrap();

    let output = cli(dir)
        .arg("patch")
        .arg(&input)
        .arg("--carrier")
        .arg(&carrier_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        r#"{"title":"Bienvenue","count":3}"#
    );
}

#[test]
fn test_missing_input_fails() {
    let tmp = workdir();
    let dir = tmp.path();
    let output = cli(dir)
        .arg("collect")
        .arg(dir.join("does-not-exist.json"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_translate_with_unreachable_backend_keeps_input() {
    let tmp = workdir();
    let dir = tmp.path();
    let input = dir.join("payload.json");
    let payload = r#"{"title":"Welcome back"}"#;
    fs::write(&input, payload).unwrap();

    let output = cli(dir)
        .env("LINGUISE_API_URL", "http://127.0.0.1:9/translate")
        .env("LINGUISE_TIMEOUT", "2")
        .arg("translate")
        .arg(&input)
        .args(["--lang", "fr"])
        .output()
        .unwrap();

    assert!(output.status.success(), "Backend failures are not fatal");
    assert_eq!(String::from_utf8_lossy(&output.stdout), payload);
}
