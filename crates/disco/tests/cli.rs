//! The `disco` binary against a temporary data directory.

use std::path::Path;
use std::process::{Command, Output};

fn disco(data_dir: &Path, key: Option<&str>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_disco"));
    cmd.args(args)
        .env("DISCO_DATA_DIR", data_dir)
        .env("DISCO_LOG_LEVEL", "error")
        .env_remove("DISCO_ENCRYPTION_KEY")
        .env_remove("RUST_LOG");
    if let Some(key) = key {
        cmd.env("DISCO_ENCRYPTION_KEY", key);
    }
    cmd.output().unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn init(data_dir: &Path) -> String {
    let out = stdout(&disco(data_dir, None, &["init"]));
    out.lines()
        .find_map(|line| line.strip_prefix("Encryption key: "))
        .unwrap()
        .to_string()
}

#[test]
fn test_init_then_store_commands() {
    let dir = tempfile::tempdir().unwrap();
    let key = init(dir.path());
    assert!(dir.path().join("disco.toml").exists());
    assert!(dir.path().join("disco.db").exists());

    stdout(&disco(dir.path(), Some(key.as_str()), &["set", "app/config", "v1"]));
    stdout(&disco(dir.path(), Some(key.as_str()), &["set", "--namespace", "dev", "app/config", "v2"]));
    assert_eq!(stdout(&disco(dir.path(), Some(key.as_str()), &["get", "app/config"])), "v1");
    assert_eq!(
        stdout(&disco(dir.path(), Some(key.as_str()), &["get", "--namespace", "dev", "app/config"])),
        "v2"
    );
    assert_eq!(
        stdout(&disco(dir.path(), Some(key.as_str()), &["ls", "--namespace", "*"])),
        "default:app/config\ndev:app/config\n"
    );

    stdout(&disco(dir.path(), Some(key.as_str()), &["rm", "app/config"]));
    let missing = disco(dir.path(), Some(key.as_str()), &["get", "app/config"]);
    assert!(!missing.status.success());
}

#[test]
fn test_wildcard_namespace_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let key = init(dir.path());
    let out = disco(dir.path(), Some(key.as_str()), &["get", "--namespace", "*", "k"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("namespace '*' is not supported"));
}

#[test]
fn test_uninitialized_node_hint() {
    let dir = tempfile::tempdir().unwrap();
    let key = disco_core_key();
    let out = disco(dir.path(), Some(key.as_str()), &["ls"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.starts_with("Error: local user not found"), "{}", stderr);
    assert!(stderr.contains("Did you forget to run 'disco init'?"));
}

#[test]
fn test_wrong_or_missing_key() {
    let dir = tempfile::tempdir().unwrap();
    init(dir.path());

    let out = disco(dir.path(), None, &["ls"]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("encryption key not provided"));

    let out = disco(dir.path(), Some(disco_core_key().as_str()), &["ls"]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("doesn't match"));
}

#[test]
fn test_users_roles_and_invites() {
    let dir = tempfile::tempdir().unwrap();
    let key = init(dir.path());
    let run = |args: &[&str]| disco(dir.path(), Some(key.as_str()), args);

    stdout(&run(&["role", "add", "reader", "r:default:store:*"]));
    stdout(&run(&["user", "add", "bob", "--roles", "reader"]));
    assert_eq!(stdout(&run(&["user", "ls"])), "NAME   ROLES\nbob    reader\n");

    let role_rm = run(&["role", "rm", "reader"]);
    assert!(!role_rm.status.success());
    let stderr = String::from_utf8_lossy(&role_rm.stderr);
    assert!(stderr.contains("1 user has this role"), "{}", stderr);
    assert!(stderr.contains("pass --force"));

    let invite = stdout(&run(&["invite", "user", "bob", "--ttl", "30m"]));
    let mut lines = invite.lines();
    assert!(lines.next().unwrap().starts_with("Token: "));
    assert!(lines.next().unwrap().starts_with("Expires: "));

    let listed = stdout(&run(&["invite", "ls"]));
    assert!(listed.starts_with("UUID"));
    assert!(listed.contains("bob"));

    stdout(&run(&["role", "rm", "--force", "reader"]));
    assert_eq!(stdout(&run(&["user", "ls"])), "NAME   ROLES\nbob\n");
}

fn disco_core_key() -> String {
    disco::core::SymmetricKey::generate().encode()
}
