#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn deckpipe(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("deckpipe").unwrap();
    cmd.current_dir(dir.path())
        .env("DECKPIPE_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

/// Initialized root whose dependency probe only looks inside the temp dir.
fn init_root(dir: &TempDir) {
    deckpipe(dir).arg("init").assert().success();
    let sandbox = dir.path().join("sandbox");
    let config = format!(
        "version: 1\n\
         dependencies:\n  \
           script_source_dir: {0}/scripts-src\n  \
           script_install_dir: {0}/scripts\n  \
           package_dirs: [{0}/apps]\n  \
           preset_dir: {0}/presets\n",
        sandbox.display()
    );
    std::fs::write(dir.path().join(".deckpipe/config.yaml"), config).unwrap();
}

fn create_profile(dir: &TempDir, id: &str) {
    deckpipe(dir)
        .args(["profile", "create", id, "--template", "dual-screen"])
        .assert()
        .success();
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().unwrap();
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir).arg("init").assert().success();

    assert!(dir.path().join(".deckpipe/profiles").is_dir());
    assert!(dir.path().join(".deckpipe/contexts").is_dir());
    assert!(dir.path().join(".deckpipe/config.yaml").exists());
    assert!(dir.path().join(".deckpipe/collections.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir).arg("init").assert().success();
    deckpipe(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir)
        .args(["profile", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deckpipe init"));
}

// ---------------------------------------------------------------------------
// templates and config
// ---------------------------------------------------------------------------

#[test]
fn template_list_shows_builtins() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dual-screen"))
        .stdout(predicate::str::contains("single-screen"));
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir).arg("init").assert().success();
    deckpipe(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_rejects_empty_script_dir() {
    let dir = TempDir::new().unwrap();
    deckpipe(&dir).arg("init").assert().success();
    std::fs::write(
        dir.path().join(".deckpipe/config.yaml"),
        "dependencies:\n  script_source_dir: \"\"\n",
    )
    .unwrap();
    deckpipe(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("script_source_dir is empty"));
}

// ---------------------------------------------------------------------------
// profiles
// ---------------------------------------------------------------------------

#[test]
fn profile_create_list_show() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("citra"));

    deckpipe(&dir)
        .args(["profile", "show", "citra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:layout"))
        .stdout(predicate::str::contains("one of, chose core:window:separate"));
}

#[test]
fn profile_create_rejects_duplicates_and_bad_ids() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["profile", "create", "citra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    deckpipe(&dir)
        .args(["profile", "create", "Bad:Id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid id"));

    deckpipe(&dir)
        .args(["profile", "create", "x", "--template", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template not found"));
}

#[test]
fn profile_clone_keeps_nodes() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["profile", "clone", "citra", "citra-docked"])
        .assert()
        .success();

    let original = stdout_json(deckpipe(&dir).args(["--json", "profile", "show", "citra"]));
    let copy = stdout_json(deckpipe(&dir).args(["--json", "profile", "show", "citra-docked"]));
    assert_eq!(original["definition"]["nodes"], copy["definition"]["nodes"]);
    assert_eq!(copy["definition"]["name"], "citra (copy)");
}

#[test]
fn profile_choose_changes_plan() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["profile", "choose", "citra", "core:window:layout", "core:window:side_by_side"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["plan", "--profile", "citra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:side_by_side"))
        .stdout(predicate::str::contains("core:window:separate").not());
}

#[test]
fn profile_choose_unknown_alternative_fails() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["profile", "choose", "citra", "core:window:layout", "core:window:single"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an alternative"));
}

#[test]
fn profile_enable_adds_to_plan_in_order() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    let plan = stdout_json(deckpipe(&dir).args(["--json", "plan", "--profile", "citra"]));
    let ids: Vec<&str> = plan
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["action_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["core:display:display_config", "core:window:separate"]);

    deckpipe(&dir)
        .args(["profile", "enable", "citra", "core:audio:routing"])
        .assert()
        .success();

    let plan = stdout_json(deckpipe(&dir).args(["--json", "plan", "--profile", "citra"]));
    let ids: Vec<&str> = plan
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["action_id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "core:display:display_config",
            "core:window:separate",
            "core:audio:routing"
        ]
    );
}

#[test]
fn profile_patch_accepts_inline_update() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args([
            "profile",
            "patch",
            "citra",
            r#"{"op": "set_metadata", "name": "Citra", "tags": ["emulators"]}"#,
        ])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("emulators"))
        .stdout(predicate::str::contains("Citra"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_reports_missing_script_and_fails() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["check", "--profile", "citra"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("core:window:separate"))
        .stdout(predicate::str::contains("script-missing"))
        .stderr(predicate::str::contains("block launching the primary target"));
}

#[test]
fn check_does_not_diagnose_unchosen_alternatives() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    let out = stdout_json(deckpipe(&dir).args(["--json", "check", "--profile", "citra"]));
    assert_eq!(out["launchable"], false);
    let nodes: Vec<&str> = out["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["node"].as_str().unwrap())
        .collect();
    assert!(nodes.contains(&"core:window:separate"));
    assert!(!nodes.contains(&"core:window:side_by_side"));
}

#[test]
fn check_installs_script_from_source_dir() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    let src = dir.path().join("sandbox/scripts-src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("emulatorwindowing.js"), "// script").unwrap();

    let out = stdout_json(deckpipe(&dir).args(["--json", "check", "--profile", "citra"]));
    let nodes: Vec<&str> = out["blockers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["node"].as_str().unwrap())
        .collect();
    assert!(!nodes.contains(&"core:window:separate"));
    assert!(dir
        .path()
        .join("sandbox/scripts/emulatorwindowing.js")
        .is_file());
}

// ---------------------------------------------------------------------------
// contexts and collections
// ---------------------------------------------------------------------------

#[test]
fn context_without_applicable_profile_fails() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");

    deckpipe(&dir)
        .args(["plan", "--context", "app-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no profile applies"));
}

#[test]
fn context_picks_profile_through_collections() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["profile", "patch", "citra", "{op: set_metadata, tags: [emulators]}"])
        .assert()
        .success();
    deckpipe(&dir)
        .args(["collection", "add", "emulators", "app-1"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["context", "show", "app-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Effective: citra"));

    deckpipe(&dir)
        .args(["plan", "--context", "app-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:separate"));
}

#[test]
fn context_override_is_local_and_revertible() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["context", "set-default", "app-1", "citra"])
        .assert()
        .success();

    deckpipe(&dir)
        .args([
            "context",
            "patch",
            "app-1",
            "{op: choose_one_of, id: 'core:window:layout', chosen: 'core:window:side_by_side'}",
        ])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["plan", "--context", "app-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:side_by_side"));

    // The profile itself is untouched.
    deckpipe(&dir)
        .args(["plan", "--profile", "citra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:separate"));

    deckpipe(&dir)
        .args(["context", "revert", "app-1", "core:window:layout"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["plan", "--context", "app-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:separate"));
}

#[test]
fn context_follows_later_profile_edits_for_untouched_nodes() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["context", "set-default", "app-1", "citra"])
        .assert()
        .success();
    deckpipe(&dir)
        .args(["context", "enable", "app-1", "core:audio:routing"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["profile", "choose", "citra", "core:window:layout", "core:window:side_by_side"])
        .assert()
        .success();

    let plan = stdout_json(deckpipe(&dir).args(["--json", "plan", "--context", "app-1"]));
    let ids: Vec<&str> = plan
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["action_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"core:window:side_by_side"));
    assert!(ids.contains(&"core:audio:routing"));
}

#[test]
fn context_defer_follows_other_profile() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    create_profile(&dir, "desktop");
    deckpipe(&dir)
        .args(["profile", "choose", "desktop", "core:window:layout", "core:window:side_by_side"])
        .assert()
        .success();

    deckpipe(&dir)
        .args([
            "context",
            "defer",
            "app-1",
            "core:window:layout",
            "--to",
            "desktop",
            "--profile",
            "citra",
        ])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["plan", "--context", "app-1", "--profile", "citra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core:window:side_by_side"));
}

#[test]
fn deleting_profile_drops_context_overrides() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["context", "set-default", "app-1", "citra"])
        .assert()
        .success();
    deckpipe(&dir)
        .args(["context", "enable", "app-1", "core:audio:routing"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["profile", "delete", "citra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 context(s) updated"));

    let ctx = stdout_json(deckpipe(&dir).args(["--json", "context", "show", "app-1"]));
    assert!(ctx["default_profile"].is_null());
    assert_eq!(ctx["overrides"].as_array().unwrap().len(), 0);
}

#[test]
fn context_reset_forgets_everything() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    create_profile(&dir, "citra");
    deckpipe(&dir)
        .args(["context", "set-default", "app-1", "citra"])
        .assert()
        .success();

    deckpipe(&dir)
        .args(["context", "reset", "app-1"])
        .assert()
        .success();
    assert!(!dir.path().join(".deckpipe/contexts/app-1.yaml").exists());

    deckpipe(&dir)
        .args(["context", "reset", "app-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("context not found"));
}

#[test]
fn profile_ids_cannot_leave_the_store() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    deckpipe(&dir)
        .args(["plan", "--profile", "../../x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid id"));
}

#[test]
fn set_default_requires_existing_profile() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    deckpipe(&dir)
        .args(["context", "set-default", "app-1", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("profile not found"));
}

// ---------------------------------------------------------------------------
// teardown log
// ---------------------------------------------------------------------------

#[test]
fn teardown_list_starts_empty() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    deckpipe(&dir)
        .args(["teardown", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to tear down."));
    assert!(dir.path().join(".deckpipe/teardown.db").exists());
}
