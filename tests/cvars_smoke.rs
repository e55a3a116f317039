// End-to-end runs of `ekit cvars` over a tiny cgame checkout.
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod util;

// Removal mode deletes only the dead cvar's declaration and definition.
#[test]
fn dead_cvar_removal_patch() {
    let tmp = util::make_cvar_checkout();
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["cvars", "-b", "build", "-v", "cg_dead", "-j", "2", "--quiet"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let out = String::from_utf8(out).expect("utf8 stdout");

    assert!(out.starts_with("cg_dead\n"), "{out}");
    assert!(out.contains("DECL "));
    assert!(out.contains("DEF "));
    let removed: Vec<&str> = out
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("---"))
        .collect();
    assert_eq!(removed, vec!["-extern vmCvar_t cg_dead;", "-vmCvar_t cg_dead;"]);
    assert!(!out.contains("\ncg_live\n"));
}

// Migration rewrites the typed read of a live cvar.
#[test]
fn live_cvar_migration_patch() {
    let tmp = util::make_cvar_checkout();
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["cvars", "-b", "build", "-v", "cg_live", "-m", "--quiet"]);

    cmd.assert().success().stdout(
        predicate::str::contains("INT ")
            .and(predicate::str::contains("+extern Cvar::Cvar<int> cg_live;"))
            .and(predicate::str::contains("+\treturn cg_live.Get();")),
    );
}

// The plan is printed without touching the build directory.
#[test]
fn dry_run_prints_plan() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["cvars", "-b", "nowhere", "-m", "--dry-run"]);
    cmd.assert().success().stdout(
        predicate::str::contains("build dir:   nowhere").and(predicate::str::contains("mode:        migrate")),
    );
}

// A missing compile database is an error, not an empty report.
#[test]
fn missing_compile_database_fails() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    std::fs::create_dir_all(tmp.path().join("build")).expect("build dir");
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).args(["cvars", "-b", "build", "--quiet"]);
    cmd.assert().failure().stderr(predicate::str::contains("compile_commands.json"));
}
