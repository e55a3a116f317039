// Source-tree audits: pch-check, cmake-headers, unique-words, merged.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn pch_check_reports_each_problem() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("src/good.cpp")
        .write_str("#include \"common/Common.h\"\n#include \"a.h\"\n")
        .expect("write");
    tmp.child("src/late.cpp")
        .write_str("#include \"a.h\"\n#include \"common/Common.h\"\n")
        .expect("write");
    tmp.child("src/none.cpp").write_str("int x;\n").expect("write");
    tmp.child("src/twice.cpp")
        .write_str("#include \"Common.h\"\n#include \"common.h\"\n")
        .expect("write");

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["pch-check", "src", "--header", "common.h"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let out = String::from_utf8(out).expect("utf8");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3, "{out}");
    assert!(lines[0].starts_with("Not first ") && lines[0].ends_with("late.cpp"));
    assert!(lines[1].starts_with("Not included ") && lines[1].ends_with("none.cpp"));
    assert!(lines[2].starts_with("Multiply included ") && lines[2].ends_with("twice.cpp"));
    assert_eq!(lines[0].find("src"), Some(26));
}

#[test]
fn pch_check_needs_a_source_root() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).args(["pch-check", "missing"]);
    cmd.assert().failure().stderr(predicate::str::contains("Source root not found"));
}

#[test]
fn cmake_headers_from_config() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("engine/qcommon/q_shared.h").touch().expect("touch");
    tmp.child("engine/qcommon/unlisted.H").touch().expect("touch");
    tmp.child("engine/third_party/skip.h").touch().expect("touch");
    tmp.child("srclibs.cmake")
        .write_str("set(ENGINELIST\n  ${engine_dir}/qcommon/q_shared.h\n)\n")
        .expect("write");
    let engine = tmp.path().join("engine");
    tmp.child("enginekit.toml")
        .write_str(&format!(
            "[[cmake.checks]]\nname = \"engine\"\npath = {:?}\ncmake = \"srclibs.cmake\"\nignore = [\"third_party\"]\n\n[cmake.checks.substitutions]\nengine_dir = {:?}\n",
            engine.display().to_string(),
            engine.display().to_string(),
        ))
        .expect("write config");

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).arg("cmake-headers");
    cmd.assert().success().stdout(
        predicate::str::contains("Missing headers from engine (out of 2):\n")
            .and(predicate::str::contains("unlisted.H"))
            .and(predicate::str::contains("q_shared.h").not())
            .and(predicate::str::contains("skip.h").not()),
    );
}

#[test]
fn cmake_headers_without_checks_fails() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).arg("cmake-headers");
    cmd.assert().failure().stderr(predicate::str::contains("No checks configured"));
}

#[test]
fn unique_words_over_subpaths() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("src/a.cpp")
        .write_str("void Shared();\nint Lonely;\n")
        .expect("write");
    tmp.child("src/b.cpp").write_str("void Shared();\n").expect("write");
    tmp.child("libs/z.h").write_str("VendorThing\n").expect("write");

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["unique-words", ".", "--subpath", "src", "--subpath", "libs", "--exclude", "libs"]);
    cmd.assert().success().stdout(
        predicate::str::contains(format!("{:<50} Lonely\n", "src/a.cpp:2"))
            .and(predicate::str::contains(format!("{:<50} int\n", "src/a.cpp:2")))
            .and(predicate::str::contains("Shared").not())
            .and(predicate::str::contains("VendorThing").not()),
    );
}

fn git(dir: &std::path::Path, args: &[&str]) -> bool {
    git_at(dir, "2020-01-01T00:00:00", args)
}

// Fixed dates keep identical empty commits on two branches distinct.
fn git_at(dir: &std::path::Path, date: &str, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .args(["-c", "user.name=t", "-c", "user.email=t@t", "-c", "commit.gpgsign=false"])
        .args(args)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[test]
fn merged_finds_rebased_commits() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let repo = tmp.path();
    if !git(repo, &["init", "-q", "-b", "master"]) {
        eprintln!("git unavailable; skipping");
        return;
    }
    assert!(git(repo, &["commit", "-q", "--allow-empty", "-m", "Base"]));
    assert!(git(repo, &["checkout", "-q", "-b", "feature"]));
    assert!(git_at(repo, "2020-01-02T00:00:00", &["commit", "-q", "--allow-empty", "-m", "Add thing"]));
    assert!(git_at(repo, "2020-01-03T00:00:00", &["commit", "-q", "--allow-empty", "-m", "Local only"]));
    assert!(git(repo, &["checkout", "-q", "master"]));
    assert!(git_at(repo, "2020-01-04T00:00:00", &["commit", "-q", "--allow-empty", "-m", "Add thing"]));
    assert!(git_at(repo, "2020-01-05T00:00:00", &["commit", "-q", "--allow-empty", "-m", "Later"]));

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(repo).args(["merged", "feature", "master"]);
    cmd.assert().success().stdout(format!(
        "{:<12} Add thing\n{:<12} Local only\n",
        "~1", "not found"
    ));
}
