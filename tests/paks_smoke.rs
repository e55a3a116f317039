// Pak scanners run against real zip archives on disk.
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod util;

const ENTITIES: &[u8] = b"{\n\"classname\" \"worldspawn\"\n}\n\
{\n\"classname\" \"team_human_spawn\"\n\"origin\" \"0 0 0\"\n}\n\
{\n\"classname\" \"team_human_spawn\"\n}\n\0";

#[test]
fn dup_paks_groups_by_content() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let a = tmp.path().join("a/tex-common_1.0.dpk");
    let b = tmp.path().join("b/tex-common_1.0.pk3");
    util::write_pak(&a, &[("textures/x.tga", b"pixels")]);
    std::fs::create_dir_all(b.parent().expect("parent")).expect("dir");
    std::fs::copy(&a, &b).expect("copy");
    std::fs::write(tmp.path().join("a/broken.dpk"), "junk").expect("write");

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).args(["dup-paks", "a", "b"]);
    cmd.assert()
        .success()
        .stdout(
            predicate::str::starts_with("BLAKE3 ")
                .and(predicate::str::contains("a/tex-common_1.0.dpk\nDUPLICATE b/tex-common_1.0.pk3\n"))
                .and(predicate::str::contains("broken").not()),
        )
        .stderr(predicate::str::contains("Couldn't open"));
}

#[test]
fn map_entities_census() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let bsp = util::bsp_with_entities(ENTITIES);
    util::write_pak(&tmp.path().join("paks/map-yard_1.0.dpk"), &[("maps/yard.bsp", &bsp)]);

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path()).args(["map-entities", "paks", "--quiet"]);
    cmd.assert().success().stdout(
        "team_human_spawn\n\tyard 2 paks/map-yard_1.0.dpk\nworldspawn\n\tyard 1 paks/map-yard_1.0.dpk\n",
    );
}

#[test]
fn script_keywords_census() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    util::write_pak(
        &tmp.path().join("paks/tex-a.dpk"),
        &[("scripts/a.shader", b"textures/a\n{\n\tsurfaceparm nonsolid // note\n}\n")],
    );

    let mut cmd = Command::cargo_bin("ekit").expect("binary");
    cmd.current_dir(tmp.path())
        .args(["script-keywords", "shader", "paks", "--quiet"]);
    cmd.assert().success().stdout(
        "nonsolid\n\tpaks/tex-a.dpk scripts/a.shader 1\nsurfaceparm\n\tpaks/tex-a.dpk scripts/a.shader 1\n",
    );
}
