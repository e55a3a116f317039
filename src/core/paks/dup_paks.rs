//! Duplicate pak detector: identical archives under different names

use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;

use super::{find_paks, open_pak};
use crate::cli::{AppContext, DupPaksArgs};
use crate::infra::config::load_config;
use crate::infra::io::read_file_smart;

/// Content hash → paks holding those bytes, both in discovery order
pub type Groups = IndexMap<String, Vec<PathBuf>>;

/// Hash every pak that opens as a zip. Unreadable archives are skipped.
pub fn group_by_hash(paks: &[PathBuf]) -> Result<Groups> {
    let mut groups = Groups::new();
    for pak in paks {
        if let Err(e) = open_pak(pak) {
            tracing::warn!("Couldn't open {}: {e:#}", pak.display());
            continue;
        }
        let content = read_file_smart(pak)?;
        let hash = blake3::hash(content.as_ref()).to_hex().to_string();
        groups.entry(hash).or_default().push(pak.clone());
    }
    Ok(groups)
}

pub fn render(groups: &Groups) -> String {
    let mut out = String::new();
    for (hash, paks) in groups {
        let Some((first, rest)) = paks.split_first() else { continue };
        out.push_str(&format!("BLAKE3 {hash}\n{}\n", first.display()));
        for dup in rest {
            out.push_str(&format!("DUPLICATE {}\n", dup.display()));
        }
    }
    out
}

pub fn run(args: DupPaksArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let paks = find_paks(&args.paths, &config.ignore_patterns)?;
    if ctx.dry_run {
        println!("Would hash {} paks", paks.len());
        return Ok(());
    }
    let groups = group_by_hash(&paks)?;
    let dups = groups.values().filter(|g| g.len() > 1).count();
    tracing::info!("{} distinct paks, {dups} with duplicates", groups.len());
    print!("{}", render(&groups));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paks::testutil::write_pak;

    #[test]
    fn groups_identical_archives() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a/res-ui_0.1.dpk");
        write_pak(&a, &[("ui/main.menu", b"menu")]);
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let b = dir.path().join("b/res-ui_0.1.pk3");
        std::fs::copy(&a, &b).unwrap();
        let c = dir.path().join("c.pk3");
        write_pak(&c, &[("other.txt", b"other")]);
        std::fs::write(dir.path().join("broken.pk3"), "not a zip").unwrap();

        let paks = find_paks(&[dir.path()], &[]).unwrap();
        let groups = group_by_hash(&paks).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![a.clone(), b.clone()]);

        let hash = blake3::hash(&std::fs::read(&a).unwrap()).to_hex().to_string();
        let out = render(&groups);
        assert!(out.starts_with(&format!("BLAKE3 {hash}\n{}\nDUPLICATE {}\n", a.display(), b.display())), "{out}");
        assert!(out.contains(&format!("\n{}\n", c.display())));
        assert!(!out.contains("broken"));
    }
}
