//! Entity classname census over the BSPs inside paks

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use super::bsp::entities_lump;
use super::{entry_names, find_paks, open_pak, read_entry};
use crate::cli::{AppContext, MapEntitiesArgs};
use crate::infra::config::load_config;
use crate::infra::utils::ProgressUtils;

static MAP_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^maps/([^/\\]+)\.bsp$").expect("valid map entry regex"));

static ENTITY: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r#"(?-u)\A\{\n("[^"]*" "[^"]*" *\n)*\}\n"#).expect("valid entity regex")
});

static PAIR: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r#"(?-u)"([^"]*)" "([^"]*)""#).expect("valid key/value regex"));

/// Map name of a `maps/<name>.bsp` entry: the part before the first `_`
pub fn map_name(entry: &str) -> Option<String> {
    let caps = MAP_ENTRY.captures(entry)?;
    let stem = &caps[1];
    Some(stem.split('_').next().unwrap_or(stem).to_string())
}

/// Classname counts of one entity lump. Stops at the first block that does
/// not parse.
pub fn count_classnames(lump: &[u8], origin: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let mut rest = lump;
    while rest.len() > 1 {
        let Some(m) = ENTITY.find(rest) else {
            let shown = String::from_utf8_lossy(&rest[..rest.len().min(200)]);
            tracing::warn!("Parsing entities from {origin} failed here: {shown:?}");
            break;
        };
        let block = m.as_bytes();
        rest = &rest[m.end()..];

        let classname = PAIR
            .captures_iter(block)
            .filter(|c| &c[1] == b"classname")
            .last()
            .map(|c| String::from_utf8_lossy(&c[2]).into_owned());
        match classname {
            Some(name) => *counts.entry(name).or_insert(0) += 1,
            None => tracing::warn!(
                "No classname in entity in {origin} - {}",
                String::from_utf8_lossy(block).trim_end()
            ),
        }
    }
    counts
}

/// (classname, map, count) rows of one pak
pub fn scan_pak(pak: &Path) -> Result<Vec<(String, String, usize)>> {
    let mut archive = open_pak(pak)?;
    let mut rows = Vec::new();
    for name in entry_names(&archive) {
        let Some(map) = map_name(&name) else { continue };
        let data = match read_entry(&mut archive, &name) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Bad zip file {}: {e:#}", pak.display());
                continue;
            }
        };
        let lump = match entities_lump(&data) {
            Ok(lump) => lump,
            Err(e) => {
                tracing::warn!("{}:{name}: {e}", pak.display());
                continue;
            }
        };
        let origin = pak.display().to_string();
        for (classname, count) in count_classnames(lump, &origin) {
            rows.push((classname, map.clone(), count));
        }
    }
    Ok(rows)
}

/// classname → sorted (map, count, pak)
pub type Census = BTreeMap<String, Vec<(String, usize, String)>>;

pub fn census(paks: &[PathBuf], quiet: bool) -> Census {
    let progress = ProgressUtils::bar(paks.len(), quiet, "reading maps");
    let per_pak: Vec<(String, Vec<(String, String, usize)>)> = paks
        .par_iter()
        .filter_map(|pak| {
            let rows = scan_pak(pak);
            progress.inc(1);
            match rows {
                Ok(rows) => Some((pak.display().to_string(), rows)),
                Err(e) => {
                    tracing::warn!("{e:#}");
                    None
                }
            }
        })
        .collect();
    progress.finish_and_clear();

    let mut census = Census::new();
    for (pak, rows) in per_pak {
        for (classname, map, count) in rows {
            census.entry(classname).or_default().push((map, count, pak.clone()));
        }
    }
    for rows in census.values_mut() {
        rows.sort();
    }
    census
}

pub fn render(census: &Census) -> String {
    let mut out = String::new();
    for (classname, rows) in census {
        out.push_str(classname);
        out.push('\n');
        for (map, count, pak) in rows {
            out.push_str(&format!("\t{map} {count} {pak}\n"));
        }
    }
    out
}

pub fn run(args: MapEntitiesArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let paks = find_paks(&args.paths, &config.ignore_patterns)?;
    if ctx.dry_run {
        println!("Would read {} paks", paks.len());
        return Ok(());
    }
    print!("{}", render(&census(&paks, ctx.quiet)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paks::bsp::build_bsp;
    use crate::core::paks::testutil::write_pak;

    const ENTS: &[u8] = b"{\n\"classname\" \"worldspawn\"\n\"message\" \"x\"\n}\n\
{\n\"classname\" \"team_alien_spawn\" \n\"origin\" \"0 0 0\"\n}\n\
{\n\"origin\" \"1 1 1\"\n}\n\
{\n\"classname\" \"team_alien_spawn\"\n}\n\0";

    #[test]
    fn map_names_stop_at_underscore() {
        assert_eq!(map_name("maps/plat23_b1.bsp"), Some("plat23".into()));
        assert_eq!(map_name("MAPS/Station15.BSP"), Some("Station15".into()));
        assert_eq!(map_name("maps/sub/x.bsp"), None);
        assert_eq!(map_name("maps/x.bsp.bak"), None);
    }

    #[test]
    fn counts_classnames_until_garbage() {
        let counts = count_classnames(ENTS, "test");
        assert_eq!(counts.get("team_alien_spawn"), Some(&2));
        assert_eq!(counts.get("worldspawn"), Some(&1));

        let counts = count_classnames(b"{\n\"classname\" \"a\"\n}\nbroken\n{\n\"classname\" \"b\"\n}\n", "test");
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn census_over_paks() {
        let dir = tempfile::tempdir().unwrap();
        let bsp = build_bsp(46, ENTS);
        write_pak(&dir.path().join("map-yard_1.0.dpk"), &[("maps/yard_b2.bsp", &bsp), ("maps/yard.txt", b"")]);
        write_pak(&dir.path().join("map-arena.pk3"), &[("maps/arena.bsp", &bsp)]);
        std::fs::write(dir.path().join("junk.pk3"), "nope").unwrap();

        let paks = find_paks(&[dir.path()], &[]).unwrap();
        let out = render(&census(&paks, true));
        let arena = dir.path().join("map-arena.pk3");
        let yard = dir.path().join("map-yard_1.0.dpk");
        assert!(out.starts_with("team_alien_spawn\n"), "{out}");
        assert!(out.contains(&format!(
            "team_alien_spawn\n\tarena 2 {}\n\tyard 2 {}\nworldspawn\n",
            arena.display(),
            yard.display()
        )));
    }
}
