//! Shared fixtures for the integration tests
//!
//! Each helper lays out a small on-disk tree shaped like an engine
//! checkout or an asset directory.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use assert_fs::prelude::*;
use zip::write::SimpleFileOptions;

pub const CG_LOCAL_H: &str = "extern vmCvar_t cg_dead;\nextern vmCvar_t cg_live;\n";

pub const CG_MAIN_CPP: &str = "#include \"cg_local.h\"\n\
    \n\
    vmCvar_t cg_dead;\n\
    vmCvar_t cg_live;\n\
    \n\
    int f() {\n\
    \treturn cg_live.integer;\n\
    }\n";

/// A checkout with one cgame translation unit and its compile database
pub fn make_cvar_checkout() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("src/cgame/cg_local.h")
        .write_str(CG_LOCAL_H)
        .expect("write header");
    tmp.child("src/cgame/cg_main.cpp")
        .write_str(CG_MAIN_CPP)
        .expect("write source");

    let cgame = tmp.path().join("src/cgame");
    let source = cgame.join("cg_main.cpp");
    let db = serde_json::json!([{
        "directory": tmp.path().join("build"),
        "file": source,
        "arguments": ["c++", format!("-I{}", cgame.display()), "-c", source],
    }]);
    tmp.child("build/compile_commands.json")
        .write_str(&db.to_string())
        .expect("write compile_commands.json");
    tmp
}

/// Write a zip at `path` holding `(name, bytes)` entries
pub fn write_pak(
    path: &Path,
    entries: &[(&str, &[u8])],
)
{
    if let Some(parent) = path.parent()
    {
        std::fs::create_dir_all(parent).expect("pak dir");
    }
    let file = std::fs::File::create(path).expect("create pak");
    let mut zip = zip::ZipWriter::new(file);
    for (name, bytes) in entries
    {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish pak");
}

/// IBSP v46 whose only lump is the entity string
pub fn bsp_with_entities(entities: &[u8]) -> Vec<u8>
{
    let header_len = 8 + 17 * 8;
    let mut data = vec![0u8; header_len];
    data[0..4].copy_from_slice(b"IBSP");
    data[4..8].copy_from_slice(&46u32.to_le_bytes());
    data[8..12].copy_from_slice(&(header_len as u32).to_le_bytes());
    data[12..16].copy_from_slice(&(entities.len() as u32).to_le_bytes());
    data.extend_from_slice(entities);
    data
}
