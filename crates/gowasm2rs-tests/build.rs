//! Transpile every `data/wat/*.wat` fixture into `OUT_DIR/<name>.rs` and
//! collect them in `OUT_DIR/mod.rs` as `pub mod <name>`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gowasm2rs::{transpile, TranspileOptions};

fn main() -> Result<()> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").context("OUT_DIR not set")?);
    let wat_dir = Path::new("data/wat");
    println!("cargo:rerun-if-changed={}", wat_dir.display());

    let mut fixtures: Vec<PathBuf> = fs::read_dir(wat_dir)
        .with_context(|| format!("reading {}", wat_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "wat"))
        .collect();
    fixtures.sort();

    let options = TranspileOptions {
        parallel: false,
        ..TranspileOptions::default()
    };
    let mut mod_rs = String::new();
    for path in &fixtures {
        println!("cargo:rerun-if-changed={}", path.display());
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("bad fixture name {}", path.display()))?;
        let wasm = wat::parse_file(path).with_context(|| format!("assembling {}", path.display()))?;
        let rust = transpile(&wasm, &options)
            .with_context(|| format!("transpiling {}", path.display()))?;
        fs::write(out_dir.join(format!("{name}.rs")), rust)?;
        writeln!(
            mod_rs,
            "pub mod {name} {{\n    include!(concat!(env!(\"OUT_DIR\"), \"/{name}.rs\"));\n}}"
        )?;
    }
    fs::write(out_dir.join("mod.rs"), mod_rs)?;
    Ok(())
}
