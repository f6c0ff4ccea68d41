use anyhow::{Context, Result};
use clap::Parser;
use gowasm2rs::{transpile, TranspileOptions};
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;

/// gowasm2rs: translate a Go-compiled WebAssembly module into Rust source.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input WebAssembly binary (.wasm)
    input: PathBuf,

    /// Output Rust source file (stdout when omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Crate path the generated code imports the runtime from
    #[arg(long, default_value = "gowasm2rs_runtime")]
    runtime_path: String,

    /// Translate functions on a single thread
    #[arg(long)]
    no_parallel: bool,

    /// Do not emit name-section function names as doc comments
    #[arg(long)]
    no_names: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> TranspileOptions {
        TranspileOptions {
            runtime_path: self.runtime_path.clone(),
            parallel: !self.no_parallel,
            emit_names: !self.no_names,
        }
    }
}

/// Maps the number of `--verbose` flags to a level filter.
fn verbosity_level(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        3.. => LevelFilter::Trace,
    }
}

fn init_logger(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(verbosity_level(verbosity))
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    log::info!("transpiling {}", cli.input.display());

    let wasm_bytes =
        fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input.display()))?;

    let rust_code = transpile(&wasm_bytes, &cli.options()).context("transpilation failed")?;

    if let Some(output_path) = &cli.output {
        fs::write(output_path, &rust_code)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        log::info!("wrote {}", output_path.display());
    } else {
        print!("{rust_code}");
    }

    Ok(())
}
