//! `unlink-compare`: the compare-offsets diagnostic utility (§1 "out of
//! scope (external collaborators)", §9 ambient stack). Given an
//! extracted module's bytes and a second ROM image, fuzzily locates
//! the best-matching offset range in that second ROM.
//!
//! This is a thin wrapper around [`unlink_core::diagnostics::fuzzy_locate`];
//! it performs no module or reference recovery of its own.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

/// Fuzzily locates an extracted module's bytes inside a second ROM image.
#[derive(Parser, Debug)]
#[command(name = "unlink-compare", version, about)]
struct Cli {
    /// Path to the extracted module (the "needle").
    module: PathBuf,

    /// Path to the ROM to search within (the "haystack").
    rom: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("unlink-compare: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let needle = fs::read(&cli.module).with_context(|| format!("reading module '{}'", cli.module.display()))?;
    let haystack = fs::read(&cli.rom).with_context(|| format!("reading ROM '{}'", cli.rom.display()))?;

    match unlink_core::diagnostics::fuzzy_locate(&needle, &haystack) {
        Some(m) => {
            println!(
                "best match at 0x{:X} (score {:.2}%), {} bytes",
                m.offset,
                m.score * 100.0,
                needle.len()
            );
            Ok(())
        }
        None => {
            println!("no plausible match found");
            Ok(())
        }
    }
}
