//! Command-line driver for the ROM unlinker (SPEC_FULL.md §6 "CLI").
//!
//! Everything in this binary is the "external collaborator" work the
//! engine crate deliberately stays out of: argument parsing, reading
//! the ROM/source-tree/annotation files from disk, and writing the
//! resulting object files back out. The actual unlinking is one call
//! to [`unlink_core::unlink`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use unlink_core::driver::UnlinkInputs;
use unlink_core::{IslandMode, UnlinkOptions};

/// Unlinks a classic Macintosh ROM image into relocatable object files.
#[derive(Parser, Debug)]
#[command(name = "unlink", version, about)]
struct Cli {
    /// Source tree (containing Make/VectorTable.a or VectorTable.a, and
    /// OS/DispTable.a or DispTable.a), if labelling vector/trap entries
    /// from source is desired.
    src: Option<PathBuf>,

    /// The ROM image to unlink.
    rom: Option<PathBuf>,

    /// Build every object but never write any to disk, regardless of
    /// each FILE directive's WRITEOUT flag.
    #[arg(long)]
    dry_run: bool,

    /// Overrides the annotation file's ISLANDGUESS directive (or its
    /// default of ON).
    #[arg(long, value_enum)]
    island_mode: Option<IslandModeArg>,

    /// Raises log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum IslandModeArg {
    On,
    Hide,
    Off,
}

impl From<IslandModeArg> for IslandMode {
    fn from(a: IslandModeArg) -> Self {
        match a {
            IslandModeArg::On => IslandMode::On,
            IslandModeArg::Hide => IslandMode::Hide,
            IslandModeArg::Off => IslandMode::Off,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("unlink: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves the two positional forms: `unlink ROM` or `unlink SRC ROM`.
fn resolve_args(cli: &Cli) -> Result<(Option<&Path>, &Path)> {
    match (&cli.src, &cli.rom) {
        (Some(src), Some(rom)) => Ok((Some(src.as_path()), rom.as_path())),
        (Some(rom_only), None) => Ok((None, rom_only.as_path())),
        (None, _) => anyhow::bail!("usage: unlink ROM | unlink SRC ROM"),
    }
}

fn run(cli: Cli) -> Result<()> {
    let (src, rom_path) = resolve_args(&cli)?;

    let rom_bytes = fs::read(rom_path).with_context(|| format!("reading ROM '{}'", rom_path.display()))?;
    let out_dir = rom_path.parent().unwrap_or_else(|| Path::new("."));

    let vector_table_src = src.and_then(|s| read_source_file(s, &["Make/VectorTable.a", "VectorTable.a"]));
    let disp_table_src = src.and_then(|s| read_source_file(s, &["OS/DispTable.a", "DispTable.a"]));

    let annotation_path = annotation_path_for(rom_path);
    let manual_text = load_annotation_file(&annotation_path)?;

    let options = UnlinkOptions {
        island_mode_override: cli.island_mode.map(Into::into),
        dry_run: cli.dry_run,
    };
    let inputs = UnlinkInputs {
        vector_table_src: vector_table_src.as_deref(),
        disp_table_src: disp_table_src.as_deref(),
        manual_text: &manual_text,
    };

    let outputs = unlink_core::unlink(&rom_bytes, &inputs, &options).context("unlinking ROM")?;

    for file in &outputs {
        if !file.writeout {
            log::debug!("{}: built, not written (dry-run or no WRITEOUT flag)", file.relpath);
            continue;
        }
        let dest = out_dir.join(&file.relpath);
        write_if_changed(&dest, &file.bytes)?;

        let descriptor_path = descriptor_path_for(&dest);
        write_if_changed(&descriptor_path, unlink_core::OBJECT_DESCRIPTOR)?;
    }

    Ok(())
}

/// `ROMPATH + "-info.txt"` (§6 "Annotation file").
fn annotation_path_for(rom_path: &Path) -> PathBuf {
    let mut s = rom_path.as_os_str().to_os_string();
    s.push("-info.txt");
    PathBuf::from(s)
}

/// The companion file-type/creator descriptor's path: same basename,
/// `.finf` extension (classic Mac "file info" convention, since the
/// distilled spec names only the descriptor's 8-byte contents).
fn descriptor_path_for(object_path: &Path) -> PathBuf {
    object_path.with_extension("finf")
}

fn read_source_file(src: &Path, candidates: &[&str]) -> Option<String> {
    for rel in candidates {
        let path = src.join(rel);
        if let Ok(bytes) = fs::read(&path) {
            return Some(unlink_core::text::normalize(&bytes));
        }
    }
    log::warn!("{}: none of {:?} found", src.display(), candidates);
    None
}

/// Loads the annotation file, applying the self-edit pass (§4.3) and
/// writing the rewritten text back if it changed. A missing annotation
/// file fails soft: processing continues with an empty map.
fn load_annotation_file(path: &Path) -> Result<String> {
    let raw = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("{}: no annotation file found", path.display());
            return Ok(String::new());
        }
        Err(e) => return Err(e).with_context(|| format!("reading annotation file '{}'", path.display())),
    };

    let rewritten = unlink_core::manual::self_edit(&raw);
    if rewritten != raw {
        fs::write(path, &rewritten).with_context(|| format!("rewriting annotation file '{}'", path.display()))?;
    }

    Ok(unlink_core::text::normalize(&rewritten))
}

/// Skips the write if `path` already holds identical bytes (§4.10
/// "Identical contents are not rewritten to disk"). Missing parent
/// directories are created; failures creating them are swallowed, per
/// the source ambiguity recorded in DESIGN.md.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Ok(existing) = fs::read(path) {
        if existing == bytes {
            return Ok(());
        }
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    fs::write(path, bytes).with_context(|| format!("writing '{}'", path.display()))
}
