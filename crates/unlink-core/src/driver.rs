//! The unlinker driver (§2 data flow, §4.10 object emitter): wires every
//! component together for one ROM and drives an [`ObjectSink`] per
//! output file range.
//!
//! This module is the architectural core the spec calls out in §1:
//! everything upstream (byte reader, scanners, table extractors) feeds
//! structures the driver consumes read-only; everything downstream (the
//! CLI's file I/O) is a thin adapter around [`unlink`].

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::Range;

use crate::emit::ObjectSink;
use crate::error::Error;
use crate::file_range::{self, FileRange};
use crate::island::{self, Island};
use crate::islandmode::{self, IslandMode};
use crate::labels::LabelMap;
use crate::manual::{self, AnnotationMap};
use crate::modules::{self, ModuleRange};
use crate::options::UnlinkOptions;
use crate::refscan::{self, RefSite};
use crate::rewrite;
use crate::rom::Rom;
use crate::source::{self, VectorLabel};
use crate::trap_table;
use crate::vector_table::{self, VectorTables};

/// The 8-byte descriptor file content written alongside every
/// `WRITEOUT` object (§6 "Object output").
pub const OBJECT_DESCRIPTOR: &[u8] = b"OBJ MPS ";

/// One emitted (built, possibly discarded) object file.
#[derive(Debug, Clone)]
pub struct FileOutput {
    pub relpath: String,
    pub writeout: bool,
    pub bytes: Vec<u8>,
}

/// Every source input the engine needs for one run, already decoded to
/// text/bytes by the caller (the CLI's file-reading adapter; see §1
/// "out of scope (external collaborators)").
#[derive(Debug, Default)]
pub struct UnlinkInputs<'a> {
    pub vector_table_src: Option<&'a str>,
    pub disp_table_src: Option<&'a str>,
    /// Already self-edited (§4.3) and ASCII/CRLF-normalized (§4.2 input contract).
    pub manual_text: &'a str,
}

fn nonisland_offsets(manual: &AnnotationMap) -> std::collections::BTreeSet<usize> {
    manual.get("NONISLAND").iter().map(|d| d.offset).collect()
}

/// Runs the full unlink pipeline over one ROM and returns the built
/// object-file bytes, one per `FILE` range, in file order.
pub fn unlink(rom_bytes: &[u8], inputs: &UnlinkInputs, options: &UnlinkOptions) -> Result<Vec<FileOutput>, Error> {
    let rom = Rom::load(rom_bytes)?;
    let trim = rom.trim();

    let manual = manual::parse(inputs.manual_text)?;

    let vtabs = vector_table::extract(&rom)?;
    let traps = trap_table::extract(&rom)?;

    let vector_src: Vec<VectorLabel> = inputs.vector_table_src.map(source::vector_labels).unwrap_or_default();
    let trap_src: BTreeMap<u16, String> = inputs.disp_table_src.map(source::trap_labels).unwrap_or_default();
    if inputs.vector_table_src.is_none() {
        log::warn!("no VectorTable.a source found; vector labels will be synthesized");
    }
    if inputs.disp_table_src.is_none() {
        log::warn!("no DispTable.a source found; trap labels will be placeholders");
    }

    let island_mode = options.island_mode_override.unwrap_or_else(|| islandmode::detect(&manual));
    let islands: Vec<Island> = match island_mode {
        IslandMode::Off => Vec::new(),
        _ => island::detect(&rom, &nonisland_offsets(&manual)),
    };

    let mut labels = LabelMap::build(&vtabs, &traps, &vector_src, &trap_src, &manual);
    if !islands.is_empty() {
        labels.apply_islands(&islands, &vtabs);
    }

    let module_ranges = modules::compute(&rom, &vtabs, &islands, &labels, &manual);

    let refguess_enabled = modules::enabled_ranges(&manual, "REFGUESS", trim);
    let all_refs = refscan::scan(&rom);
    let refs: Vec<RefSite> = all_refs
        .into_iter()
        .filter(|r| modules::in_any(&refguess_enabled, r.site))
        .collect();

    let island_sites: BTreeMap<usize, &Island> = islands.iter().map(|i| (i.site, i)).collect();
    let island_hide = island_mode == IslandMode::Hide;

    let file_ranges = file_range::compute(&manual, trim);

    let mut outputs = Vec::with_capacity(file_ranges.len());
    for fr in &file_ranges {
        let writeout = fr.has_flag("WRITEOUT") && !options.dry_run;
        let modules_in_file: Vec<&ModuleRange> = module_ranges
            .iter()
            .filter(|m| fr.range.contains(&m.range.start))
            .collect();

        let mut writer = crate::emit::ObjectFileWriter::new();
        emit_file(&mut writer, &rom, fr, &modules_in_file, &refs, &vtabs, &labels, &island_sites, island_hide);
        outputs.push(FileOutput {
            relpath: fr.relpath.clone(),
            writeout,
            bytes: writer.into_bytes(),
        });
    }

    Ok(outputs)
}

fn refs_in_range<'a>(refs: &'a [RefSite], range: &Range<usize>) -> Vec<RefSite> {
    refs.iter().filter(|r| range.contains(&r.site)).copied().collect()
}

fn describe_ref(kind_mnemonic: &str, width: u8, site: usize, label_or_hex: &str) -> String {
    format!("  {site:04X}: {kind_mnemonic} (w{width}) -> {label_or_hex}")
}

#[allow(clippy::too_many_arguments)]
fn emit_file<S: ObjectSink>(
    sink: &mut S,
    rom: &Rom,
    file_range: &FileRange,
    modules: &[&ModuleRange],
    refs: &[RefSite],
    vtabs: &VectorTables,
    labels: &LabelMap,
    island_sites: &BTreeMap<usize, &Island>,
    island_hide: bool,
) {
    sink.putfirst();

    for module in modules.iter().copied() {
        emit_module(sink, rom, file_range, module, refs, vtabs, labels, island_sites, island_hide);
    }

    sink.putlast();
}

#[allow(clippy::too_many_arguments)]
fn emit_module<S: ObjectSink>(
    sink: &mut S,
    rom: &Rom,
    file_range: &FileRange,
    module: &ModuleRange,
    refs: &[RefSite],
    vtabs: &VectorTables,
    labels: &LabelMap,
    island_sites: &BTreeMap<usize, &Island>,
    island_hide: bool,
) {
    let range = module.range.clone();
    let mut buf = rom.bytes()[range.clone()].to_vec();

    let module_labels = labels.module_labels(range.clone());
    let refs_here = refs_in_range(refs, &range);

    let (resolved, unresolved) = rewrite::resolve_module(
        &range,
        &mut buf,
        &refs_here,
        vtabs,
        labels,
        island_sites,
        island_hide,
    );

    let entries = module_labels.chunk_order();

    let has_entries = !entries.is_empty();
    let mut flags = 0u8;
    if has_entries {
        flags |= crate::emit::FLAG_EXTERNALLY_ACCESSIBLE;
    }
    if !file_range.has_flag("NOFORCE") {
        flags |= crate::emit::FLAG_FORCED;
    }

    let mut dict = Vec::with_capacity(1 + entries.len() + resolved.len());
    dict.push(module_labels.name.clone());
    for (_, label) in &entries {
        if !dict.contains(label) {
            dict.push(label.clone());
        }
    }
    for r in &resolved {
        if !dict.contains(&r.label) {
            dict.push(r.label.clone());
        }
    }

    let mut comment = String::new();
    let _ = writeln!(
        comment,
        "module {} [{:X}, {:X})",
        module_labels.name, range.start, range.end
    );
    let _ = writeln!(comment, "start: {}", module.start_reasons.join(", "));
    let _ = writeln!(comment, "stop: {}", module.stop_reasons.join(", "));
    if let Some(c) = labels.comment_at(range.start) {
        let _ = writeln!(comment, "  {}: {}", module_labels.name, c);
    }
    for (offset, label) in &entries {
        if let Some(c) = labels.comment_at(*offset) {
            let _ = writeln!(comment, "  {label}: {c}");
        }
    }
    for r in &resolved {
        let mnemonic = if r.weird { "weird" } else { "simple" };
        comment.push_str(&describe_ref(mnemonic, r.width, r.operand_site, &r.label));
        comment.push('\n');
    }
    for u in &unresolved {
        comment.push_str(&describe_ref(
            u.kind.mnemonic(),
            u.width,
            u.operand_site,
            &format!("0x{:X} (unresolved)", u.target),
        ));
        comment.push('\n');
    }

    sink.putdict(&dict);
    sink.putmod(&module_labels.name, flags);
    sink.putsize(buf.len());
    sink.putcontents(&buf);

    for r in &resolved {
        if r.weird {
            sink.putweirdref(&r.label, r.width, r.operand_site);
        } else {
            sink.putsimpleref(&r.label, r.width, r.operand_site);
        }
    }

    for (offset, label) in &entries {
        sink.putentry(offset - range.start, label);
    }

    sink.putcomment(&comment);
}
