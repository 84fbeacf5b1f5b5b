//! Module-boundary engine (§4.7): fuses glue, island, manual-directive,
//! and heuristic ("modguess") signals into an ordered list of module
//! ranges.

use std::ops::Range;

use crate::byte_reader::ByteReader;
use crate::island::Island;
use crate::labels::LabelMap;
use crate::manual::AnnotationMap;
use crate::rom::Rom;
use crate::vector_table::VectorTables;

#[derive(Debug, Clone)]
pub struct ModuleRange {
    pub range: Range<usize>,
    pub start_reasons: Vec<String>,
    pub stop_reasons: Vec<String>,
}

fn round_up_16(x: usize) -> usize {
    (x + 15) & !15
}

/// A tagged offset with accumulated reasons, used for both starts and
/// stops before range construction.
#[derive(Debug, Clone)]
struct Tagged {
    offset: usize,
    reasons: Vec<String>,
}

fn merge_tagged(mut items: Vec<Tagged>) -> Vec<Tagged> {
    items.sort_by_key(|t| t.offset);
    let mut out: Vec<Tagged> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(last) = out.last_mut() {
            if last.offset == item.offset {
                last.reasons.extend(item.reasons);
                continue;
            }
        }
        out.push(item);
    }
    out
}

/// Enabled-interval union for a `MODGUESS`/`REFGUESS`-style toggle
/// directive: no-argument entries turn the heuristic on, `OFF` turns
/// it off. Default state is off.
pub fn enabled_ranges(manual: &AnnotationMap, directive: &str, trim: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut state = false;
    let mut start = 0usize;
    for d in manual.get(directive) {
        let turn_off = d.args.iter().any(|a| a.eq_ignore_ascii_case("OFF"));
        if !turn_off && !state {
            start = d.offset;
            state = true;
        } else if turn_off && state {
            ranges.push((start, d.offset));
            state = false;
        }
    }
    if state {
        ranges.push((start, trim));
    }
    ranges
}

pub(crate) fn in_any(ranges: &[(usize, usize)], offset: usize) -> bool {
    ranges.iter().any(|&(a, b)| offset >= a && offset < b)
}

fn merge_ranges(mut ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    ranges.sort();
    let mut out: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (a, b) in ranges {
        if let Some(last) = out.last_mut() {
            if a <= last.1 {
                last.1 = last.1.max(b);
                continue;
            }
        }
        out.push((a, b));
    }
    out
}

/// Forbidden ranges (§4.7): glue runs at exact 10-byte stride, plus
/// singleton glues, extended by their implementation target, then
/// merged into a flat set.
fn forbidden_ranges(vtabs: &VectorTables) -> Vec<(usize, usize)> {
    let mut glue_offsets: Vec<usize> = vtabs.glues().map(|g| g.stub_offset).collect();
    glue_offsets.sort();
    glue_offsets.dedup();

    let mut runs: Vec<Vec<usize>> = Vec::new();
    for g in glue_offsets {
        match runs.last_mut() {
            Some(run) if g == run[run.len() - 1] + 10 => run.push(g),
            _ => runs.push(vec![g]),
        }
    }

    let mut extended = Vec::new();
    for run in &runs {
        let run_start = run[0];
        let run_stop = run[run.len() - 1] + 10;

        let impl_targets: Vec<usize> = run
            .iter()
            .filter_map(|&g| {
                let entry = vtabs.glue_at(g)?;
                vtabs
                    .routine_offset(entry.table_id, entry.voffset)
                    .map(|o| o as usize)
            })
            .collect();

        let mut start = run_start;
        if let Some(&first_impl) = impl_targets.first() {
            if first_impl < run_start {
                start = first_impl;
            } else if let Some(&earliest) = impl_targets.iter().min() {
                if first_impl > earliest {
                    start = start.saturating_sub(2);
                }
            }
        }

        extended.push((start, run_stop));
    }

    merge_ranges(extended)
}

fn preceded_by_return_then_padding(r: &ByteReader, s: usize) -> bool {
    let mut padding = 2usize;
    while padding <= 14 {
        if padding < s {
            if let Ok(pad) = r.slice(s - padding, padding) {
                if pad.iter().all(|&b| b == 0) {
                    let p = s - padding;
                    if p >= 2 {
                        if let Ok(op) = r.u16be(p - 2) {
                            if op == 0x4E75 || (0x4ED0..=0x4ED7).contains(&op) {
                                return true;
                            }
                        }
                    }
                    if p >= 4 {
                        if let Ok(op) = r.u16be(p - 4) {
                            if op == 0x4E74 {
                                return true;
                            }
                        }
                    }
                    if p >= 6 {
                        if let Ok(op) = r.u16be(p - 6) {
                            if op == 0x60FF {
                                return true;
                            }
                        }
                    }
                }
            }
        }
        padding += 2;
    }
    false
}

/// Modguess sub-procedure (§4.7): candidate module starts found by
/// 16-byte-aligned heuristic scanning of enabled regions.
fn modguess(
    rom: &Rom,
    enabled: &[(usize, usize)],
    forbidden: &[(usize, usize)],
    labels: &LabelMap,
) -> Vec<(usize, Vec<String>)> {
    let r = rom.reader();
    let trim = rom.trim();
    let mut out = Vec::new();

    for &(a, b) in enabled {
        let mut s = round_up_16(a).max(16);
        while s < b && s + 16 <= trim {
            if let Ok(prev) = r.slice(s - 16, 16) {
                if !prev.iter().all(|&x| x == 0) && !in_any(forbidden, s) {
                    let has_label = labels.has_label(s);
                    let return_padding = preceded_by_return_then_padding(&r, s);
                    if has_label || return_padding {
                        let mut reasons = vec!["align".to_string()];
                        if has_label {
                            reasons.push("labelled".to_string());
                        }
                        if return_padding {
                            reasons.push("RTS then padding".to_string());
                        }
                        out.push((s, reasons));
                    }
                }
            }
            s += 16;
        }
    }

    out
}

fn trim_trailing_padding(r: &ByteReader, a: usize, b: usize) -> Option<usize> {
    if b < a + 16 || b < 16 {
        return None;
    }
    let mid = r.slice(b - 16, 14).ok()?;
    if mid.iter().all(|&x| x == 0) {
        return None;
    }
    let tail = r.slice(b - 2, 2).ok()?;
    if !tail.iter().all(|&x| x == 0) {
        return None;
    }

    let mut bp = b;
    while bp > a + 2 {
        match r.slice(bp - 2, 2) {
            Ok(pair) if pair.iter().all(|&x| x == 0) => bp -= 2,
            _ => break,
        }
    }
    if bp < b {
        Some(bp)
    } else {
        None
    }
}

/// Computes the ordered module-range list for the whole ROM.
pub fn compute(
    rom: &Rom,
    vtabs: &VectorTables,
    islands: &[Island],
    labels: &LabelMap,
    manual: &AnnotationMap,
) -> Vec<ModuleRange> {
    let trim = rom.trim();
    let r = rom.reader();

    let mut glue_offsets: Vec<usize> = vtabs.glues().map(|g| g.stub_offset).collect();
    glue_offsets.sort();
    glue_offsets.dedup();

    let forbidden = forbidden_ranges(vtabs);
    let modguess_enabled = enabled_ranges(manual, "MODGUESS", trim);
    let guessed_starts = modguess(rom, &modguess_enabled, &forbidden, labels);

    let mut starts: Vec<Tagged> = vec![Tagged {
        offset: 0,
        reasons: vec!["start of ROM".into()],
    }];

    for w in glue_offsets.windows(2) {
        let (prev, next) = (w[0], w[1]);
        if next - prev > 10 {
            starts.push(Tagged {
                offset: round_up_16(prev + 10),
                reasons: vec!["certain module boundary after glue".into()],
            });
        }
    }

    for d in manual.get("MOD") {
        starts.push(Tagged {
            offset: d.offset,
            reasons: vec!["MOD directive".into()],
        });
    }
    for d in manual.get("FILE") {
        starts.push(Tagged {
            offset: d.offset,
            reasons: vec!["FILE directive".into()],
        });
    }
    for isl in islands {
        starts.push(Tagged {
            offset: isl.site + 16,
            reasons: vec!["after BRA.L island".into()],
        });
        starts.push(Tagged {
            offset: isl.site,
            reasons: vec!["BRA.L island".into()],
        });
    }
    for (offset, reasons) in guessed_starts {
        starts.push(Tagged { offset, reasons });
    }

    let mut stops: Vec<Tagged> = vec![Tagged {
        offset: trim,
        reasons: vec!["end of ROM".into()],
    }];
    for &g in &glue_offsets {
        stops.push(Tagged {
            offset: g,
            reasons: vec!["glue".into()],
        });
    }
    for isl in islands {
        stops.push(Tagged {
            offset: isl.site,
            reasons: vec!["BRA.L island".into()],
        });
        stops.push(Tagged {
            offset: isl.site + 16,
            reasons: vec!["after BRA.L island".into()],
        });
    }
    for d in manual.get("ENDF") {
        stops.push(Tagged {
            offset: d.offset,
            reasons: vec!["ENDF directive".into()],
        });
    }

    let starts = merge_tagged(starts);
    let stops = merge_tagged(stops);
    let stop_offsets: Vec<usize> = stops.iter().map(|t| t.offset).collect();
    let glue_offset_set: std::collections::BTreeSet<usize> = glue_offsets.iter().copied().collect();

    let mut ranges = Vec::with_capacity(starts.len());
    for (i, s) in starts.iter().enumerate() {
        let next_start = starts.get(i + 1).map(|t| t.offset);
        let next_stop_pos = stop_offsets.partition_point(|&o| o < s.offset);
        let next_stop = stop_offsets.get(next_stop_pos).copied();

        let stop = match (next_stop, next_start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let Some(stop) = stop else { continue };
        if stop <= s.offset {
            continue;
        }

        let stop_reasons = stops
            .iter()
            .find(|t| t.offset == stop)
            .map(|t| t.reasons.clone())
            .unwrap_or_default();

        ranges.push(ModuleRange {
            range: s.offset..stop,
            start_reasons: s.reasons.clone(),
            stop_reasons,
        });
    }

    for module in &mut ranges {
        if glue_offset_set.contains(&module.range.end) {
            continue;
        }
        if let Some(new_stop) = trim_trailing_padding(&r, module.range.start, module.range.end) {
            module.range.end = new_stop;
            module.stop_reasons.push("nulls trimmed".into());
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual;

    fn rom_of(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0x1A..0x1E].copy_from_slice(&(len as u32).to_be_bytes());
        data
    }

    #[test]
    fn trivial_rom_has_single_range() {
        let data = rom_of(0x200);
        let rom = Rom::load(&data).unwrap();
        let vtabs = VectorTables::default();
        let labels = LabelMap::default();
        let manual = manual::parse("").unwrap();
        let ranges = compute(&rom, &vtabs, &[], &labels, &manual);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].range, 0..0x200);
    }

    #[test]
    fn modguess_off_by_default() {
        let mut data = rom_of(0x400);
        // RTS then 14 zero bytes ending at 0x110, all within an
        // otherwise nonzero aligned window -- but MODGUESS is never
        // enabled, so no extra start should appear.
        data[0x100..0x102].copy_from_slice(&0x4E75u16.to_be_bytes());
        data[0x0F0..0x100].fill(0xAA);
        let rom = Rom::load(&data).unwrap();
        let vtabs = VectorTables::default();
        let labels = LabelMap::default();
        let manual = manual::parse("").unwrap();
        let ranges = compute(&rom, &vtabs, &[], &labels, &manual);
        assert_eq!(ranges.len(), 1);
    }

    #[test]
    fn scenario_e_modguess_start() {
        let mut data = rom_of(0x2000);
        data[0x0FE0..0x1000].fill(0xAA); // prior 16-byte window not all zero
        data[0x10F0..0x10F2].copy_from_slice(&0x4E75u16.to_be_bytes());
        // remaining bytes up to 0x1100 already zero
        let text = "00001000 MODGUESS\n00002000 MODGUESS OFF\n";
        let manual = manual::parse(text).unwrap();
        let rom = Rom::load(&data).unwrap();
        let vtabs = VectorTables::default();
        let labels = LabelMap::default();
        let ranges = compute(&rom, &vtabs, &[], &labels, &manual);
        assert!(ranges.iter().any(|m| m.range.start == 0x1100));
    }
}
