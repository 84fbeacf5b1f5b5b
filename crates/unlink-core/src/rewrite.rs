//! Reference resolver & rewriter (§4.9): per reference site inside a
//! module, resolves the target to a label and zeroes or reseats the
//! referrer's operand bytes.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::island::Island;
use crate::labels::LabelMap;
use crate::refscan::{RefKind, RefSite};
use crate::vector_table::VectorTables;

#[derive(Debug, Clone)]
pub struct ResolvedRef {
    /// Position of the operand bytes, relative to the module start
    /// (i.e. `site - module.start + 2`).
    pub operand_site: usize,
    pub label: String,
    pub width: u8,
    pub weird: bool,
    pub island_index: i64,
}

#[derive(Debug, Clone)]
pub struct UnresolvedRef {
    pub operand_site: usize,
    pub target: usize,
    pub kind: RefKind,
    pub width: u8,
}

fn encode_signed(value: i64, width: u8) -> Vec<u8> {
    match width {
        2 => (value as i16 as u16).to_be_bytes().to_vec(),
        4 => (value as i32 as u32).to_be_bytes().to_vec(),
        _ => unreachable!("reference widths are always 2 or 4"),
    }
}

/// Resolves and rewrites every reference site within `module_range`.
/// `buf` holds the module's own bytes (same length as the range) and
/// is mutated in place. `island_sites` indexes islands by their site
/// offset for the island-hide redirect and for reverse-index ordering.
pub fn resolve_module(
    module_range: &Range<usize>,
    buf: &mut [u8],
    refs_in_module: &[RefSite],
    vtabs: &VectorTables,
    labels: &LabelMap,
    island_sites: &BTreeMap<usize, &Island>,
    island_hide: bool,
) -> (Vec<ResolvedRef>, Vec<UnresolvedRef>) {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for rs in refs_in_module {
        let orig_targ = rs.target;
        let mut targ = orig_targ;

        if island_hide {
            if let Some(isl) = island_sites.get(&targ) {
                targ = isl.target;
            }
        }

        let mut label = None;
        if vtabs.is_direct_implementation(targ as u32) {
            if let Some(l) = labels.best_label(targ) {
                label = Some(format!("__v__{l}"));
            }
        }
        if label.is_none() {
            if let Some(impl_off) = vtabs.glue_implementation(targ) {
                targ = impl_off as usize;
            }
            label = labels.best_label(targ).map(str::to_string);
        }

        if targ >= module_range.start && targ < module_range.end {
            // self-reference: never emitted, resolved or not.
            continue;
        }

        let site_in_module = rs.site - module_range.start;
        let operand_site = site_in_module + 2;

        let Some(label) = label else {
            unresolved.push(UnresolvedRef {
                operand_site,
                target: orig_targ,
                kind: rs.kind,
                width: rs.width,
            });
            continue;
        };

        let w = rs.width as usize;
        buf[operand_site..operand_site + w].fill(0);

        let weird = rs.kind.is_branch();
        if weird {
            let dist = -((site_in_module as i64) + 2);
            let bytes = encode_signed(dist, rs.width);
            buf[operand_site..operand_site + w].copy_from_slice(&bytes);
        }

        let island_index = island_sites.get(&orig_targ).map(|isl| isl.index as i64).unwrap_or(-1);
        resolved.push(ResolvedRef {
            operand_site,
            label,
            width: rs.width,
            weird,
            island_index,
        });
    }

    resolved.sort_by_key(|r| r.island_index);
    resolved.reverse();

    (resolved, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual;

    #[test]
    fn scenario_d_weird_reference() {
        let module_range = 0x2000..0x2100;
        let mut buf = vec![0u8; 0x100];
        buf[0..2].copy_from_slice(&0x6100u16.to_be_bytes());
        buf[2..4].copy_from_slice(&0x0FFCu16.to_be_bytes()); // BSR to 0x3000 eventually

        let refs = vec![RefSite {
            site: 0x2000,
            target: 0x3000,
            kind: RefKind::BsrW,
            width: 2,
        }];

        let vtabs = VectorTables::default();
        // Manually seed a label at 0x3000 via a MOD directive so the
        // reference resolves.
        let m = manual::parse("00003000 MOD DoFoo\n").unwrap();
        let labels = LabelMap::build(&vtabs, &Default::default(), &[], &Default::default(), &m);

        let islands = BTreeMap::new();
        let (resolved, unresolved) =
            resolve_module(&module_range, &mut buf, &refs, &vtabs, &labels, &islands, false);

        assert!(unresolved.is_empty());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].label, "DoFoo");
        assert_eq!(resolved[0].operand_site, 0x02);
        assert_eq!(&buf[2..4], &[0xFF, 0xFE]);
    }

    #[test]
    fn scenario_c_self_reference_skipped() {
        let module_range = 0x2000..0x2100;
        let mut buf = vec![0u8; 0x100];
        let refs = vec![RefSite {
            site: 0x2000,
            target: 0x2014,
            kind: RefKind::BsrW,
            width: 2,
        }];
        let vtabs = VectorTables::default();
        let labels = LabelMap::default();
        let islands = BTreeMap::new();
        let (resolved, unresolved) =
            resolve_module(&module_range, &mut buf, &refs, &vtabs, &labels, &islands, false);
        assert!(resolved.is_empty());
        assert!(unresolved.is_empty());
    }
}
