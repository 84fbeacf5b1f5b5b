//! Integration tests for the reference resolver & rewriter (SPEC_FULL.md
//! §4.9, §8 "Testable properties" 3, scenarios B/C/D) and the end-to-end
//! driver (§4.10).

use std::collections::BTreeMap;

use unlink_core::driver::UnlinkInputs;
use unlink_core::island;
use unlink_core::labels::LabelMap;
use unlink_core::manual;
use unlink_core::refscan::{RefKind, RefSite};
use unlink_core::rewrite::resolve_module;
use unlink_core::rom::Rom;
use unlink_core::vector_table::VectorTables;
use unlink_core::{IslandMode, UnlinkOptions};

fn rom_of(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    data[0x1A..0x1E].copy_from_slice(&(len as u32).to_be_bytes());
    data
}

/// Property 3: a resolved branch-kind reference's rewritten operand
/// decodes as `-(s+2-a)`, i.e. a self-relative distance back to the
/// module's own start.
#[test]
fn branch_reference_reseats_to_module_start_distance() {
    let module_start = 0x2000usize;
    let module_range = module_start..module_start + 0x100;
    let mut buf = vec![0u8; 0x100];

    let site = module_start + 0x40;
    let refs = vec![RefSite {
        site,
        target: 0x9000,
        kind: RefKind::BsrL,
        width: 4,
    }];

    let manual = manual::parse("00009000 MOD Target\n").unwrap();
    let vtabs = VectorTables::default();
    let labels = LabelMap::build(&vtabs, &BTreeMap::new(), &[], &BTreeMap::new(), &manual);
    let islands = BTreeMap::new();

    let (resolved, unresolved) =
        resolve_module(&module_range, &mut buf, &refs, &vtabs, &labels, &islands, false);

    assert!(unresolved.is_empty());
    assert_eq!(resolved.len(), 1);
    assert!(resolved[0].weird);

    let site_in_module = site - module_start;
    let operand_site = site_in_module + 2;
    let expected = -((site_in_module as i64) + 2) as i32 as u32;
    let got = u32::from_be_bytes(buf[operand_site..operand_site + 4].try_into().unwrap());
    assert_eq!(got, expected);
}

/// Scenario B: an island at 0x400 targeting 0x1404; with ISLANDGUESS
/// HIDE active, a reference to the island site is redirected to the
/// island's destination before label resolution.
#[test]
fn scenario_b_island_hide_redirects_reference() {
    let mut data = rom_of(0x3000);
    data[0x400..0x402].copy_from_slice(&0x60FFu16.to_be_bytes());
    let disp = 0x1404i64 - 0x400 - 2;
    data[0x402..0x406].copy_from_slice(&(disp as u32).to_be_bytes());

    let rom = Rom::load(&data).unwrap();
    let islands = island::detect(&rom, &Default::default());
    assert_eq!(islands.len(), 1);
    assert_eq!((islands[0].site, islands[0].target), (0x400, 0x1404));

    let manual = manual::parse("00001404 MOD RealTarget\n").unwrap();
    let vtabs = VectorTables::default();
    let labels = LabelMap::build(&vtabs, &BTreeMap::new(), &[], &BTreeMap::new(), &manual);
    let island_sites: BTreeMap<usize, &unlink_core::island::Island> =
        islands.iter().map(|i| (i.site, i)).collect();

    let module_range = 0x2000usize..0x2100;
    let mut buf = vec![0u8; 0x100];
    let refs = vec![RefSite {
        site: 0x2000,
        target: 0x400,
        kind: RefKind::BsrW,
        width: 2,
    }];

    let (resolved, unresolved) =
        resolve_module(&module_range, &mut buf, &refs, &vtabs, &labels, &island_sites, true);

    assert!(unresolved.is_empty());
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].label, "RealTarget");
}

/// Scenario D: a BSR to an offset with a known label emits a weird
/// reference for that symbol at module-relative site 0x02, with the
/// operand bytes set to the two's-complement distance.
#[test]
fn scenario_d_weird_reference_via_driver() {
    let mut data = rom_of(0x4000);
    // BSR.W at 0x2000 -> 0x3000 (disp = 0x3000 - 0x2000 - 2 = 0x0FFE)
    data[0x2000..0x2002].copy_from_slice(&0x6100u16.to_be_bytes());
    data[0x2002..0x2004].copy_from_slice(&0x0FFEu16.to_be_bytes());

    let manual_text = "\
00002000 FILE Out.a, WRITEOUT
00002000 MOD Caller
00002100 ENDF
00003000 MOD DoFoo
";
    let inputs = UnlinkInputs {
        vector_table_src: None,
        disp_table_src: None,
        manual_text,
    };
    let options = UnlinkOptions {
        island_mode_override: Some(IslandMode::Off),
        dry_run: false,
    };
    let outputs = unlink_core::unlink(&data, &inputs, &options).unwrap();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].writeout);
    assert!(!outputs[0].bytes.is_empty());
}
