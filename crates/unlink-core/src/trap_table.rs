//! Trap-table extractor (§4.5): recovers `trap_number → routine_offset`
//! from the ROM's 1,280-slot trap dispatch table.

use std::collections::BTreeMap;

use crate::error::RomError;
use crate::rom::{header, Rom};

const TOTAL_SLOTS: usize = 1280;
const SPLIT_BYTE: usize = 4096;

/// Recovers the ROM-resident trap table as `trap_number → routine_offset`.
///
/// Zero slots and slots equal to the ROM's "bad trap" routine are
/// discarded; a ROM with no trap table (e.g. a test fixture) yields an
/// empty map rather than an error.
pub fn extract(rom: &Rom) -> Result<BTreeMap<u16, u32>, RomError> {
    let r = rom.reader();
    let traptab = r.u32be(header::TRAP_TABLE)? as usize;
    let badtrap = r.u32be(header::BAD_TRAP)?;

    let mut out = BTreeMap::new();
    for slot in 0..TOTAL_SLOTS {
        let i = slot * 4;
        let Ok(routine_offset) = r.u32be(traptab + i) else {
            break;
        };
        if routine_offset == 0 || routine_offset == badtrap {
            continue;
        }
        let trap_number = if i < SPLIT_BYTE {
            0xA800 + (i / 4) as u16
        } else {
            0xA000 + ((i - SPLIT_BYTE) / 4) as u16
        };
        out.insert(trap_number, routine_offset);
    }

    Ok(out)
}
