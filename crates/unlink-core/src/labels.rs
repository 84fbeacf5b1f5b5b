//! Label resolver (§4.8): maintains the offset→label map and picks
//! module and entry names.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::island::Island;
use crate::manual::AnnotationMap;
use crate::source::{self, VectorLabel};
use crate::vector_table::VectorTables;

/// `offset → set<label>`, insertion-ordered so synthesized names never
/// mask source names that arrived first.
#[derive(Debug, Default, Clone)]
pub struct LabelMap {
    offsets: BTreeMap<usize, Vec<String>>,
    /// label → glue stub offset, for labels tied to a vector-table
    /// entry that has a matching glue stub (§4.8 module-name selection).
    vector_glue_address: BTreeMap<String, usize>,
    /// offset → inherited comment from the vector/trap source record
    /// naming the label at that offset (§4.10 "inherited comments from
    /// vector/trap sources"); empty source comments are not recorded.
    source_comments: BTreeMap<usize, String>,
}

fn shortest_then_lex(labels: &[String]) -> Option<&str> {
    labels
        .iter()
        .min_by_key(|l| (l.len(), l.as_str()))
        .map(|s| s.as_str())
}

impl LabelMap {
    fn insert(&mut self, offset: usize, label: String) {
        let set = self.offsets.entry(offset).or_default();
        if !set.contains(&label) {
            set.push(label);
        }
    }

    pub fn best_label(&self, offset: usize) -> Option<&str> {
        self.offsets.get(&offset).and_then(|v| shortest_then_lex(v))
    }

    pub fn labels_at(&self, offset: usize) -> &[String] {
        self.offsets.get(&offset).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_label(&self, offset: usize) -> bool {
        self.offsets.contains_key(&offset)
    }

    /// The inherited vector/trap source comment for the label at
    /// `offset`, if the source record carried one.
    pub fn comment_at(&self, offset: usize) -> Option<&str> {
        self.source_comments.get(&offset).map(String::as_str)
    }

    /// Builds the base label map from vector-table, trap-table, and
    /// manual `MOD`/`ENTRY` records (island labelling is a separate
    /// later pass since it depends on this map already existing).
    pub fn build(
        vtabs: &VectorTables,
        traps: &BTreeMap<u16, u32>,
        vector_src: &[VectorLabel],
        trap_src: &BTreeMap<u16, String>,
        manual: &AnnotationMap,
    ) -> LabelMap {
        let mut m = LabelMap::default();

        for (table_id, voffset, routine_offset) in vtabs.routines() {
            let src = vector_src
                .iter()
                .find(|v| v.table_id == table_id && v.voffset == voffset);
            let label = match src {
                Some(v) => v.label.clone(),
                None => format!("MGR{table_id:04X}_VEC{voffset:04X}"),
            };
            if let Some(glue) = vtabs.glue_at_key(table_id, voffset) {
                m.vector_glue_address.insert(label.clone(), glue);
            }
            if let Some(v) = src {
                if !v.comment.is_empty() {
                    m.source_comments.insert(routine_offset as usize, v.comment.clone());
                }
            }
            m.insert(routine_offset as usize, label);
        }

        for (&trap_number, &routine_offset) in traps {
            let label = trap_src
                .get(&trap_number)
                .cloned()
                .unwrap_or_else(|| source::placeholder_trap_name(trap_number));
            m.insert(routine_offset as usize, label);
        }

        for directive in manual.get("MOD").iter().chain(manual.get("ENTRY").iter()) {
            if let Some(label) = directive.args.first() {
                m.insert(directive.offset, label.clone());
            }
        }

        m
    }

    /// Applies island labelling: each island's site gets a single
    /// label `ISLAND_{src:X}_{name}`, overriding whatever was there.
    pub fn apply_islands(&mut self, islands: &[Island], vtabs: &VectorTables) {
        for island in islands {
            let deref_target = vtabs
                .glue_implementation(island.target)
                .map(|o| o as usize)
                .unwrap_or(island.target);
            let name = self
                .best_label(deref_target)
                .map(str::to_string)
                .unwrap_or_else(|| format!("UNRESOLVED_{:X}", island.target));
            self.offsets
                .insert(island.site, vec![format!("ISLAND_{:X}_{}", island.site, name)]);
        }
    }

    /// Module-name and entry-list selection within `range` (§4.8).
    pub fn module_labels(&self, range: Range<usize>) -> ModuleLabels {
        let mut vector_bound: Vec<(usize, usize, String)> = Vec::new();
        let mut other: Vec<(usize, String)> = Vec::new();

        for (&offset, labels) in self.offsets.range(range.clone()) {
            for label in labels {
                if let Some(&glue) = self.vector_glue_address.get(label) {
                    vector_bound.push((glue, offset, label.clone()));
                } else {
                    other.push((offset, label.clone()));
                }
            }
        }
        vector_bound.sort();
        other.sort();

        if let Some(pos) = vector_bound.iter().position(|(_, o, _)| *o == range.start) {
            let (_, _, name) = vector_bound.remove(pos);
            return ModuleLabels {
                name,
                vector_bound: vector_bound.into_iter().map(|(_, o, l)| (o, l)).collect(),
                other,
            };
        }
        if let Some(pos) = other.iter().position(|(o, _)| *o == range.start) {
            let (_, name) = other.remove(pos);
            return ModuleLabels {
                name,
                vector_bound: vector_bound.into_iter().map(|(_, o, l)| (o, l)).collect(),
                other,
            };
        }

        ModuleLabels {
            name: format!("AUTOMOD_{:X}", range.start),
            vector_bound: vector_bound.into_iter().map(|(_, o, l)| (o, l)).collect(),
            other,
        }
    }
}

/// Labels within a module range, split by chunk-order category. Entry
/// lists exclude whatever label was chosen as the module name.
#[derive(Debug, Clone, Default)]
pub struct ModuleLabels {
    pub name: String,
    pub vector_bound: Vec<(usize, String)>,
    pub other: Vec<(usize, String)>,
}

impl ModuleLabels {
    /// Vector-bound entries (by original glue order) followed by
    /// others (by offset) — reconstructs the ROM's glue sequence.
    pub fn chunk_order(&self) -> Vec<(usize, String)> {
        let mut out = self.vector_bound.clone();
        out.extend(self.other.iter().cloned());
        out
    }

    /// All entries sorted by implementation offset.
    pub fn offset_order(&self) -> Vec<(usize, String)> {
        let mut out = self.chunk_order();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_then_lex_tiebreak() {
        let labels = vec!["Bravo".to_string(), "Ab".to_string(), "Za".to_string()];
        assert_eq!(shortest_then_lex(&labels), Some("Ab"));
    }

    fn rom_with_single_vector_table(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0x1A..0x1E].copy_from_slice(&(len as u32).to_be_bytes());

        let init = 0x100usize;
        data[0x66..0x6A].copy_from_slice(&(init as u32).to_be_bytes());
        data[init..init + 2].copy_from_slice(&0x61FFu16.to_be_bytes());
        let t = 0x200usize;
        data[init + 2..init + 6].copy_from_slice(&((t as i64 - init as i64 - 2) as u32).to_be_bytes());
        data[init + 6..init + 8].copy_from_slice(&0x4E75u16.to_be_bytes());

        data[t..t + 4].copy_from_slice(&0x41FA000Eu32.to_be_bytes());
        data[t + 6..t + 8].copy_from_slice(&0x2010u16.to_be_bytes());
        let rec = 0x300usize;
        data[t + 16..t + 20].copy_from_slice(&(rec as u32).to_be_bytes());
        data[rec + 8..rec + 12].copy_from_slice(&1u32.to_be_bytes());
        data[t + 20..t + 24].copy_from_slice(&0x1000u32.to_be_bytes());

        data
    }

    #[test]
    fn build_carries_vector_source_comment_by_offset() {
        let data = rom_with_single_vector_table(0x400);
        let rom = crate::rom::Rom::load(&data).unwrap();
        let vtabs = crate::vector_table::extract(&rom).unwrap();

        let vector_src = vec![VectorLabel {
            label: "DoFoo".to_string(),
            table_id: 0x2010,
            voffset: 0,
            areg: 0,
            comment: "the foo manager".to_string(),
        }];
        let manual = crate::manual::parse("").unwrap();
        let m = LabelMap::build(&vtabs, &Default::default(), &vector_src, &Default::default(), &manual);

        assert_eq!(m.best_label(0x1000), Some("DoFoo"));
        assert_eq!(m.comment_at(0x1000), Some("the foo manager"));
    }

    #[test]
    fn comment_at_absent_when_source_has_none() {
        let data = rom_with_single_vector_table(0x400);
        let rom = crate::rom::Rom::load(&data).unwrap();
        let vtabs = crate::vector_table::extract(&rom).unwrap();

        let manual = crate::manual::parse("").unwrap();
        let m = LabelMap::build(&vtabs, &Default::default(), &[], &Default::default(), &manual);

        assert_eq!(m.comment_at(0x1000), None);
    }
}
