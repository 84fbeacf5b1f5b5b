//! Source-tree label matching: reads `VectorTable.a` (`VEC` directives)
//! and `DispTable.a` (`ToolBox`/`OS` directives) to attach symbolic
//! names to recovered vector and trap table entries.
//!
//! Uses the same flat-record scanner (§4.2) as the annotation file;
//! this is not a full M68K assembler front end, only label matching.

use std::collections::BTreeMap;

use crate::scanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorLabel {
    pub label: String,
    pub table_id: u16,
    pub voffset: u16,
    pub areg: u8,
    pub comment: String,
}

fn parse_hex_arg(s: &str) -> Option<u32> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X").trim_start_matches('$');
    u32::from_str_radix(s, 16).ok()
}

/// Parses `VEC table_id, voffset, areg` records from `VectorTable.a`.
pub fn vector_labels(text: &str) -> Vec<VectorLabel> {
    scanner::scan(text)
        .into_iter()
        .filter(|r| r.directive.eq_ignore_ascii_case("VEC") && !r.label.is_empty())
        .filter_map(|r| {
            let table_id = parse_hex_arg(r.args.first()?)? as u16;
            let voffset = parse_hex_arg(r.args.get(1)?)? as u16;
            let areg = r
                .args
                .get(2)
                .and_then(|s| parse_hex_arg(s).or_else(|| s.parse::<u32>().ok()))
                .unwrap_or(0) as u8;
            Some(VectorLabel {
                label: r.label,
                table_id,
                voffset,
                areg,
                comment: r.comment,
            })
        })
        .collect()
}

/// The canonical placeholder name for a trap not overwritten by the
/// source: `_A` plus the trap's low three hex digits, matching the
/// classic Mac trap-macro naming convention.
pub fn placeholder_trap_name(trap_number: u16) -> String {
    format!("_A{:03X}", trap_number & 0xFFF)
}

/// Parses `ToolBox`/`OS` directives from `DispTable.a`, mapping
/// `trap_number → label`. Lines whose argument starts with `&` are
/// macro definitions and are skipped.
pub fn trap_labels(text: &str) -> BTreeMap<u16, String> {
    let mut out = BTreeMap::new();
    for rec in scanner::scan(text) {
        if !(rec.directive.eq_ignore_ascii_case("ToolBox") || rec.directive.eq_ignore_ascii_case("OS")) {
            continue;
        }
        if rec.label.is_empty() {
            continue;
        }
        if rec.args.iter().any(|a| a.starts_with('&')) {
            continue;
        }
        let Some(first) = rec.args.first() else { continue };
        let Some(val) = parse_hex_arg(first) else { continue };
        let trap_number = if val >= 0xA000 { val as u16 } else { (0xA000 + val) as u16 };
        out.insert(trap_number, rec.label.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vec_directives() {
        let text = "DoFoo: VEC 2010,0000,0 ; the foo manager\n";
        let labels = vector_labels(text);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, "DoFoo");
        assert_eq!(labels[0].table_id, 0x2010);
        assert_eq!(labels[0].voffset, 0x0000);
        assert_eq!(labels[0].comment, "the foo manager");
    }

    #[test]
    fn trap_labels_skip_macro_defs() {
        let text = "Open: ToolBox A000\nClose: ToolBox &1 ; macro, not a real trap\n";
        let labels = trap_labels(text);
        assert_eq!(labels.get(&0xA000), Some(&"Open".to_string()));
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn trap_labels_accept_offset_form() {
        let text = "Control: OS 4\n";
        let labels = trap_labels(text);
        assert_eq!(labels.get(&0xA004), Some(&"Control".to_string()));
    }
}
