//! File ranges (§3 data model, §6 `FILE`/`ENDF` directives): contiguous
//! groups of modules that belong to the same output relocatable.

use std::ops::Range;

use crate::manual::AnnotationMap;

#[derive(Debug, Clone)]
pub struct FileRange {
    pub range: Range<usize>,
    pub relpath: String,
    pub flags: Vec<String>,
}

impl FileRange {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

/// Pairs `FILE` directives with the `ENDF` that closes each one, in
/// directive order. A `FILE` with no corresponding `ENDF` (a malformed
/// or truncated annotation file) closes at `trim`.
pub fn compute(manual: &AnnotationMap, trim: usize) -> Vec<FileRange> {
    let files = manual.get("FILE");
    let endfs = manual.get("ENDF");

    let mut out = Vec::with_capacity(files.len());
    for (i, f) in files.iter().enumerate() {
        let stop = endfs.get(i).map(|e| e.offset).unwrap_or(trim);
        let mut args = f.args.iter();
        let relpath = args.next().cloned().unwrap_or_default();
        let flags = args.cloned().collect();
        out.push(FileRange {
            range: f.offset..stop,
            relpath,
            flags,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual;

    #[test]
    fn pairs_file_and_endf_in_order() {
        let text = "00001000 FILE Foo.a, WRITEOUT\n00001100 ENDF\n\
                     00001100 FILE Bar.a\n00001200 ENDF\n";
        let m = manual::parse(text).unwrap();
        let ranges = compute(&m, 0x2000);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].range, 0x1000..0x1100);
        assert_eq!(ranges[0].relpath, "Foo.a");
        assert!(ranges[0].has_flag("WRITEOUT"));
        assert_eq!(ranges[1].range, 0x1100..0x1200);
        assert!(!ranges[1].has_flag("WRITEOUT"));
    }

    #[test]
    fn missing_trailing_endf_closes_at_trim() {
        let text = "00001000 FILE Foo.a\n";
        let m = manual::parse(text).unwrap();
        let ranges = compute(&m, 0x2000);
        assert_eq!(ranges[0].range, 0x1000..0x2000);
    }

    #[test]
    fn no_file_directives_yields_no_ranges() {
        let m = manual::parse("").unwrap();
        assert!(compute(&m, 0x2000).is_empty());
    }
}
