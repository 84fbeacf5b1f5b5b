//! Fuzzy offset location (§1 "compare-offsets diagnostic utility",
//! §9 ambient stack): given an extracted module's bytes, find the
//! best-matching offset range inside a second ROM image.
//!
//! This is a standalone diagnostic, not part of the unlinker engine
//! proper: it performs no module or reference recovery of its own,
//! just a brute-force best-alignment byte-match score. Re-linked ROMs
//! built from slightly different toolchains rarely match byte-for-byte,
//! so an exact search is the wrong tool here.

/// A candidate location for `needle` inside a haystack ROM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub offset: usize,
    /// Fraction of bytes that matched exactly, in `[0.0, 1.0]`.
    pub score: f64,
}

/// Searches every offset in `haystack` where `needle` could fit and
/// returns the best-scoring alignment. Ties keep the earliest offset.
///
/// Anchors on the needle's first 4 bytes to prune offsets that cannot
/// possibly be a good match before paying for a full byte-by-byte scan.
pub fn fuzzy_locate(needle: &[u8], haystack: &[u8]) -> Option<Match> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    let anchor_len = needle.len().min(4);
    let anchor = &needle[..anchor_len];

    let mut best: Option<Match> = None;
    for offset in 0..=(haystack.len() - needle.len()) {
        let window = &haystack[offset..offset + needle.len()];
        if window[..anchor_len] != *anchor {
            let anchor_matches = window[..anchor_len]
                .iter()
                .zip(anchor)
                .filter(|(a, b)| a == b)
                .count();
            if anchor_matches * 2 < anchor_len {
                continue;
            }
        }

        let matching = window.iter().zip(needle).filter(|(a, b)| a == b).count();
        let score = matching as f64 / needle.len() as f64;
        if best.map_or(true, |b| score > b.score) {
            best = Some(Match { offset, score });
        }
        if score == 1.0 {
            break;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_match() {
        let needle = b"DoFooDoFoo";
        let mut haystack = vec![0u8; 0x100];
        haystack[0x40..0x40 + needle.len()].copy_from_slice(needle);
        let m = fuzzy_locate(needle, &haystack).unwrap();
        assert_eq!(m.offset, 0x40);
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn tolerates_a_few_differing_bytes() {
        let needle = b"ABCDEFGHIJKLMNOP";
        let mut haystack = vec![0u8; 0x100];
        haystack[0x10..0x10 + needle.len()].copy_from_slice(needle);
        haystack[0x12] = b'!'; // one byte differs from the needle
        let m = fuzzy_locate(needle, &haystack).unwrap();
        assert_eq!(m.offset, 0x10);
        assert!(m.score > 0.9 && m.score < 1.0);
    }

    #[test]
    fn empty_needle_has_no_match() {
        assert!(fuzzy_locate(b"", b"anything").is_none());
    }

    #[test]
    fn needle_larger_than_haystack_has_no_match() {
        assert!(fuzzy_locate(b"toolong", b"hi").is_none());
    }
}
