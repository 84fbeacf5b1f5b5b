//! Manual loader: the annotation file's self-editing offset-fixup pass
//! (§4.3), followed by bucketing into a directive-keyed, insertion-order
//! preserving map.

use crate::error::ManualError;
use crate::scanner::{self, AsmRecord};

/// One directive occurrence: the offset it applies at, plus its
/// comma-separated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub offset: usize,
    pub args: Vec<String>,
    pub comment: String,
}

/// Directive-name-keyed, insertion-order-preserving map built from an
/// annotation file (or an in-memory equivalent).
#[derive(Debug, Default, Clone)]
pub struct AnnotationMap {
    entries: Vec<(String, Vec<Directive>)>,
}

impl AnnotationMap {
    pub fn get(&self, directive: &str) -> &[Directive] {
        self.entries
            .iter()
            .find(|(name, _)| name == directive)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    fn push(&mut self, directive: String, d: Directive) {
        if let Some((_, v)) = self.entries.iter_mut().find(|(name, _)| *name == directive) {
            v.push(d);
        } else {
            self.entries.push((directive, vec![d]));
        }
    }
}

/// Runs the self-edit rewrite pass over raw annotation text.
///
/// Operates on lines as raw byte sequences so that unmatched lines and
/// line endings survive byte-for-byte. Returns the rewritten text; the
/// caller compares against the input to decide whether a rewrite
/// occurred.
pub fn self_edit(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut accumulator: u64 = 0;
    let mut width: usize = 0;

    for segment in split_keeping_terminators(text) {
        let (content, terminator) = segment;
        let rewritten = rewrite_line(content, &mut accumulator, &mut width);
        out.extend_from_slice(&rewritten);
        out.extend_from_slice(terminator);
    }

    out
}

/// Splits `text` into `(line_content, terminator)` pairs, where
/// `terminator` is `"\r\n"`, `"\n"`, or empty (final line with no
/// trailing newline).
fn split_keeping_terminators(text: &[u8]) -> Vec<(&[u8], &[u8])> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < text.len() {
        if text[i] == b'\n' {
            let end = if i > start && text[i - 1] == b'\r' { i - 1 } else { i };
            out.push((&text[start..end], &text[end..i + 1]));
            start = i + 1;
        }
        i += 1;
    }
    if start < text.len() {
        out.push((&text[start..], &[][..]));
    }
    out
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn leading_hex_token(line: &[u8]) -> Option<&[u8]> {
    let end = line.iter().position(|&b| !is_hex_digit(b)).unwrap_or(line.len());
    if end == 0 {
        None
    } else {
        Some(&line[..end])
    }
}

fn rewrite_line(line: &[u8], accumulator: &mut u64, width: &mut usize) -> Vec<u8> {
    if line.first().copied() == Some(b'+') {
        if let Some(token) = leading_hex_token(&line[1..]) {
            if let Ok(token_str) = std::str::from_utf8(token) {
                if let Ok(delta) = u64::from_str_radix(token_str, 16) {
                    let new_value = accumulator.wrapping_add(delta);
                    let formatted = format!("{:0width$X}", new_value, width = *width);
                    let mut out = formatted.into_bytes();
                    out.extend_from_slice(&line[1 + token.len()..]);
                    return out;
                }
            }
        }
        return line.to_vec();
    }

    if let Some(token) = leading_hex_token(line) {
        if let Ok(token_str) = std::str::from_utf8(token) {
            if let Ok(value) = u64::from_str_radix(token_str, 16) {
                *accumulator = value;
                *width = token.len();
            }
        }
    }

    line.to_vec()
}

/// Loads and parses an annotation map from already-self-edited,
/// ASCII/CRLF-normalized text.
pub fn parse(text: &str) -> Result<AnnotationMap, ManualError> {
    let mut map = AnnotationMap::default();
    let mut last_offset: Option<usize> = None;

    for AsmRecord {
        label,
        directive,
        args,
        comment,
    } in scanner::scan(text)
    {
        if directive.is_empty() {
            continue;
        }
        let Ok(offset) = usize::from_str_radix(&label, 16) else {
            continue;
        };

        if let Some(prev) = last_offset {
            if offset < prev {
                return Err(ManualError::OutOfOrder { offset, prev });
            }
        }
        last_offset = Some(offset);

        let directive_upper = directive.to_ascii_uppercase();
        if directive_upper == "ISLANDGUESS" && offset != 0 {
            return Err(ManualError::IslandGuessNotAtZero { offset });
        }

        map.push(
            directive_upper,
            Directive {
                offset,
                args,
                comment,
            },
        );
    }

    Ok(map)
}
