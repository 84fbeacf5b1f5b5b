//! Flat-record scanner shared by annotation files and source-tree label
//! files (`VectorTable.a`, `DispTable.a`). Pure function: no I/O, no
//! directive-specific knowledge.

/// One scanned line: `[label[':']] [directive [arg(','arg)*]] [';' comment]`.
///
/// Fields are never `Option` — an absent field is the empty string (or
/// empty vec for `args`), matching the grammar in the spec.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AsmRecord {
    pub label: String,
    pub directive: String,
    pub args: Vec<String>,
    pub comment: String,
}

impl AsmRecord {
    fn is_blank(&self) -> bool {
        self.label.is_empty() && self.directive.is_empty() && self.comment.is_empty()
    }
}

/// Scans `text` line by line into records, skipping blank lines.
pub fn scan(text: &str) -> Vec<AsmRecord> {
    text.lines().filter_map(scan_line).collect()
}

fn scan_line(line: &str) -> Option<AsmRecord> {
    let (body, comment) = match line.split_once(';') {
        Some((b, c)) => (b, c.trim().to_string()),
        None => (line, String::new()),
    };

    let mut tokens = body.split_whitespace();
    let label = tokens
        .next()
        .map(|t| t.strip_suffix(':').unwrap_or(t).to_string())
        .unwrap_or_default();
    let directive = tokens.next().map(|t| t.to_string()).unwrap_or_default();
    let rest: String = tokens.collect::<Vec<_>>().join(" ");
    let args = split_args(&rest);

    let record = AsmRecord {
        label,
        directive,
        args,
        comment,
    };

    if record.is_blank() {
        None
    } else {
        Some(record)
    }
}

fn split_args(s: &str) -> Vec<String> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    let mut parts: Vec<String> = s.split(',').map(|p| p.trim().to_string()).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_directive_args_comment() {
        let recs = scan("00002000 FILE Make/Foo.a, WRITEOUT ; a comment\n");
        assert_eq!(
            recs,
            vec![AsmRecord {
                label: "00002000".into(),
                directive: "FILE".into(),
                args: vec!["Make/Foo.a".into(), "WRITEOUT".into()],
                comment: "a comment".into(),
            }]
        );
    }

    #[test]
    fn parses_colon_label_for_source_files() {
        let recs = scan("DoFoo: VEC 2010,0000,0\n");
        assert_eq!(recs[0].label, "DoFoo");
        assert_eq!(recs[0].directive, "VEC");
        assert_eq!(recs[0].args, vec!["2010", "0000", "0"]);
    }

    #[test]
    fn dangling_comma_drops_trailing_empty_arg() {
        let recs = scan("1000 FILE Foo.a,\n");
        assert_eq!(recs[0].args, vec!["Foo.a".to_string()]);
    }

    #[test]
    fn blank_and_comment_only_lines() {
        let recs = scan("\n   \n; just a comment\n00002100 ENDF\n");
        // blank lines skipped; comment-only line kept with empty directive;
        // the offset token always occupies the label slot.
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].comment, "just a comment");
        assert_eq!(recs[1].label, "00002100");
        assert_eq!(recs[1].directive, "ENDF");
    }
}
