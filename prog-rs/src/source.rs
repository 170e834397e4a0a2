//! Source preparation.
//!
//! A prog is a flat, newline-delimited list of statements.  Blank lines and
//! comment lines (`//` or `#`) are dropped here, but every kept line remembers
//! its original 1-based number so compile errors point at the right place.

/// One significant line of prog source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the original text.
    pub number: usize,
    /// The line with surrounding whitespace removed.
    pub text: String,
}

impl SourceLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }
}

/// Returns `true` for lines that produce no statement.
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with("//") || line.starts_with('#')
}

/// Split prog source into numbered, significant lines.
pub fn prepare_source(src: &str) -> Vec<SourceLine> {
    src.lines()
        .enumerate()
        .filter(|(_, raw)| !is_ignorable(raw))
        .map(|(i, raw)| SourceLine::new(i + 1, raw.trim()))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_keep_numbering() {
        let src = "var x as number\n\n// note\n  x = 1  \n# another\nreturn x";
        let lines = prepare_source(src);
        let numbered: Vec<(usize, &str)> = lines.iter().map(|l| (l.number, l.text.as_str())).collect();
        assert_eq!(
            numbered,
            vec![(1, "var x as number"), (4, "x = 1"), (6, "return x")]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let lines = prepare_source("break\r\ncontinue\r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "break");
        assert_eq!(lines[1].number, 2);
    }

    #[test]
    fn empty_source() {
        assert!(prepare_source("").is_empty());
        assert!(prepare_source("\n   \n// only comments").is_empty());
    }
}
