//! Comment and string aware scanning of Kotlin and Java source text.
//!
//! Nothing here understands the grammar of either language. The scanner only
//! knows where comments and string literals start and end, which is enough
//! to find annotations, declarations and matching brackets without being
//! fooled by a brace inside a query string or a method name inside a comment.

use std::ops::Range;

/// One physical line of source, split into code and comment text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number.
    pub number: usize,
    /// Code on this line with comments removed; string literals are kept.
    pub code: String,
    /// Comment text on this line, markers included.
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Str,
    RawStr,
    CharLit,
}

/// Split source text into lines of code and comment text.
///
/// Block comments and triple-quoted strings may span lines; the state is
/// carried across line breaks. A plain string that is still open at the end
/// of a line is closed there, so one stray quote cannot swallow the file.
pub fn split_lines(src: &str) -> Vec<SourceLine> {
    let chars: Vec<char> = src.chars().collect();
    let mut lines = Vec::new();
    let mut code = String::new();
    let mut comment = String::new();
    let mut state = State::Code;
    let mut number = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '\n' {
            if matches!(state, State::LineComment | State::Str | State::CharLit) {
                state = State::Code;
            }
            lines.push(SourceLine {
                number,
                code: std::mem::take(&mut code),
                comment: std::mem::take(&mut comment),
            });
            number += 1;
            i += 1;
            continue;
        }
        if c == '\r' {
            i += 1;
            continue;
        }

        match state {
            State::Code => {
                if c == '/' && next == Some('/') {
                    state = State::LineComment;
                    comment.push_str("//");
                    i += 2;
                    continue;
                }
                if c == '/' && next == Some('*') {
                    state = State::BlockComment;
                    comment.push_str("/*");
                    i += 2;
                    continue;
                }
                if is_triple_quote(&chars, i) {
                    state = State::RawStr;
                    code.push_str("\"\"\"");
                    i += 3;
                    continue;
                }
                match c {
                    '"' => state = State::Str,
                    '\'' => state = State::CharLit,
                    _ => {}
                }
                code.push(c);
            }
            State::LineComment => comment.push(c),
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = State::Code;
                    comment.push_str("*/");
                    code.push(' ');
                    i += 2;
                    continue;
                }
                comment.push(c);
            }
            State::Str | State::CharLit => {
                let quote = if state == State::Str { '"' } else { '\'' };
                code.push(c);
                if c == '\\' {
                    if let Some(n) = next.filter(|n| *n != '\n') {
                        code.push(n);
                        i += 2;
                        continue;
                    }
                } else if c == quote {
                    state = State::Code;
                }
            }
            State::RawStr => {
                if is_triple_quote(&chars, i) {
                    // Kotlin allows extra quotes right before the closing delimiter.
                    let mut end = i;
                    while chars.get(end + 3) == Some(&'"') {
                        code.push('"');
                        end += 1;
                    }
                    code.push_str("\"\"\"");
                    state = State::Code;
                    i = end + 3;
                    continue;
                }
                code.push(c);
            }
        }
        i += 1;
    }

    if !code.is_empty() || !comment.is_empty() {
        lines.push(SourceLine {
            number,
            code,
            comment,
        });
    }

    lines
}

/// Join the code of every line back into one text, comments removed.
///
/// Line `n` of the result is `lines[n - 1].code`, so byte offsets can be
/// mapped back to line numbers with [`line_of`].
pub fn code_text(lines: &[SourceLine]) -> String {
    lines
        .iter()
        .map(|l| l.code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 1-based line number of a byte offset in `text`.
pub fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

fn is_triple_quote(chars: &[char], i: usize) -> bool {
    chars.get(i) == Some(&'"') && chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"')
}

/// Blank out the contents of string and char literals.
///
/// The result has exactly the same byte length as `code`, with every byte
/// inside a literal replaced by a space. Quotes stay in place. Structural
/// searches run on the masked text and slice values out of the original.
pub fn mask_strings(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Code | State::LineComment | State::BlockComment => {
                if bytes[i..].starts_with(b"\"\"\"") {
                    out.extend_from_slice(b"\"\"\"");
                    state = State::RawStr;
                    i += 3;
                    continue;
                }
                match b {
                    b'"' => state = State::Str,
                    b'\'' => state = State::CharLit,
                    _ => {}
                }
                out.push(b);
            }
            State::Str | State::CharLit => {
                let quote = if state == State::Str { b'"' } else { b'\'' };
                if b == b'\\' && i + 1 < bytes.len() && bytes[i + 1] != b'\n' {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                if b == quote || b == b'\n' {
                    state = State::Code;
                    out.push(b);
                } else {
                    out.push(b' ');
                }
            }
            State::RawStr => {
                if bytes[i..].starts_with(b"\"\"\"") {
                    let mut end = i;
                    while bytes.get(end + 3) == Some(&b'"') {
                        out.push(b' ');
                        end += 1;
                    }
                    out.extend_from_slice(b"\"\"\"");
                    state = State::Code;
                    i = end + 3;
                    continue;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
            }
        }
        i += 1;
    }

    // Only ASCII bytes were substituted for whole literal contents, so the
    // buffer is valid UTF-8 wherever the original was.
    String::from_utf8(out).unwrap_or_default()
}

/// Index of the bracket closing the one at `open` in masked text.
///
/// All of `()`, `[]` and `{}` count towards nesting.
pub fn matching_close(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `range` of masked text at `sep` occurring outside any brackets.
///
/// With `angle` set, `<...>` also nests, which keeps generic argument lists
/// such as `Map<String, Long>` in one piece.
pub fn split_top_level(masked: &str, range: Range<usize>, sep: u8, angle: bool) -> Vec<Range<usize>> {
    let bytes = masked.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut angles = 0usize;
    let mut start = range.start;

    for i in range.clone() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'<' if angle => angles += 1,
            b'>' if angle && i > 0 && bytes[i - 1] != b'-' => angles = angles.saturating_sub(1),
            b if b == sep && depth == 0 && angles == 0 => {
                parts.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(start..range.end);
    parts
}

/// Contents of every string literal inside `range`, in order.
///
/// Escapes are resolved for plain strings; triple-quoted strings are taken
/// verbatim.
pub fn string_literals(code: &str, masked: &str, range: Range<usize>) -> Vec<String> {
    let bytes = masked.as_bytes();
    let mut out = Vec::new();
    let mut i = range.start;

    while i < range.end {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        if masked[i..].starts_with("\"\"\"") {
            let body = i + 3;
            let Some(close) = masked[body..range.end].find("\"\"\"") else {
                break;
            };
            // Quotes kept in front of the delimiter belong to the content.
            let mut end = body + close;
            while masked[end + 3..].starts_with('"') {
                end += 1;
            }
            out.push(code[body..end].to_string());
            i = end + 3;
        } else {
            let body = i + 1;
            let Some(close) = masked[body..range.end].find('"') else {
                break;
            };
            out.push(unescape(&code[body..body + close]));
            i = body + close + 1;
        }
    }

    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_lines_separates_comments() {
        let lines = split_lines("val a = 1 // note\n/* block\n still */ val b = 2\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].code.trim(), "val a = 1");
        assert_eq!(lines[0].comment, "// note");
        assert_eq!(lines[1].code, "");
        assert_eq!(lines[2].code.trim(), "val b = 2");
        assert!(lines[2].comment.contains("still"));
    }

    #[test]
    fn test_split_lines_keeps_comment_markers_inside_strings() {
        let lines = split_lines("@Query(\"SELECT u FROM User u // not a comment\")\n");
        assert!(lines[0].code.contains("// not a comment"));
        assert!(lines[0].comment.is_empty());
    }

    #[test]
    fn test_split_lines_raw_string_spans_lines() {
        let src = "@Query(\"\"\"\n  SELECT u -- x\n  FROM User u /* y */\n\"\"\")\nfun f()\n";
        let lines = split_lines(src);
        assert_eq!(lines.len(), 5);
        assert!(lines[2].code.contains("/* y */"));
        assert!(lines[2].comment.is_empty());
        assert_eq!(lines[4].code, "fun f()");
    }

    #[test]
    fn test_mask_strings_keeps_length() {
        let code = r#"@Query("a(b") fun x() { "}" }"#;
        let masked = mask_strings(code);
        assert_eq!(masked.len(), code.len());
        assert!(!masked.contains("a(b"));
        let open = masked.find('{').unwrap();
        assert_eq!(matching_close(&masked, open), Some(code.len() - 1));
    }

    #[test]
    fn test_split_top_level_respects_generics() {
        let code = "val a: Map<String, Long>, val b: Int";
        let masked = mask_strings(code);
        let parts = split_top_level(&masked, 0..code.len(), b',', true);
        assert_eq!(parts.len(), 2);
        assert_eq!(code[parts[0].clone()].trim(), "val a: Map<String, Long>");
    }

    #[test]
    fn test_string_literals() {
        let code = r#"value = "SELECT \"x\" " + "FROM t", other = """raw "q" """"#;
        let masked = mask_strings(code);
        let literals = string_literals(code, &masked, 0..code.len());
        assert_eq!(literals, vec![r#"SELECT "x" "#, "FROM t", r#"raw "q" "#]);
    }

    #[test]
    fn test_line_of() {
        let text = "a\nb\nc";
        assert_eq!(line_of(text, 0), 1);
        assert_eq!(line_of(text, 2), 2);
        assert_eq!(line_of(text, 4), 3);
    }
}
