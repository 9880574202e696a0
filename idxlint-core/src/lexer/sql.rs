//! Token lexer for SQL and JPQL text.

/// A lexical token of a SQL or JPQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlToken {
    /// Bare identifier or keyword.
    Word(String),
    /// `"quoted"` or `` `quoted` `` identifier, quotes removed.
    Quoted(String),
    /// Numeric literal.
    Number,
    /// `'string'` literal.
    Str,
    /// Bind parameter: `:name`, `?1`, `?` or `$1`.
    Param,
    /// Operator such as `=`, `<=`, `<>`, `||` or `::`.
    Op(String),
    /// Single punctuation character: `(`, `)`, `,`, `.`, `;`.
    Punct(char),
}

impl SqlToken {
    /// Whether the token is the keyword `kw`, ignoring case.
    pub fn is_kw(&self, kw: &str) -> bool {
        matches!(self, SqlToken::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    /// Identifier text for bare and quoted identifiers.
    pub fn ident(&self) -> Option<&str> {
        match self {
            SqlToken::Word(w) | SqlToken::Quoted(w) => Some(w),
            _ => None,
        }
    }

    /// Whether the token is the punctuation `c`.
    pub fn is_punct(&self, c: char) -> bool {
        matches!(self, SqlToken::Punct(p) if *p == c)
    }

    /// Whether the token is the operator `op`.
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, SqlToken::Op(o) if o == op)
    }
}

/// Comparison operators recognized in predicates.
pub const COMPARISON_OPS: &[&str] = &["=", "==", "<>", "!=", "<", ">", "<=", ">="];

/// Tokenize SQL text. Comments are dropped.
pub fn tokenize(sql: &str) -> Vec<SqlToken> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == '-' && next == Some('-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
            continue;
        }

        // String literal with '' escapes
        if c == '\'' {
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i += 1;
            tokens.push(SqlToken::Str);
            continue;
        }

        // Quoted identifier
        if c == '"' || c == '`' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != c {
                end += 1;
            }
            tokens.push(SqlToken::Quoted(chars[start..end].iter().collect()));
            i = end + 1;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(SqlToken::Number);
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            tokens.push(SqlToken::Word(chars[start..i].iter().collect()));
            continue;
        }

        // Parameters
        if c == ':' && next.is_some_and(is_ident_start) {
            i += 1;
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            tokens.push(SqlToken::Param);
            continue;
        }
        if c == '?' || (c == '$' && next.is_some_and(|n| n.is_ascii_digit())) {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            tokens.push(SqlToken::Param);
            continue;
        }

        if matches!(c, '(' | ')' | ',' | '.' | ';') {
            tokens.push(SqlToken::Punct(c));
            i += 1;
            continue;
        }

        // Operators, two characters first
        if let Some(n) = next {
            let pair: String = [c, n].iter().collect();
            if matches!(pair.as_str(), "<=" | ">=" | "<>" | "!=" | "==" | "||" | "::") {
                tokens.push(SqlToken::Op(pair));
                i += 2;
                continue;
            }
        }
        tokens.push(SqlToken::Op(c.to_string()));
        i += 1;
    }

    tokens
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Split a statement list at top-level `;` tokens.
pub fn statements(tokens: &[SqlToken]) -> Vec<&[SqlToken]> {
    tokens
        .split(|t| t.is_punct(';'))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Index of the `)` matching the `(` at `open`.
pub fn matching_paren(tokens: &[SqlToken], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split a token slice at commas outside parentheses.
pub fn split_commas(tokens: &[SqlToken]) -> Vec<&[SqlToken]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth = depth.saturating_sub(1);
        } else if token.is_punct(',') && depth == 0 {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(w: &str) -> SqlToken {
        SqlToken::Word(w.to_string())
    }

    #[test]
    fn test_tokenize_basic_select() {
        let tokens = tokenize("SELECT u.email FROM users u WHERE u.status = :status");
        assert_eq!(
            tokens,
            vec![
                word("SELECT"),
                word("u"),
                SqlToken::Punct('.'),
                word("email"),
                word("FROM"),
                word("users"),
                word("u"),
                word("WHERE"),
                word("u"),
                SqlToken::Punct('.'),
                word("status"),
                SqlToken::Op("=".to_string()),
                SqlToken::Param,
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_comments() {
        let tokens = tokenize("a = 'it''s x.y' -- trailing\n/* block */ b >= 10");
        assert_eq!(
            tokens,
            vec![
                word("a"),
                SqlToken::Op("=".to_string()),
                SqlToken::Str,
                word("b"),
                SqlToken::Op(">=".to_string()),
                SqlToken::Number,
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_and_params() {
        let tokens = tokenize("\"Users\".\"email\" = ?1 AND x::text = $2");
        assert_eq!(tokens[0], SqlToken::Quoted("Users".to_string()));
        assert_eq!(tokens[2], SqlToken::Quoted("email".to_string()));
        assert_eq!(tokens[4], SqlToken::Param);
        assert!(tokens[7].is_op("::"));
        assert_eq!(tokens[10], SqlToken::Param);
    }

    #[test]
    fn test_statements_and_commas() {
        let tokens = tokenize("a (b, c), d; e");
        let stmts = statements(&tokens);
        assert_eq!(stmts.len(), 2);
        assert_eq!(split_commas(stmts[0]).len(), 2);
        assert_eq!(matching_paren(&tokens, 1), Some(5));
    }
}
