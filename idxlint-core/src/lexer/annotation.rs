//! Annotation parsing for Kotlin and Java declarations.

use std::ops::Range;

use super::code::{mask_strings, matching_close, split_top_level, string_literals};

/// An annotation such as `@Column(name = "email_address")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Simple name, without package or use-site target (`Column`).
    pub name: String,
    /// Text between the parentheses, if any.
    pub args: Option<String>,
}

impl Annotation {
    /// Whether this annotation has the simple name `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// First string literal of the named argument `name = "..."`.
    pub fn string_arg(&self, name: &str) -> Option<String> {
        let args = self.args.as_deref()?;
        let masked = mask_strings(args);
        arg_parts(&masked)
            .into_iter()
            .find(|part| arg_name(&masked[part.clone()]) == Some(name))
            .and_then(|part| string_literals(args, &masked, part).into_iter().next())
    }

    /// Whether the named argument is set to `true`.
    pub fn flag(&self, name: &str) -> bool {
        let Some(args) = self.args.as_deref() else {
            return false;
        };
        let masked = mask_strings(args);
        arg_parts(&masked).into_iter().any(|part| {
            let text = &masked[part];
            arg_name(text) == Some(name)
                && text
                    .split_once('=')
                    .is_some_and(|(_, value)| value.trim() == "true")
        })
    }

    /// The annotation's main string value.
    ///
    /// Literals of the positional argument or of `value = ...` are
    /// concatenated, which covers `"a " + "b"` and multi-line raw strings.
    pub fn value(&self) -> Option<String> {
        let args = self.args.as_deref()?;
        let masked = mask_strings(args);
        let part = arg_parts(&masked).into_iter().find(|part| {
            matches!(arg_name(&masked[part.clone()]), None | Some("value"))
        })?;
        let literals = string_literals(args, &masked, part);
        if literals.is_empty() {
            None
        } else {
            Some(literals.concat())
        }
    }
}

fn arg_parts(masked: &str) -> Vec<Range<usize>> {
    split_top_level(masked, 0..masked.len(), b',', false)
}

/// Name of a `name = value` argument, `None` for positional arguments.
fn arg_name(part: &str) -> Option<&str> {
    let part = part.trim_start();
    let ident_len = part
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(part.len());
    if ident_len == 0 {
        return None;
    }
    let rest = part[ident_len..].trim_start();
    if rest.starts_with('=') && !rest.starts_with("==") {
        Some(&part[..ident_len])
    } else {
        None
    }
}

/// Parse the annotations at the start of `code`.
///
/// Returns the annotations and the byte offset of the first character after
/// them. `masked` must be `code` with string contents blanked.
pub fn leading_annotations(code: &str, masked: &str) -> (Vec<Annotation>, usize) {
    let bytes = masked.as_bytes();
    let mut annotations = Vec::new();
    let mut i = skip_ws(bytes, 0);

    while i < bytes.len() && bytes[i] == b'@' {
        let start = i + 1;
        let mut end = start;
        while end < bytes.len()
            && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'_' | b'.' | b':'))
        {
            end += 1;
        }
        if end == start {
            break;
        }
        let qualified = &masked[start..end];
        let name = qualified
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(qualified)
            .to_string();

        let after = skip_ws(bytes, end);
        let (args, next) = if bytes.get(after) == Some(&b'(') {
            match matching_close(masked, after) {
                Some(close) => (Some(code[after + 1..close].to_string()), close + 1),
                None => (Some(code[after + 1..].to_string()), bytes.len()),
            }
        } else {
            (None, end)
        };

        annotations.push(Annotation { name, args });
        i = skip_ws(bytes, next);
    }

    (annotations, i)
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> (Vec<Annotation>, usize) {
        leading_annotations(code, &mask_strings(code))
    }

    #[test]
    fn test_leading_annotations() {
        let code = r#"@Id @Column(name = "email_address", nullable = false) val email: String"#;
        let (annotations, rest) = parse(code);
        assert_eq!(annotations.len(), 2);
        assert!(annotations[0].is("Id"));
        assert_eq!(annotations[0].args, None);
        assert_eq!(
            annotations[1].string_arg("name").as_deref(),
            Some("email_address")
        );
        assert_eq!(&code[rest..], "val email: String");
    }

    #[test]
    fn test_use_site_target_and_qualified_names() {
        let (annotations, _) = parse("@field:Column(name = \"x\") @jakarta.persistence.Id val id: Long");
        assert_eq!(annotations[0].name, "Column");
        assert_eq!(annotations[1].name, "Id");
    }

    #[test]
    fn test_value_concatenates_literals() {
        let (annotations, _) =
            parse(r#"@Query(value = "SELECT * FROM users " + "WHERE email = ?1", nativeQuery = true)"#);
        let query = &annotations[0];
        assert_eq!(
            query.value().as_deref(),
            Some("SELECT * FROM users WHERE email = ?1")
        );
        assert!(query.flag("nativeQuery"));
        assert!(!query.flag("countQuery"));
    }

    #[test]
    fn test_positional_value() {
        let (annotations, _) = parse(r#"@Query("SELECT u FROM User u", countQuery = "SELECT 1")"#);
        assert_eq!(annotations[0].value().as_deref(), Some("SELECT u FROM User u"));
        assert_eq!(annotations[0].string_arg("countQuery").as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_nested_brackets_in_args() {
        let (annotations, _) =
            parse(r#"@Table(name = "users", indexes = [Index(columnList = "email")])"#);
        assert_eq!(annotations[0].string_arg("name").as_deref(), Some("users"));
    }
}
