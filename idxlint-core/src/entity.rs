//! Entity-to-table mapping.
//!
//! Reads JPA entity classes written in Kotlin or Java and recovers the table
//! each one is stored in together with the column behind every persistent
//! field. The scan is textual: annotations and declarations are found with
//! the comment and string aware helpers in [`crate::lexer`], not by parsing
//! the language.
//!
//! Column resolution for a field, first match wins:
//!
//! 1. `@Column(name = "...")`
//! 2. `@JoinColumn(name = "...")`
//! 3. collection relations (`@OneToMany`, `@ManyToMany`, `@JoinTable`) and
//!    non-persistent fields (`@Transient`, `@ElementCollection`, the Java
//!    `transient` modifier) are left out
//! 4. the snake_case form of the field name

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex_lite::Regex;
use tracing::debug;

use crate::lexer::annotation::{Annotation, leading_annotations};
use crate::lexer::code::{code_text, mask_strings, matching_close, split_lines, split_top_level};
use crate::model::TableMapping;
use crate::naming::to_snake_case;
use crate::source::{SOURCE_EXTENSIONS, find_files, read_source};

/// Annotations whose fields are not columns of the entity's table.
const EXCLUDED_FIELD_ANNOTATIONS: &[&str] = &[
    "OneToMany",
    "ManyToMany",
    "JoinTable",
    "Transient",
    "ElementCollection",
];

/// Declaration modifiers skipped in front of a field.
const FIELD_MODIFIERS: &[&str] = &[
    "private",
    "protected",
    "public",
    "internal",
    "final",
    "override",
    "open",
    "lateinit",
    "volatile",
    "abstract",
];

/// Words that start a member which is never a field.
const NON_FIELD_KEYWORDS: &[&str] = &[
    "fun",
    "class",
    "interface",
    "object",
    "companion",
    "init",
    "constructor",
    "enum",
    "return",
    "import",
    "package",
];

static ENTITY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(?:[A-Za-z_][\w.]*\.)?Entity\b").expect("valid regex"));
static TABLE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(?:[A-Za-z_][\w.]*\.)?Table\b").expect("valid regex"));
static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+([A-Za-z_]\w*)").expect("valid regex"));
static KOTLIN_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:val|var)\s+([A-Za-z_]\w*)").expect("valid regex"));
static TRAILING_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*$").expect("valid regex"));

/// Map one entity source text. Returns `None` for anything that is not an
/// `@Entity` with a `@Table` name.
pub fn map_source(text: &str) -> Option<TableMapping> {
    let code = code_text(&split_lines(text));
    let masked = mask_strings(&code);

    let marker = ENTITY_MARKER.find(&masked)?;
    let class = CLASS_DECL.captures_at(&masked, marker.end())?;
    let class_match = class.get(0)?;
    let entity_name = class.get(1)?.as_str().to_string();

    let table_name = table_name(&code, &masked, class_match.start())?;

    let mut fields = IndexMap::new();
    let header_end = class_match.end();

    let mut body_search = header_end;
    if let Some(params) = constructor_params(&masked, header_end) {
        for part in split_top_level(&masked, params.clone(), b',', true) {
            collect_member(&code, &masked, part, &[], &mut fields);
        }
        body_search = params.end + 1;
    }

    if let Some(body) = class_body(&masked, body_search) {
        collect_body(&code, &masked, body, &mut fields);
    }

    Some(TableMapping::new(entity_name, table_name, fields))
}

/// Map one entity file. Unreadable files map to nothing.
pub fn map_file(path: &Path) -> Option<TableMapping> {
    let text = read_source(path)?;
    let mapping = map_source(&text);
    if let Some(mapping) = &mapping {
        debug!(
            file = %path.display(),
            entity = %mapping.entity_name,
            table = %mapping.table_name,
            fields = mapping.field_to_column.len(),
            "mapped entity"
        );
    }
    mapping
}

/// Map every entity under `dir`, keyed by entity name.
pub fn map_all(dir: &Path) -> BTreeMap<String, TableMapping> {
    find_files(dir, SOURCE_EXTENSIONS)
        .iter()
        .filter_map(|path| map_file(path))
        .map(|mapping| (mapping.entity_name.clone(), mapping))
        .collect()
}

/// The `@Table(name = ...)` declared before the class keyword.
fn table_name(code: &str, masked: &str, class_start: usize) -> Option<String> {
    let marker = TABLE_MARKER.find_iter(&masked[..class_start]).last()?;
    let (annotations, _) =
        leading_annotations(&code[marker.start()..], &masked[marker.start()..]);
    annotations
        .first()
        .and_then(|a| a.string_arg("name"))
        .map(|name| clean_identifier(&name))
        .filter(|name| !name.is_empty())
}

/// Range of a Kotlin primary constructor parameter list after the class name.
fn constructor_params(masked: &str, mut i: usize) -> Option<Range<usize>> {
    let bytes = masked.as_bytes();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            b'<' => {
                let close = masked[i..].find('>')?;
                i += close + 1;
            }
            b'(' => {
                let close = matching_close(masked, i)?;
                return Some(i + 1..close);
            }
            b'@' => {
                let (_, rest) = leading_annotations(&masked[i..], &masked[i..]);
                if rest == 0 {
                    return None;
                }
                i += rest;
            }
            _ => {
                let word_end = masked[i..]
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .map(|end| i + end)
                    .unwrap_or(masked.len());
                match &masked[i..word_end] {
                    "constructor" | "private" | "protected" | "internal" | "public" => {
                        i = word_end
                    }
                    _ => return None,
                }
            }
        }
    }
}

/// Range inside the braces of the class body.
fn class_body(masked: &str, from: usize) -> Option<Range<usize>> {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'{' if depth == 0 => {
                // A body-less class followed by another declaration.
                if CLASS_DECL.is_match(&masked[from..i]) {
                    return None;
                }
                let close = matching_close(masked, i)?;
                return Some(i + 1..close);
            }
            _ => {}
        }
    }
    None
}

/// Walk the top level of a class body and collect field declarations.
///
/// Members end at `;`, at a line break outside brackets, or at a nested
/// block. Annotation-only members carry over to the next member; a member
/// that owns a block (method, initializer, nested type) drops them.
fn collect_body(
    code: &str,
    masked: &str,
    body: Range<usize>,
    fields: &mut IndexMap<String, String>,
) {
    let bytes = masked.as_bytes();
    let mut pending: Vec<Annotation> = Vec::new();
    let mut depth = 0usize;
    let mut start = body.start;
    let mut i = body.start;

    while i < body.end {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'{' if depth == 0 => {
                pending.clear();
                i = matching_close(masked, i).unwrap_or(body.end) + 1;
                start = i;
                continue;
            }
            b';' | b'\n' if depth == 0 => {
                let segment = start..i;
                start = i + 1;
                if masked[segment.clone()].trim().is_empty() {
                    i += 1;
                    continue;
                }
                let (annotations, rest) =
                    leading_annotations(&code[segment.clone()], &masked[segment.clone()]);
                if segment.start + rest >= segment.end
                    || masked[segment.start + rest..segment.end].trim().is_empty()
                {
                    pending.extend(annotations);
                } else {
                    collect_member(code, masked, segment, &pending, fields);
                    pending.clear();
                }
            }
            _ => {}
        }
        i += 1;
    }

    if start < body.end && !masked[start..body.end].trim().is_empty() {
        collect_member(code, masked, start..body.end, &pending, fields);
    }
}

/// Resolve one member declaration and record it if it is a mapped field.
fn collect_member(
    code: &str,
    masked: &str,
    range: Range<usize>,
    inherited: &[Annotation],
    fields: &mut IndexMap<String, String>,
) {
    let (own, rest) = leading_annotations(&code[range.clone()], &masked[range.clone()]);
    let decl = &masked[range.start + rest..range.end];

    let mut annotations = inherited.to_vec();
    annotations.extend(own);

    let Some(field) = field_name(decl) else {
        return;
    };
    if let Some(column) = resolve_column(&field, &annotations) {
        fields.insert(field, column);
    }
}

/// Name of the field declared by `decl` (masked text), if it is one.
fn field_name(decl: &str) -> Option<String> {
    let mut rest = decl.trim();
    loop {
        let word_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..word_end];
        if word == "static" || word == "transient" || word == "const" {
            return None;
        }
        if NON_FIELD_KEYWORDS.contains(&word) {
            return None;
        }
        if FIELD_MODIFIERS.contains(&word) {
            rest = rest[word_end..].trim_start();
            continue;
        }
        break;
    }

    if let Some(caps) = KOTLIN_PROPERTY.captures(rest) {
        return Some(caps[1].to_string());
    }

    // Java: `Type name [= initializer]`
    let declarator = rest.split('=').next().unwrap_or(rest);
    if declarator.contains('(') || declarator.contains(':') {
        return None;
    }
    let caps = TRAILING_IDENT.captures(declarator)?;
    let name = caps.get(1)?;
    if declarator[..name.start()].trim().is_empty() {
        return None;
    }
    Some(name.as_str().to_string())
}

/// Column for a field, or `None` if the field is not a column.
fn resolve_column(field: &str, annotations: &[Annotation]) -> Option<String> {
    let explicit = |name: &str| {
        annotations
            .iter()
            .filter(|a| a.is(name))
            .find_map(|a| a.string_arg("name"))
            .map(|column| clean_identifier(&column))
            .filter(|column| !column.is_empty())
    };

    if let Some(column) = explicit("Column") {
        return Some(column);
    }
    if let Some(column) = explicit("JoinColumn") {
        return Some(column);
    }
    if annotations
        .iter()
        .any(|a| EXCLUDED_FIELD_ANNOTATIONS.contains(&a.name.as_str()))
    {
        return None;
    }
    Some(to_snake_case(field))
}

/// Strip identifier quoting such as `` `order` `` or `\"order\"`.
fn clean_identifier(name: &str) -> String {
    name.trim().trim_matches(['`', '"', '[', ']']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KOTLIN_USER: &str = r#"
package com.example.user

import jakarta.persistence.*

@Entity
@Table(name = "users")
class User(
    @Id
    @GeneratedValue(strategy = GenerationType.IDENTITY)
    val id: Long = 0,

    @Column(name = "email_address", nullable = false)
    val email: String,

    val orderDate: LocalDate? = null,

    @ManyToOne(fetch = FetchType.LAZY)
    @JoinColumn(name = "team_ref")
    val team: Team? = null,

    @OneToMany(mappedBy = "user")
    val orders: List<Order> = emptyList(),

    val tags: Map<String, Long> = emptyMap(),
) {
    @ManyToMany
    @JoinTable(name = "user_roles")
    var roles: MutableSet<Role> = mutableSetOf()

    var displayName: String = ""

    fun rename(name: String) {
        val temporary = name.trim()
        displayName = temporary
    }

    companion object {
        const val MAX = 10
    }
}
"#;

    #[test]
    fn test_map_kotlin_entity() {
        let mapping = map_source(KOTLIN_USER).unwrap();
        assert_eq!(mapping.entity_name, "User");
        assert_eq!(mapping.table_name, "users");

        assert_eq!(mapping.column("email"), Some("email_address"));
        assert_eq!(mapping.column("orderDate"), Some("order_date"));
        assert_eq!(mapping.column("team"), Some("team_ref"));
        assert_eq!(mapping.column("tags"), Some("tags"));
        assert_eq!(mapping.column("displayName"), Some("display_name"));
        assert_eq!(mapping.column("orders"), None);
        assert_eq!(mapping.column("roles"), None);
        assert_eq!(mapping.column("temporary"), None);
        assert_eq!(mapping.column("MAX"), None);
        assert_eq!(mapping.column("id"), Some("id"));
        assert_eq!(mapping.column("createdAt"), Some("created_at"));
    }

    #[test]
    fn test_map_java_entity() {
        let source = r#"
package com.example.order;

/**
 * Customer order. @Entity in a comment is ignored.
 */
@Entity
@Table(name = "orders", indexes = {@Index(name = "idx_status", columnList = "status")})
public class Order extends BaseEntity implements Serializable {
    private static final long serialVersionUID = 1L;

    @Id
    private Long id;

    @Column(name = "order_status")
    private OrderStatus status;

    @ManyToOne
    @JoinColumn(name = "customer_id")
    private Customer customer;

    @OneToMany(mappedBy = "order")
    private List<OrderLine> lines = new ArrayList<>();

    private transient String cached;

    @Transient
    private String preview;

    private BigDecimal totalAmount;

    public OrderStatus getStatus() {
        String local = "x";
        return status;
    }
}
"#;
        let mapping = map_source(source).unwrap();
        assert_eq!(mapping.entity_name, "Order");
        assert_eq!(mapping.table_name, "orders");
        assert_eq!(mapping.column("status"), Some("order_status"));
        assert_eq!(mapping.column("customer"), Some("customer_id"));
        assert_eq!(mapping.column("totalAmount"), Some("total_amount"));
        assert_eq!(mapping.column("lines"), None);
        assert_eq!(mapping.column("cached"), None);
        assert_eq!(mapping.column("preview"), None);
        assert_eq!(mapping.column("local"), None);
        assert_eq!(mapping.column("serialVersionUID"), None);
    }

    #[test]
    fn test_column_beats_join_column() {
        let source = r#"
@Entity
@Table(name = "accounts")
class Account(
    @OneToOne
    @JoinColumn(name = "profile_fk")
    @Column(name = "profile_col")
    val profile: Profile,
)
"#;
        let mapping = map_source(source).unwrap();
        assert_eq!(mapping.column("profile"), Some("profile_col"));
    }

    #[test]
    fn test_not_an_entity() {
        assert!(map_source("class Plain(val name: String)").is_none());
        assert!(map_source("@Entity\nclass NoTable(val name: String)").is_none());
        assert!(map_source("@Embeddable\n@Table(name = \"x\")\nclass Part(val a: Int)").is_none());
    }

    #[test]
    fn test_use_site_targets_and_inline_annotations() {
        let source = r#"
@Entity @Table(name = "events")
data class Event(
    @field:Column(name = "occurred_on") val occurredAt: Instant,
    @Id val id: UUID,
)
"#;
        let mapping = map_source(source).unwrap();
        assert_eq!(mapping.entity_name, "Event");
        assert_eq!(mapping.column("occurredAt"), Some("occurred_on"));
    }

    #[test]
    fn test_map_all_reads_latin1_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bytes = b"// Gr\xfc\xdfe aus M\xfcnchen\n".to_vec();
        bytes.extend_from_slice(KOTLIN_USER.as_bytes());
        std::fs::write(dir.path().join("User.kt"), bytes).unwrap();

        let mappings = map_all(dir.path());
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings["User"].column("email"), Some("email_address"));
    }

    #[test]
    fn test_map_all_reads_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("domain")).unwrap();
        std::fs::write(dir.path().join("domain/User.kt"), KOTLIN_USER).unwrap();
        std::fs::write(dir.path().join("domain/Util.kt"), "object Util").unwrap();

        let mappings = map_all(dir.path());
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings["User"].table_name, "users");
    }
}
