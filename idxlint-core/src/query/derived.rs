//! Derived queries: predicates encoded in repository method names.
//!
//! `findByStatusAndCreatedAtAfterOrderByNameDesc` reads as
//!
//! ```text
//! find | By | Status | And | CreatedAt(After) | OrderBy | Name(Desc)
//! ```
//!
//! The subject prefix and the condition suffixes are matched against the
//! ordered tables below, longest entry first.

/// What a derived query does with the rows it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Find,
    Stream,
    Count,
    Exists,
    Delete,
}

/// One subject prefix. `head` is followed by `By`; with `limit` set a row
/// limit such as `Top10` may sit between the two.
#[derive(Debug, Clone, Copy)]
pub struct QueryPrefix {
    pub head: &'static str,
    pub limit: bool,
    pub intent: QueryIntent,
}

const fn prefix(head: &'static str, intent: QueryIntent) -> QueryPrefix {
    QueryPrefix {
        head,
        limit: false,
        intent,
    }
}

const fn limited(head: &'static str, intent: QueryIntent) -> QueryPrefix {
    QueryPrefix {
        head,
        limit: true,
        intent,
    }
}

/// Recognized subject prefixes.
pub const QUERY_PREFIXES: &[QueryPrefix] = &[
    prefix("find", QueryIntent::Find),
    prefix("findAll", QueryIntent::Find),
    prefix("findDistinct", QueryIntent::Find),
    prefix("findAllDistinct", QueryIntent::Find),
    limited("findFirst", QueryIntent::Find),
    limited("findTop", QueryIntent::Find),
    limited("findDistinctFirst", QueryIntent::Find),
    limited("findDistinctTop", QueryIntent::Find),
    prefix("read", QueryIntent::Find),
    prefix("readAll", QueryIntent::Find),
    limited("readFirst", QueryIntent::Find),
    limited("readTop", QueryIntent::Find),
    prefix("get", QueryIntent::Find),
    prefix("getAll", QueryIntent::Find),
    limited("getFirst", QueryIntent::Find),
    limited("getTop", QueryIntent::Find),
    prefix("query", QueryIntent::Find),
    prefix("queryAll", QueryIntent::Find),
    prefix("search", QueryIntent::Find),
    prefix("searchAll", QueryIntent::Find),
    prefix("stream", QueryIntent::Stream),
    prefix("streamAll", QueryIntent::Stream),
    limited("streamFirst", QueryIntent::Stream),
    limited("streamTop", QueryIntent::Stream),
    prefix("count", QueryIntent::Count),
    prefix("countAll", QueryIntent::Count),
    prefix("countDistinct", QueryIntent::Count),
    prefix("exists", QueryIntent::Exists),
    prefix("delete", QueryIntent::Delete),
    prefix("deleteAll", QueryIntent::Delete),
    prefix("remove", QueryIntent::Delete),
    prefix("removeAll", QueryIntent::Delete),
];

/// Condition keywords that may end a predicate part, longest first.
pub const CONDITION_SUFFIXES: &[&str] = &[
    "StartingWithIgnoreCase",
    "ContainingIgnoreCase",
    "EndingWithIgnoreCase",
    "ContainsIgnoreCase",
    "IsGreaterThanEqual",
    "GreaterThanEqual",
    "IsLessThanEqual",
    "IsStartingWith",
    "IsGreaterThan",
    "AllIgnoreCase",
    "LessThanEqual",
    "IsContaining",
    "IsEndingWith",
    "StartingWith",
    "GreaterThan",
    "IsNotEmpty",
    "IsLessThan",
    "IgnoreCase",
    "Containing",
    "EndingWith",
    "StartsWith",
    "IsBetween",
    "IsNotNull",
    "IsNotLike",
    "NotEmpty",
    "LessThan",
    "IsBefore",
    "EndsWith",
    "Contains",
    "IsEmpty",
    "IsAfter",
    "Between",
    "NotNull",
    "NotLike",
    "IsFalse",
    "IsNotIn",
    "IsNull",
    "IsLike",
    "IsTrue",
    "Before",
    "Equals",
    "IsNot",
    "False",
    "After",
    "Empty",
    "NotIn",
    "IsIn",
    "Like",
    "True",
    "Null",
    "Not",
    "Is",
    "In",
];

const ORDER_BY: &str = "OrderBy";
const DIRECTIONS: &[&str] = &["Desc", "Asc"];

/// A method name decomposed into intent and referenced properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    pub intent: QueryIntent,
    /// Property names in order of appearance, first letter lower-cased.
    pub properties: Vec<String>,
}

/// Strip the longest matching subject prefix, returning intent and remainder.
pub fn strip_prefix(method: &str) -> Option<(QueryIntent, &str)> {
    QUERY_PREFIXES
        .iter()
        .filter_map(|p| {
            let mut rest = method.strip_prefix(p.head)?;
            if p.limit {
                rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            }
            let rest = rest.strip_prefix("By")?;
            Some((p.head.len(), p.intent, rest))
        })
        .max_by_key(|(len, _, _)| *len)
        .map(|(_, intent, rest)| (intent, rest))
}

/// Split a predicate at `And`/`Or` keywords that start a new capitalized word.
pub fn split_predicate(predicate: &str) -> Vec<&str> {
    let bytes = predicate.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let keyword_len = if predicate[i..].starts_with("And") {
            3
        } else if predicate[i..].starts_with("Or") {
            2
        } else {
            0
        };
        if keyword_len > 0
            && bytes
                .get(i + keyword_len)
                .is_some_and(|b| b.is_ascii_uppercase())
        {
            parts.push(&predicate[start..i]);
            i += keyword_len;
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(&predicate[start..]);
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Remove the longest condition suffix from a predicate part.
///
/// At most one suffix is removed and a part is never reduced to nothing.
///
/// This departs from plain suffix stripping in one case: a part that names a
/// mapped property (per `is_property`) is returned whole, even when it ends
/// in a condition keyword. `LoggedIn` on an entity with a `loggedIn` field
/// stays `LoggedIn` instead of becoming `Logged`. Without such a property
/// the suffix is always stripped.
pub fn strip_condition<'a>(part: &'a str, is_property: impl Fn(&str) -> bool) -> &'a str {
    if is_property(&crate::naming::decapitalize(part)) {
        return part;
    }
    CONDITION_SUFFIXES
        .iter()
        .find(|suffix| part.len() > suffix.len() && part.ends_with(*suffix))
        .map(|suffix| &part[..part.len() - suffix.len()])
        .unwrap_or(part)
}

/// Decompose a repository method name.
///
/// Returns `None` when the name does not start with a known subject prefix.
pub fn parse_method_name(
    method: &str,
    is_property: impl Fn(&str) -> bool,
) -> Option<DerivedQuery> {
    let (intent, rest) = strip_prefix(method)?;

    let (predicate, order) = match rest.find(ORDER_BY) {
        Some(pos) => (&rest[..pos], Some(&rest[pos + ORDER_BY.len()..])),
        None => (rest, None),
    };

    let mut properties: Vec<String> = split_predicate(predicate)
        .into_iter()
        .map(|part| strip_condition(part, &is_property))
        .map(crate::naming::decapitalize)
        .collect();

    if let Some(order) = order {
        let field = DIRECTIONS
            .iter()
            .find(|d| order.len() > d.len() && order.ends_with(*d))
            .map(|d| &order[..order.len() - d.len()])
            .unwrap_or(order);
        if !field.is_empty() {
            properties.push(crate::naming::decapitalize(field));
        }
    }

    Some(DerivedQuery { intent, properties })
}
