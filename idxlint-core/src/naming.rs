//! Field name to column name transliteration.

/// Convert a camelCase field name to a snake_case column name.
///
/// An underscore is inserted before every uppercase letter that directly
/// follows a lowercase letter, then the whole name is lower-cased. Runs of
/// capitals are not split: `URLValue` becomes `urlvalue`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_lowercase();
        out.extend(c.to_lowercase());
    }

    out
}

/// Lower-case the first character of an identifier.
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
