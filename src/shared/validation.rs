use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for SQL identifiers accepted by the query builder (tables and columns)
    /// - Valid: "reports", "created_at", "user_id"
    /// - Invalid: "Reports", "1col", "name;drop", "a b", ""
    pub static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").unwrap();

    /// Regex for Indian mobile numbers with optional +91 prefix
    /// - Valid: "9876543210", "+919876543210", "+91 9876543210"
    /// - Invalid: "12345", "5876543210", "+1 9876543210"
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^(\+91[\s-]?)?[6-9][0-9]{9}$").unwrap();
}

/// Translate an SQL `ILIKE` pattern into a case-insensitive anchored regex.
pub fn ilike_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out)
}

/// Escape `%`, `_` and `\` so user text matches literally inside an `ILIKE` pattern.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
