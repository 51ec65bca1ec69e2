/// Return the identifier without surrounding double quotes, backticks, or brackets.
pub fn unquote_identifier(ident: &str) -> &str {
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if let Some(inner) = ident
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner;
        }
    }
    ident
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes surrounding quotes on a single identifier,
/// and lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).to_ascii_lowercase()
}

/// Split a dotted name into its parts, ignoring dots inside double quotes.
fn split_dotted(name: &str) -> Vec<&str> {
    let mut in_quotes = false;
    let mut start = 0usize;
    let mut parts = Vec::new();

    for (idx, ch) in name.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => {
                parts.push(name[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim());
    parts
}

/// Split a qualified `table.column` name into `(table, column)`.
///
/// Handles dots inside quoted identifiers, e.g. `"my.table"."col"`.
/// Returns `None` for unqualified names.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let parts = split_dotted(name);
    if parts.len() < 2 {
        return None;
    }
    Some((
        unquote_identifier(parts[parts.len() - 2]),
        unquote_identifier(parts[parts.len() - 1]),
    ))
}

/// Column part of a qualified name (`singer.name` -> `name`).
pub fn bare_column_name(qualified: &str) -> &str {
    split_qualified(qualified).map_or(qualified, |(_, column)| column)
}

/// Table part of a qualified name (`singer.name` -> `singer`); empty when unqualified.
pub fn table_of_qualified(qualified: &str) -> &str {
    split_qualified(qualified).map_or("", |(table, _)| table)
}

/// Normalize an object name to its terminal relation identifier.
///
/// Examples:
/// - `"main.singer"` -> `"singer"`
/// - `"\"Main\".\"Singer\""` -> `"singer"`
pub fn normalize_relation_name(name: &str) -> String {
    let parts = split_dotted(name.trim());
    normalize_identifier(parts.last().copied().unwrap_or(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_qualified_handles_quoted_dots() {
        assert_eq!(
            split_qualified(r#""my.table"."col""#),
            Some(("my.table", "col"))
        );
        assert_eq!(split_qualified("singer.name"), Some(("singer", "name")));
        assert_eq!(split_qualified("name"), None);
    }

    #[test]
    fn bare_and_table_parts() {
        assert_eq!(bare_column_name("employees.salary"), "salary");
        assert_eq!(bare_column_name("salary"), "salary");
        assert_eq!(table_of_qualified("employees.salary"), "employees");
        assert_eq!(table_of_qualified("salary"), "");
    }

    #[test]
    fn normalize_relation_name_handles_schema_quotes_and_case() {
        assert_eq!(normalize_relation_name("main.singer"), "singer");
        assert_eq!(normalize_relation_name(r#""Main"."Singer""#), "singer");
        assert_eq!(normalize_relation_name("`Singer`"), "singer");
        assert_eq!(normalize_identifier(" [Name] "), "name");
    }
}
