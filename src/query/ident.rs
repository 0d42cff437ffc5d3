use crate::error::QueryBuildError;

/// InfluxQL keywords; an identifier spelled like one must be quoted.
const RESERVED: &[&str] = &[
    "ALL", "ALTER", "ANY", "AS", "ASC", "BEGIN", "BY", "CREATE", "CONTINUOUS", "DATABASE",
    "DATABASES", "DEFAULT", "DELETE", "DESC", "DESTINATIONS", "DIAGNOSTICS", "DISTINCT", "DROP",
    "DURATION", "END", "EVERY", "EXPLAIN", "FIELD", "FOR", "FROM", "GRANT", "GRANTS", "GROUP",
    "GROUPS", "IN", "INF", "INSERT", "INTO", "KEY", "KEYS", "KILL", "LIMIT", "SHOW",
    "MEASUREMENT", "MEASUREMENTS", "NAME", "OFFSET", "ON", "ORDER", "PASSWORD", "POLICY",
    "POLICIES", "PRIVILEGES", "QUERIES", "QUERY", "READ", "REPLICATION", "RESAMPLE",
    "RETENTION", "REVOKE", "SELECT", "SERIES", "SET", "SHARD", "SHARDS", "SLIMIT", "SOFFSET",
    "STATS", "SUBSCRIPTION", "SUBSCRIPTIONS", "TAG", "TO", "USER", "USERS", "VALUES", "WHERE",
    "WITH", "WRITE",
];

pub(crate) fn validate_identifier(kind: &'static str, value: &str) -> Result<(), QueryBuildError> {
    if value.is_empty() || value.chars().any(char::is_control) {
        return Err(QueryBuildError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// True when `value` can appear unquoted: `[A-Za-z_][A-Za-z0-9_]*` and not a keyword.
pub(crate) fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(value))
}

pub(crate) fn quote_always(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quotes `value` only when the grammar requires it.
pub(crate) fn quote_identifier(value: &str) -> String {
    if is_plain_identifier(value) {
        value.to_string()
    } else {
        quote_always(value)
    }
}

/// Validates and renders a field for a `SELECT` list; `*` passes through.
pub(crate) fn render_field(value: &str) -> Result<String, QueryBuildError> {
    validate_identifier("field", value)?;
    if value == "*" {
        return Ok(value.to_string());
    }
    Ok(quote_identifier(value))
}
