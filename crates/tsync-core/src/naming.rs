//! Destination naming and SQL identifier quoting
//!
//! Wide table and column names are derived from registry labels, so they are
//! always quoted before being spliced into dynamic SQL.

/// Quote a SQL identifier.
///
/// Wraps the identifier in double quotes and doubles any embedded double
/// quotes.
///
/// # Examples
/// ```
/// use tsync_core::naming::quote_ident;
/// assert_eq!(quote_ident("CMDNorth"), r#""CMDNorth""#);
/// assert_eq!(quote_ident(r#"odd"name"#), r#""odd""name""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a potentially schema-qualified name (e.g. `dbo.HistoricalData`).
///
/// # Examples
/// ```
/// use tsync_core::naming::quote_qualified;
/// assert_eq!(quote_qualified("dbo.HistoricalData"), r#""dbo"."HistoricalData""#);
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Escape a value for use inside a single-quoted SQL string literal.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Destination column name for a registry column label.
///
/// # Examples
/// ```
/// use tsync_core::naming::column_name;
/// assert_eq!(column_name(" Unit 1 Power "), "Unit_1_Power");
/// ```
pub fn column_name(label: &str) -> String {
    label.trim().replace(' ', "_")
}

/// Wide table name for a group label: the prefix followed by the label with
/// spaces replaced by underscores.
///
/// # Examples
/// ```
/// use tsync_core::naming::wide_table_name;
/// assert_eq!(wide_table_name("CMD", "North Plant"), "CMDNorth_Plant");
/// assert_eq!(wide_table_name("", "G1"), "G1");
/// ```
pub fn wide_table_name(prefix: &str, label: &str) -> String {
    format!("{}{}", prefix, column_name(label))
}
