//! Output formatting for raw result display.
//!
//! Renders row sets as aligned ASCII tables (like the MySQL CLI) for the
//! `show_raw` display path, and provides the scalar formatting shared with
//! schema-description sample rows.

use crate::db::executor::RowSet;
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Format a single decoded value for display.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Render a row set as an aligned ASCII table.
///
/// Row sets without column names (e.g. the modification marker) render as
/// one plain line per row instead.
pub fn format_rows_table(rows: &RowSet) -> String {
    if rows.is_empty() {
        return "Empty set".to_string();
    }

    if rows.columns.is_empty() {
        return rows
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.width()).collect();
    for row in &rows.rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(format_value(value).width());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = rows
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {:^width$} ", col, width = w))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in &rows.rows {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(value, w)| {
                let formatted = format_value(value);
                if matches!(value, JsonValue::Number(_)) {
                    format!("| {:>width$} ", formatted, width = w)
                } else {
                    format!("| {:<width$} ", formatted, width = w)
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!("{} {} in set\n", rows.len(), row_text));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&JsonValue::Null), "NULL");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!("text")), "text");
        assert_eq!(format_value(&json!(true)), "true");
        assert_eq!(format_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_empty_rowset_renders_empty_set() {
        assert_eq!(format_rows_table(&RowSet::empty()), "Empty set");
    }

    #[test]
    fn test_table_rendering_aligns_columns() {
        let rows = RowSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![json!(1), json!("Alice")],
                vec![json!(2), json!("Bob")],
            ],
        };
        let table = format_rows_table(&rows);
        assert!(table.contains("| id |"));
        assert!(table.contains("Alice"));
        assert!(table.contains("2 rows in set"));
    }

    #[test]
    fn test_columnless_rows_render_plain() {
        let marker = RowSet::modification_marker();
        assert_eq!(format_rows_table(&marker), "Modification successful.");
    }
}
