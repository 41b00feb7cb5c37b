//! Result summarization call.
//!
//! The second model invocation: the executed rows go back to the model,
//! grounded by the schema description, and a natural-language summary
//! comes out. Empty results short-circuit to a fixed string without
//! calling the model at all, and at most [`MAX_SUMMARY_ROWS`] rows are
//! ever sent — larger result sets get a truncation note instead.

use crate::db::executor::RowSet;
use crate::error::ChatResult;
use crate::llm::client::{ChatBackend, ChatMessage};
use crate::render::format_value;

/// Cap on rows included in the summarization prompt.
pub const MAX_SUMMARY_ROWS: usize = 25;

/// Fixed reply for zero-row results; produced without a model call.
pub const EMPTY_RESULT_SUMMARY: &str = "No results found.";

/// Render a row set into the text block sent to the model.
///
/// With column names available each row becomes `column=value` pairs; the
/// columnless form (e.g. the modification marker) becomes raw value lists.
/// Result sets longer than [`MAX_SUMMARY_ROWS`] end with a note stating
/// how many of how many rows are shown.
pub fn format_result_text(rows: &RowSet) -> String {
    let visible = &rows.rows[..rows.len().min(MAX_SUMMARY_ROWS)];

    let mut text = String::new();
    if rows.columns.is_empty() {
        for row in visible {
            let values: Vec<String> = row.iter().map(format_value).collect();
            text.push_str(&values.join(", "));
            text.push('\n');
        }
    } else {
        text.push_str(&rows.columns.join(", "));
        text.push('\n');
        for row in visible {
            let pairs: Vec<String> = rows
                .columns
                .iter()
                .zip(row)
                .map(|(col, value)| format!("{}={}", col, format_value(value)))
                .collect();
            text.push_str(&pairs.join(", "));
            text.push('\n');
        }
    }

    if rows.len() > MAX_SUMMARY_ROWS {
        text.push_str(&format!(
            "\n...Only the first {} of {} rows are shown.\n",
            MAX_SUMMARY_ROWS,
            rows.len()
        ));
    }

    text
}

/// Build the two-message summarization exchange.
pub fn build_summary_prompt(question: &str, rows: &RowSet, schema: &str) -> Vec<ChatMessage> {
    let shown = rows.len().min(MAX_SUMMARY_ROWS);
    let result_text = format_result_text(rows);

    let user = format!(
        "The user asked: {question}\n\n\
         Here are the first {shown} rows of the result:\n{result_text}\n\
         Here is the current schema:\n{schema}\n\n\
         Display a table with the results and briefly summarize based on what is shown, \
         and note that the total number of rows is {total}.",
        total = rows.len()
    );

    vec![
        ChatMessage::system(
            "You are a helpful assistant that explains SQL query results. \
             Always respect the column names and respond in a way that reflects \
             the actual data. Use the schema as reference.",
        ),
        ChatMessage::user(user),
    ]
}

/// Summarize a result set for the user.
///
/// Zero-row results return [`EMPTY_RESULT_SUMMARY`] without invoking the
/// backend. A backend failure propagates to the caller, which decides the
/// degradation policy.
pub async fn summarize<B: ChatBackend + Sync>(
    backend: &B,
    question: &str,
    rows: &RowSet,
    schema: &str,
) -> ChatResult<String> {
    if rows.is_empty() {
        return Ok(EMPTY_RESULT_SUMMARY.to_string());
    }

    let messages = build_summary_prompt(question, rows, schema);
    let reply = backend.complete(&messages).await?;
    Ok(reply.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rowset(n: usize) -> RowSet {
        RowSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: (0..n)
                .map(|i| vec![json!(i), json!(format!("row{}", i))])
                .collect(),
        }
    }

    #[test]
    fn test_format_uses_column_value_pairs() {
        let text = format_result_text(&rowset(2));
        assert!(text.starts_with("id, name\n"));
        assert!(text.contains("id=0, name=row0"));
        assert!(text.contains("id=1, name=row1"));
    }

    #[test]
    fn test_format_columnless_rows_as_value_lists() {
        let marker = RowSet::modification_marker();
        let text = format_result_text(&marker);
        assert_eq!(text, "Modification successful.\n");
    }

    #[test]
    fn test_no_truncation_note_at_or_below_cap() {
        let text = format_result_text(&rowset(MAX_SUMMARY_ROWS));
        assert!(!text.contains("are shown"));
    }

    #[test]
    fn test_truncation_note_above_cap() {
        let text = format_result_text(&rowset(40));
        assert!(text.contains("...Only the first 25 of 40 rows are shown."));
        // Only the capped rows appear
        assert!(text.contains("id=24"));
        assert!(!text.contains("id=25,"));
    }

    #[test]
    fn test_prompt_includes_question_schema_and_total() {
        let messages = build_summary_prompt("who is there?", &rowset(3), "THE SCHEMA");
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("who is there?"));
        assert!(messages[1].content.contains("THE SCHEMA"));
        assert!(messages[1].content.contains("the total number of rows is 3"));
    }

    struct PanickingBackend;

    #[async_trait::async_trait]
    impl ChatBackend for PanickingBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> ChatResult<String> {
            panic!("summarizer must not call the model for empty results");
        }
    }

    #[tokio::test]
    async fn test_empty_rows_short_circuit_without_model_call() {
        let summary = summarize(&PanickingBackend, "anything", &RowSet::empty(), "schema")
            .await
            .unwrap();
        assert_eq!(summary, "No results found.");
    }
}
