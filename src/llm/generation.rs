//! SQL generation call.
//!
//! The first model invocation: the user's question plus a schema-grounded
//! system prompt go in, and a strict JSON object naming a database, an
//! action kind, and a single-line SQL statement comes back. Anything that
//! deviates from the contract — invalid JSON, unknown fields, an action
//! outside the enum, empty strings — is a generation failure and the turn
//! aborts with no SQL executed.

use crate::error::{ChatDbError, ChatResult};
use crate::llm::client::{ChatBackend, ChatMessage};
use serde::{Deserialize, Serialize};

/// What kind of statement the model decided to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Query,
    Modification,
    SchemaExplore,
}

impl Action {
    /// Whether this action writes data and therefore needs confirmation
    /// and a transaction.
    pub fn is_modification(&self) -> bool {
        matches!(self, Self::Modification)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Modification => write!(f, "modification"),
            Self::SchemaExplore => write!(f, "schema_explore"),
        }
    }
}

/// The validated result of a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationPlan {
    pub database: String,
    pub action: Action,
    pub sql: String,
}

/// Build the two-message generation exchange.
///
/// Pure function of the question, the registered database names, and the
/// current schema description.
pub fn build_generation_prompt(
    question: &str,
    databases: &[String],
    schema: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        r#"You are a SQL assistant. When a user asks a natural language question, you must:
1. Decide which of the following databases to use:
{databases:?}
2. Write a valid SQL statement for that database based on the schema below:

{schema}

Respond with a JSON object of exactly this shape:
{{
  "database": "one of the database names above",
  "action": "query" | "modification" | "schema_explore",
  "sql": "your SQL statement here"
}}

- Use "query" for SELECT statements
- Use "modification" for INSERT, UPDATE and DELETE
- Use "schema_explore" for questions about tables or columns
- Only use columns listed in the schema; never invent columns, and never use a column from a non-corresponding table
- Always write the SQL as a single-line string
Do not return any results. Only provide the JSON object, with no other text.
"#
    );

    vec![ChatMessage::system(system), ChatMessage::user(question)]
}

/// Parse and validate a raw generation response.
pub fn parse_generation_response(raw: &str) -> ChatResult<GenerationPlan> {
    let plan: GenerationPlan = serde_json::from_str(raw.trim())
        .map_err(|e| ChatDbError::generation(format!("{} (response: {})", e, raw.trim())))?;

    if plan.database.trim().is_empty() {
        return Err(ChatDbError::generation("empty database name"));
    }
    if plan.sql.trim().is_empty() {
        return Err(ChatDbError::generation("empty sql statement"));
    }

    Ok(plan)
}

/// Run the generation call end to end.
pub async fn generate<B: ChatBackend + Sync>(
    backend: &B,
    question: &str,
    databases: &[String],
    schema: &str,
) -> ChatResult<GenerationPlan> {
    let messages = build_generation_prompt(question, databases, schema);
    let raw = backend.complete(&messages).await?;
    parse_generation_response(&raw)
}
