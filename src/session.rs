//! Session state and the per-question pipeline.
//!
//! A [`Session`] owns everything one assistant instance needs — the
//! connection registry, the schema cache, display settings, and the
//! completion backend — so multiple independent sessions can coexist in
//! one process and tests can drive the whole pipeline without globals.
//!
//! [`Session::run_turn`] is the request/response core: one call per user
//! question, returning a structured [`TurnOutcome`]. Front ends supply a
//! [`TurnHooks`] implementation for the two interactive touch points (SQL
//! echo, modification confirmation) and render the outcome however they
//! like.

use crate::db::classify::is_structural_change;
use crate::db::executor::{RowSet, SqlExecutor};
use crate::db::registry::ConnectionRegistry;
use crate::error::ChatDbError;
use crate::llm::client::ChatBackend;
use crate::llm::generation::{GenerationPlan, generate};
use crate::llm::summary::summarize;
use crate::schema::SchemaCache;
use std::time::Duration;
use tracing::{info, warn};

/// Per-session display settings, mutated only via the settings menu.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    /// Echo the generated SQL before executing it.
    pub show_sql: bool,
    /// Print raw rows in addition to the summary.
    pub show_raw: bool,
    /// Suppress raw row display unconditionally.
    pub summary_only: bool,
}

/// Front-end touch points invoked mid-turn.
pub trait TurnHooks {
    /// Called once generation succeeds, before anything executes.
    fn on_plan(&mut self, _plan: &GenerationPlan) {}

    /// Gate for modification actions. Only a `true` return executes the
    /// statement; the default denies.
    fn confirm_modification(&mut self, _sql: &str) -> bool {
        false
    }
}

/// Hooks that auto-approve modifications; useful for non-interactive
/// embedders that apply their own gating.
pub struct ApproveAll;

impl TurnHooks for ApproveAll {
    fn confirm_modification(&mut self, _sql: &str) -> bool {
        true
    }
}

/// The summary half of a completed turn.
#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Ready(String),
    /// The summarization call failed; front ends degrade to raw rows.
    Unavailable(String),
}

/// Structured result of one question turn.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The generation call failed or broke the response contract. No SQL
    /// was executed.
    NotUnderstood { reason: String },
    /// The user declined a modification. Zero statements were executed.
    Canceled { plan: GenerationPlan },
    /// Execution failed. The structural-change check has still been
    /// evaluated against the attempted SQL.
    Failed {
        plan: GenerationPlan,
        message: String,
        schema_refreshed: bool,
    },
    /// Execution succeeded and the rows were summarized.
    Answered {
        plan: GenerationPlan,
        rows: RowSet,
        summary: SummaryOutcome,
        schema_refreshed: bool,
    },
}

/// One assistant instance: registry + cache + settings + backend.
pub struct Session<B: ChatBackend> {
    registry: ConnectionRegistry,
    executor: SqlExecutor,
    cache: SchemaCache,
    backend: B,
    pub settings: Settings,
}

impl<B: ChatBackend + Sync> Session<B> {
    /// Create a session over an already-connected registry.
    pub fn new(registry: ConnectionRegistry, backend: B) -> Self {
        Self {
            registry,
            executor: SqlExecutor::new(),
            cache: SchemaCache::new(),
            backend,
            settings: Settings::default(),
        }
    }

    /// Override the SQL execution timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.executor = SqlExecutor::with_timeout(timeout);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current schema description, rebuilding the cache if needed.
    pub async fn schema_description(&mut self, force_refresh: bool) -> String {
        self.cache.description(&self.registry, force_refresh).await
    }

    /// Drop the cached schema description.
    pub fn invalidate_schema(&mut self) {
        self.cache.invalidate();
    }

    /// Close every database pool. Call once at shutdown.
    pub async fn close(&self) {
        self.registry.close_all().await;
    }

    /// Run one question through the full pipeline:
    /// generation → (confirmation gate) → execution → schema-refresh check
    /// → summarization.
    pub async fn run_turn(
        &mut self,
        question: &str,
        hooks: &mut impl TurnHooks,
    ) -> TurnOutcome {
        let schema = self.schema_description(false).await;
        let databases = self.registry.names();

        let plan = match generate(&self.backend, question, &databases, &schema).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Generation failed");
                return TurnOutcome::NotUnderstood {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            database = %plan.database,
            action = %plan.action,
            "Generated statement"
        );
        hooks.on_plan(&plan);

        if plan.action.is_modification() && !hooks.confirm_modification(&plan.sql) {
            info!("Modification declined");
            return TurnOutcome::Canceled { plan };
        }

        let executed = self
            .executor
            .execute(
                &self.registry,
                &plan.database,
                &plan.sql,
                plan.action.is_modification(),
            )
            .await;

        // The attempted SQL text drives cache invalidation whether or not
        // execution succeeded.
        let schema_refreshed = is_structural_change(&plan.sql);
        if schema_refreshed {
            self.schema_description(true).await;
            info!("Schema cache refreshed after structural change");
        }

        let rows = match executed {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Execution failed");
                return TurnOutcome::Failed {
                    plan,
                    message: e.to_string(),
                    schema_refreshed,
                };
            }
        };

        let schema = self.schema_description(false).await;
        let summary = match summarize(&self.backend, question, &rows, &schema).await {
            Ok(text) => SummaryOutcome::Ready(text),
            Err(e) => {
                let e = match e {
                    ChatDbError::Summarization { .. } => e,
                    other => ChatDbError::summarization(other.to_string()),
                };
                warn!(error = %e, "Summarization failed");
                SummaryOutcome::Unavailable(e.to_string())
            }
        };

        TurnOutcome::Answered {
            plan,
            rows,
            summary,
            schema_refreshed,
        }
    }
}
