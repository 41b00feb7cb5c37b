//! Error types for the ChatDB assistant.
//!
//! This module defines all error types using `thiserror`. Every failure in
//! the question pipeline is converted into one of these variants at the
//! boundary where it occurs and surfaced to the user as a message; nothing
//! is silently swallowed and nothing past a failure proceeds as if it had
//! succeeded.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatDbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Unknown database: {database}")]
    UnknownDatabase { database: String },

    #[error("Model call failed: {message}")]
    Completion { message: String },

    #[error("Could not interpret the model response: {message}")]
    Generation { message: String },

    #[error("SQL execution error: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Summarization failed: {message}")]
    Summarization { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatDbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an unknown-database error.
    pub fn unknown_database(database: impl Into<String>) -> Self {
        Self::UnknownDatabase {
            database: database.into(),
        }
    }

    /// Create a model-call error.
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
        }
    }

    /// Create a generation-contract error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a summarization error.
    pub fn summarization(message: impl Into<String>) -> Self {
        Self::Summarization {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check whether this error aborts the turn before any SQL ran.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::Completion { .. } | Self::Generation { .. } | Self::UnknownDatabase { .. }
        )
    }
}

/// Convert sqlx errors into execution-layer errors.
impl From<sqlx::Error> for ChatDbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => ChatDbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ChatDbError::execution(db_err.message().to_string(), code)
            }
            sqlx::Error::RowNotFound => {
                ChatDbError::execution("No rows returned".to_string(), None)
            }
            sqlx::Error::PoolTimedOut => ChatDbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                ChatDbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => ChatDbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => ChatDbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => ChatDbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                ChatDbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                ChatDbError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => ChatDbError::internal("Database worker crashed"),
            _ => ChatDbError::execution(err.to_string(), None),
        }
    }
}

/// Model-endpoint transport failures map onto the completion variant.
impl From<reqwest::Error> for ChatDbError {
    fn from(err: reqwest::Error) -> Self {
        ChatDbError::completion(err.to_string())
    }
}

/// Result type alias for assistant operations.
pub type ChatResult<T> = Result<T, ChatDbError>;
