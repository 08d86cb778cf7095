//! Unified application error model and mapping helpers.
//! Every pipeline stage reports through `AppError`; the HTTP layer maps each kind
//! to a client (validation/parse) or server (pipeline) status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("schema validation failed: {message}")]
    SchemaValidation { message: String },
    #[error("column '{column}' not found in {table} (available: {available})")]
    ColumnNotFound { column: String, table: String, available: String },
    #[error("join column mismatch between '{left}' ({left_count} keys) and '{right}' ({right_count} keys)")]
    JoinColumnMismatch { left: String, left_count: usize, right: String, right_count: usize },
    #[error("derived column parse error in '{statement}': {message}")]
    DerivedColumnParse { statement: String, message: String },
    #[error("filter expression parse error in '{expression}': {message}")]
    FilterExpressionParse { expression: String, message: String },
    #[error("date format inference failed for column '{column}': {message}")]
    DateFormatInference { column: String, message: String },
    #[error("unsupported source type '{extension}' for '{name}'")]
    UnsupportedSourceType { name: String, extension: String },
    #[error("source not found: {name}")]
    SourceNotFound { name: String },
    #[error("io error: {message}")]
    Io { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::SchemaValidation { .. } => "schema_validation",
            AppError::ColumnNotFound { .. } => "column_not_found",
            AppError::JoinColumnMismatch { .. } => "join_column_mismatch",
            AppError::DerivedColumnParse { .. } => "derived_column_parse",
            AppError::FilterExpressionParse { .. } => "filter_expression_parse",
            AppError::DateFormatInference { .. } => "date_format_inference",
            AppError::UnsupportedSourceType { .. } => "unsupported_source_type",
            AppError::SourceNotFound { .. } => "source_not_found",
            AppError::Io { .. } => "io_error",
            AppError::Internal { .. } => "internal_error",
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self { AppError::SchemaValidation { message: msg.into() } }
    pub fn derived<S: Into<String>, M: Into<String>>(statement: S, msg: M) -> Self { AppError::DerivedColumnParse { statement: statement.into(), message: msg.into() } }
    pub fn filter<S: Into<String>, M: Into<String>>(expression: S, msg: M) -> Self { AppError::FilterExpressionParse { expression: expression.into(), message: msg.into() } }
    pub fn date_format<S: Into<String>, M: Into<String>>(column: S, msg: M) -> Self { AppError::DateFormatInference { column: column.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Build a ColumnNotFound error listing a preview of the columns that do exist.
    pub fn column_not_found(column: &str, table: &str, available: &[String]) -> Self {
        let max_show = 12usize;
        let available = if available.len() > max_show {
            format!("{} ... (+{} more)", available[..max_show].join(", "), available.len() - max_show)
        } else {
            available.join(", ")
        };
        AppError::ColumnNotFound { column: column.to_string(), table: table.to_string(), available }
    }

    /// True for errors caused by the request itself rather than by pipeline execution.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::SchemaValidation { .. }
                | AppError::DerivedColumnParse { .. }
                | AppError::FilterExpressionParse { .. }
                | AppError::JoinColumnMismatch { .. }
                | AppError::UnsupportedSourceType { .. }
                | AppError::SourceNotFound { .. }
        )
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::SchemaValidation { .. }
            | AppError::DerivedColumnParse { .. }
            | AppError::FilterExpressionParse { .. }
            | AppError::JoinColumnMismatch { .. } => 400,
            AppError::SourceNotFound { .. } => 404,
            AppError::UnsupportedSourceType { .. } => 415,
            AppError::ColumnNotFound { .. } | AppError::DateFormatInference { .. } => 422,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<polars::prelude::PolarsError> for AppError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal { message: other.to_string() },
        }
    }
}
