//! Error taxonomy shared by the cleaning, loading, and view layers.
//!
//! File-level failures surface as [`PipelineError`] wrapped in an
//! `anyhow::Error`, so callers can `downcast_ref::<PipelineError>()` to branch on
//! the kind. Row-level coercion gaps and undersized view inputs are not errors:
//! see [`crate::coerce::CoercionGap`] and [`crate::views::ViewOutcome`].

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::FieldKind;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("malformed input {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("column '{column}' declared by the schema is missing from the table")]
    MissingColumn { column: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is {actual} but {expected} is required")]
    FieldKindMismatch {
        field: String,
        expected: FieldKind,
        actual: FieldKind,
    },

    #[error("invalid filter '{spec}': {reason}")]
    InvalidFilter { spec: String, reason: String },

    #[error("unsupported database url '{url}' (only sqlite targets are supported)")]
    UnsupportedDatabase { url: String },
}

impl PipelineError {
    pub(crate) fn malformed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        PipelineError::MalformedInput {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: &std::path::Path) -> Self {
        PipelineError::InputNotFound {
            path: path.to_path_buf(),
        }
    }
}
