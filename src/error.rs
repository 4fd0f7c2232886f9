use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = std::result::Result<T, TesterError>;

#[derive(Debug, thiserror::Error)]
pub enum TesterError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File operation failed on {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dashboard error: {0}")]
    Dashboard(String),

    #[error("Store {op} failed (run: {run_id:?}, db: {path:?}): {source}")]
    Store {
        op: &'static str,
        run_id: Option<i64>,
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store is closed (attempted {op})")]
    StoreClosed { op: &'static str },

    #[error("Stored coverage snapshot for run {run_id} is unreadable: {source}")]
    CorruptRecord {
        run_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Test run not found: {0}")]
    RunNotFound(String),
}

impl TesterError {
    /// Short machine-readable kind, used as the `error` field of JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TesterError::Validation(_) => "ValidationError",
            TesterError::File { .. } => "FileError",
            TesterError::Dashboard(_) => "DashboardError",
            TesterError::Store { .. }
            | TesterError::StoreClosed { .. }
            | TesterError::CorruptRecord { .. } => "StoreError",
            TesterError::Template(_) => "TemplateError",
            TesterError::RunNotFound(_) => "NotFound",
        }
    }

    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TesterError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<tera::Error> for TesterError {
    fn from(e: tera::Error) -> Self {
        // tera nests the useful message one level down
        let detail = std::error::Error::source(&e)
            .map(|s| format!("{e}: {s}"))
            .unwrap_or_else(|| e.to_string());
        TesterError::Template(detail)
    }
}

impl IntoResponse for TesterError {
    fn into_response(self) -> Response {
        let status = match &self {
            TesterError::RunNotFound(_) => StatusCode::NOT_FOUND,
            TesterError::Validation(_) => StatusCode::BAD_REQUEST,
            TesterError::File { .. }
            | TesterError::Dashboard(_)
            | TesterError::Store { .. }
            | TesterError::StoreClosed { .. }
            | TesterError::CorruptRecord { .. }
            | TesterError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
