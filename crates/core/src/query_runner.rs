use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub const ERROR_COLUMN: &str = "Error";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|candidate| candidate == column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryBackendError {
    message: String,
}

impl QueryBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of one execution. A failure is kept apart from a genuine one-column result named
/// `Error`, but renders the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Rows(TabularResult),
    Failed { message: String },
}

impl QueryOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn to_grid(&self) -> TabularResult {
        match self {
            Self::Rows(result) => result.clone(),
            Self::Failed { message } => TabularResult::new(
                vec![ERROR_COLUMN.to_string()],
                vec![vec![message.clone()]],
            ),
        }
    }
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<TabularResult, QueryBackendError>;
}

#[async_trait]
impl<T: QueryBackend + ?Sized> QueryBackend for Arc<T> {
    async fn execute(&self, sql: &str) -> Result<TabularResult, QueryBackendError> {
        (**self).execute(sql).await
    }
}

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Grid,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub id: RequestId,
    pub kind: RequestKind,
    pub outcome: QueryOutcome,
    pub elapsed: Duration,
}

/// Latest issued request id per kind; responses carrying an older id are stale.
#[derive(Debug, Clone, Default)]
pub struct RequestGenerations {
    next_id: RequestId,
    latest_grid: Option<RequestId>,
    latest_count: Option<RequestId>,
}

impl RequestGenerations {
    pub fn issue(&mut self, kind: RequestKind) -> RequestId {
        self.next_id += 1;
        let id = self.next_id;
        match kind {
            RequestKind::Grid => self.latest_grid = Some(id),
            RequestKind::Count => self.latest_count = Some(id),
        }
        id
    }

    /// Forgets the latest id of `kind` so any in-flight response is treated as stale.
    pub fn invalidate(&mut self, kind: RequestKind) {
        match kind {
            RequestKind::Grid => self.latest_grid = None,
            RequestKind::Count => self.latest_count = None,
        }
    }

    #[must_use]
    pub fn is_current(&self, kind: RequestKind, id: RequestId) -> bool {
        let latest = match kind {
            RequestKind::Grid => self.latest_grid,
            RequestKind::Count => self.latest_count,
        };
        latest == Some(id)
    }
}

#[derive(Debug)]
pub struct QueryRunner<B: QueryBackend> {
    backend: B,
}

impl<B: QueryBackend> QueryRunner<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executes `request`; backend failures become [`QueryOutcome::Failed`].
    pub async fn run(&self, request: QueryRequest) -> QueryResponse {
        let started_at = Instant::now();
        debug!(id = request.id, kind = ?request.kind, "executing query");

        let outcome = match self.backend.execute(&request.sql).await {
            Ok(result) => QueryOutcome::Rows(result),
            Err(error) => {
                warn!(id = request.id, error = %error, "query failed");
                QueryOutcome::Failed {
                    message: error.to_string(),
                }
            }
        };

        QueryResponse {
            id: request.id,
            kind: request.kind,
            outcome,
            elapsed: started_at.elapsed(),
        }
    }
}
