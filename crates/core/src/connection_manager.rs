use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::catalog::{CatalogSource, TableRef};
use crate::profiles::ConnectionProfile;
use crate::query_runner::{QueryBackend, QueryBackendError, TabularResult};
use crate::sql_generator::{list_all_tables_sql, list_schemas_sql, list_tables_sql};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ConnectionBackend: Send + Sync {
    type Connection: Send;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Self::Connection, BackendError>;
    async fn is_closed(&self, connection: &mut Self::Connection) -> bool;
    async fn run(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, BackendError>;
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub profile_name: String,
    pub database: Option<String>,
    pub is_connected: bool,
    pub last_latency: Option<Duration>,
    pub connected_at: Option<SystemTime>,
}

#[derive(Debug, Error)]
pub enum ConnectionManagerError {
    #[error("profile `{profile}` needs a host and a database name")]
    IncompleteProfile { profile: String },
    #[error("failed to establish database connection: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug)]
struct Inner<C> {
    profile: ConnectionProfile,
    active: Option<C>,
    last_latency: Option<Duration>,
    connected_at: Option<SystemTime>,
}

/// Single guarded connection. Every execution holds the lock for its whole round trip,
/// reconnecting first when the connection is missing or closed.
#[derive(Debug)]
pub struct ConnectionManager<B: ConnectionBackend> {
    backend: B,
    inner: Mutex<Inner<B::Connection>>,
}

impl<B: ConnectionBackend> ConnectionManager<B> {
    #[must_use]
    pub fn new(backend: B, profile: ConnectionProfile) -> Self {
        Self {
            backend,
            inner: Mutex::new(Inner {
                profile,
                active: None,
                last_latency: None,
                connected_at: None,
            }),
        }
    }

    /// Connects if needed. Failures are logged and reported as `false`.
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(_) => true,
            Err(err) => {
                error!(error = %err, "connection failed");
                false
            }
        }
    }

    pub async fn try_connect(&self) -> Result<Duration, ConnectionManagerError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await
    }

    /// Swaps the profile; the current connection is closed and the next use reconnects.
    pub async fn update_profile(&self, profile: ConnectionProfile) {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner).await;
        inner.profile = profile;
    }

    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner).await;
    }

    pub async fn profile(&self) -> ConnectionProfile {
        self.inner.lock().await.profile.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        let inner = self.inner.lock().await;
        ConnectionStatus {
            profile_name: inner.profile.name.clone(),
            database: inner.profile.database.clone(),
            is_connected: inner.active.is_some(),
            last_latency: inner.last_latency,
            connected_at: inner.connected_at,
        }
    }

    async fn ensure_connected(
        &self,
        inner: &mut Inner<B::Connection>,
    ) -> Result<Duration, ConnectionManagerError> {
        if let Some(active) = inner.active.as_mut() {
            if !self.backend.is_closed(active).await {
                return Ok(inner.last_latency.unwrap_or_default());
            }
            warn!("connection closed; reconnecting");
            inner.active = None;
        }

        if !inner.profile.is_complete() {
            return Err(ConnectionManagerError::IncompleteProfile {
                profile: inner.profile.name.clone(),
            });
        }

        let started_at = Instant::now();
        let connection = self
            .backend
            .connect(&inner.profile)
            .await
            .map_err(ConnectionManagerError::Backend)?;
        let latency = started_at.elapsed();

        info!(
            profile = %inner.profile.name,
            database = inner.profile.database.as_deref().unwrap_or_default(),
            latency = ?latency,
            "connected"
        );
        inner.active = Some(connection);
        inner.last_latency = Some(latency);
        inner.connected_at = Some(SystemTime::now());
        Ok(latency)
    }

    async fn close_locked(&self, inner: &mut Inner<B::Connection>) {
        let Some(connection) = inner.active.take() else {
            return;
        };
        match self.backend.disconnect(connection).await {
            Ok(()) => info!("database connection closed"),
            Err(err) => error!(error = %err, "error closing connection"),
        }
        inner.last_latency = None;
        inner.connected_at = None;
    }

    async fn column_values(&self, sql: &str, columns: usize) -> Vec<Vec<String>> {
        match self.execute(sql).await {
            Ok(result) => result
                .rows
                .into_iter()
                .filter(|row| row.len() >= columns)
                .collect(),
            Err(err) => {
                error!(error = %err, "catalog query failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<B: ConnectionBackend> QueryBackend for ConnectionManager<B> {
    async fn execute(&self, sql: &str) -> Result<TabularResult, QueryBackendError> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner)
            .await
            .map_err(|err| QueryBackendError::new(err.to_string()))?;

        let Some(connection) = inner.active.as_mut() else {
            return Err(QueryBackendError::new(
                "failed to establish database connection",
            ));
        };
        self.backend
            .run(connection, sql)
            .await
            .map_err(|err| QueryBackendError::new(err.to_string()))
    }
}

#[async_trait]
impl<B: ConnectionBackend> CatalogSource for ConnectionManager<B> {
    async fn list_schemas(&self) -> Vec<String> {
        self.column_values(&list_schemas_sql(), 1)
            .await
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect()
    }

    async fn list_tables(&self, schema: &str) -> Vec<String> {
        self.column_values(&list_tables_sql(schema), 1)
            .await
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect()
    }

    async fn list_all_tables(&self) -> Vec<TableRef> {
        self.column_values(&list_all_tables_sql(), 2)
            .await
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                Some(TableRef::new(values.next()?, values.next()?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use super::{BackendError, ConnectionBackend, ConnectionManager, ConnectionManagerError};
    use crate::catalog::{CatalogSource, TableRef};
    use crate::profiles::ConnectionProfile;
    use crate::query_runner::{QueryBackend, TabularResult};

    #[derive(Debug, Default)]
    struct FakeBackend {
        connect_calls: AtomicUsize,
        disconnect_calls: AtomicUsize,
        fail_connect: AtomicUsize,
        fail_run: AtomicBool,
        drop_connection: Arc<AtomicBool>,
    }

    #[derive(Debug)]
    struct FakeConnection {
        closed: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ConnectionBackend for FakeBackend {
        type Connection = FakeConnection;

        async fn connect(
            &self,
            _profile: &ConnectionProfile,
        ) -> Result<Self::Connection, BackendError> {
            if self.fail_connect.load(Ordering::Relaxed) > 0 {
                self.fail_connect.fetch_sub(1, Ordering::Relaxed);
                return Err(BackendError::new("connect failed"));
            }
            self.connect_calls.fetch_add(1, Ordering::Relaxed);
            self.drop_connection.store(false, Ordering::Relaxed);
            Ok(FakeConnection {
                closed: Arc::clone(&self.drop_connection),
            })
        }

        async fn is_closed(&self, connection: &mut Self::Connection) -> bool {
            connection.closed.load(Ordering::Relaxed)
        }

        async fn run(
            &self,
            _connection: &mut Self::Connection,
            sql: &str,
        ) -> Result<TabularResult, BackendError> {
            if self.fail_run.load(Ordering::Relaxed) {
                return Err(BackendError::new("syntax error at or near \"SELEC\""));
            }
            if sql.contains("table_schema, table_name") {
                return Ok(TabularResult::new(
                    vec!["table_schema".to_string(), "table_name".to_string()],
                    vec![
                        vec!["app".to_string(), "orders".to_string()],
                        vec!["public".to_string(), "users".to_string()],
                    ],
                ));
            }
            if sql.contains("DISTINCT table_schema") {
                return Ok(TabularResult::new(
                    vec!["table_schema".to_string()],
                    vec![vec!["app".to_string()], vec!["public".to_string()]],
                ));
            }
            Ok(TabularResult::new(
                vec!["?column?".to_string()],
                vec![vec![sql.to_string()]],
            ))
        }

        async fn disconnect(&self, _connection: Self::Connection) -> Result<(), BackendError> {
            self.disconnect_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn sample_profile() -> ConnectionProfile {
        let mut profile = ConnectionProfile::new("local", "127.0.0.1", "postgres");
        profile.database = Some("app".to_string());
        profile
    }

    #[tokio::test]
    async fn connect_updates_status() {
        let manager = ConnectionManager::new(FakeBackend::default(), sample_profile());

        assert!(manager.connect().await);
        let status = manager.status().await;
        assert!(status.is_connected);
        assert_eq!(status.profile_name, "local");
        assert_eq!(status.database.as_deref(), Some("app"));
        assert!(status.connected_at.is_some());
    }

    #[tokio::test]
    async fn connect_is_reused_while_open() {
        let manager = ConnectionManager::new(FakeBackend::default(), sample_profile());
        assert!(manager.connect().await);
        assert!(manager.connect().await);
        manager.execute("SELECT 1;").await.expect("query should run");

        assert_eq!(manager.backend.connect_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn incomplete_profile_refuses_to_connect() {
        let profile = ConnectionProfile::new("bare", "localhost", "postgres");
        let manager = ConnectionManager::new(FakeBackend::default(), profile);

        assert!(!manager.connect().await);
        let err = manager
            .try_connect()
            .await
            .expect_err("profile without database should fail");
        assert!(matches!(err, ConnectionManagerError::IncompleteProfile { .. }));
        assert_eq!(manager.backend.connect_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn execute_reconnects_when_connection_was_closed() {
        let manager = ConnectionManager::new(FakeBackend::default(), sample_profile());
        assert!(manager.connect().await);
        manager.backend.drop_connection.store(true, Ordering::Relaxed);

        let result = manager
            .execute("SELECT now();")
            .await
            .expect("query should reconnect and run");
        assert_eq!(result.rows, vec![vec!["SELECT now();".to_string()]]);
        assert_eq!(manager.backend.connect_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn execute_reports_connect_and_query_failures() {
        let backend = FakeBackend {
            fail_connect: AtomicUsize::new(1),
            ..FakeBackend::default()
        };
        let manager = ConnectionManager::new(backend, sample_profile());

        let err = manager
            .execute("SELECT 1;")
            .await
            .expect_err("first attempt should fail to connect");
        assert!(err.to_string().contains("connect failed"));

        manager.backend.fail_run.store(true, Ordering::Relaxed);
        let err = manager
            .execute("SELEC 1;")
            .await
            .expect_err("query should fail");
        assert_eq!(err.message(), "syntax error at or near \"SELEC\"");
    }

    #[tokio::test]
    async fn update_profile_closes_active_connection() {
        let manager = ConnectionManager::new(FakeBackend::default(), sample_profile());
        assert!(manager.connect().await);

        manager.update_profile(ConnectionProfile::demo()).await;
        let status = manager.status().await;
        assert!(!status.is_connected);
        assert_eq!(status.profile_name, "demo");
        assert_eq!(manager.backend.disconnect_calls.load(Ordering::Relaxed), 1);

        manager.close().await;
        assert_eq!(manager.backend.disconnect_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn catalog_listing_parses_rows_and_swallows_failures() {
        let manager = ConnectionManager::new(FakeBackend::default(), sample_profile());

        assert_eq!(
            manager.list_schemas().await,
            vec!["app".to_string(), "public".to_string()]
        );
        assert_eq!(
            manager.list_all_tables().await,
            vec![TableRef::new("app", "orders"), TableRef::new("public", "users")]
        );

        manager.backend.fail_run.store(true, Ordering::Relaxed);
        assert!(manager.list_tables("public").await.is_empty());
    }
}
