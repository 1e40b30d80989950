use std::sync::Arc;

use pgview_core::catalog::{CatalogSource, TableRef};
use pgview_core::query_runner::{QueryBackend, QueryResponse, QueryRunner};
use pgview_core::session::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Results handed back from worker tasks to the UI loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Query(QueryResponse),
    Schemas(Vec<String>),
    Tables {
        schema: String,
        tables: Vec<String>,
        auto_select: bool,
    },
    AllTables(Vec<TableRef>),
}

/// Runs controller commands on the tokio runtime, one task per command.
pub struct Dispatcher<B: QueryBackend> {
    handle: Handle,
    runner: Arc<QueryRunner<Arc<B>>>,
    catalog: Arc<B>,
    sender: UnboundedSender<WorkerEvent>,
}

impl<B> Dispatcher<B>
where
    B: QueryBackend + CatalogSource + 'static,
{
    #[must_use]
    pub fn new(handle: Handle, backend: Arc<B>) -> (Self, UnboundedReceiver<WorkerEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher = Self {
            handle,
            runner: Arc::new(QueryRunner::new(Arc::clone(&backend))),
            catalog: backend,
            sender,
        };
        (dispatcher, receiver)
    }

    pub fn dispatch(&self, command: Command) {
        let sender = self.sender.clone();
        match command {
            Command::Execute(request) => {
                let runner = Arc::clone(&self.runner);
                self.handle.spawn(async move {
                    let response = runner.run(request).await;
                    send(&sender, WorkerEvent::Query(response));
                });
            }
            Command::LoadSchemas => {
                let catalog = Arc::clone(&self.catalog);
                self.handle.spawn(async move {
                    let schemas = catalog.list_schemas().await;
                    debug!(count = schemas.len(), "schemas loaded");
                    send(&sender, WorkerEvent::Schemas(schemas));
                });
            }
            Command::LoadTables {
                schema,
                auto_select,
            } => {
                let catalog = Arc::clone(&self.catalog);
                self.handle.spawn(async move {
                    let tables = catalog.list_tables(&schema).await;
                    debug!(schema = %schema, count = tables.len(), "tables loaded");
                    send(
                        &sender,
                        WorkerEvent::Tables {
                            schema,
                            tables,
                            auto_select,
                        },
                    );
                });
            }
            Command::CacheAllTables => {
                let catalog = Arc::clone(&self.catalog);
                self.handle.spawn(async move {
                    let tables = catalog.list_all_tables().await;
                    send(&sender, WorkerEvent::AllTables(tables));
                });
            }
        }
    }
}

fn send(sender: &UnboundedSender<WorkerEvent>, event: WorkerEvent) {
    if sender.send(event).is_err() {
        warn!("ui loop is gone; dropping worker result");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use pgview_core::catalog::{CatalogSource, TableRef};
    use pgview_core::query_runner::{
        QueryBackend, QueryBackendError, QueryOutcome, QueryRequest, RequestKind, TabularResult,
    };
    use pgview_core::session::Command;

    use super::{Dispatcher, WorkerEvent};

    #[derive(Debug, Default)]
    struct FakeDatabase;

    #[async_trait]
    impl QueryBackend for FakeDatabase {
        async fn execute(&self, sql: &str) -> Result<TabularResult, QueryBackendError> {
            if sql.contains("missing") {
                return Err(QueryBackendError::new("relation \"missing\" does not exist"));
            }
            Ok(TabularResult::new(
                vec!["count".to_string()],
                vec![vec!["3".to_string()]],
            ))
        }
    }

    #[async_trait]
    impl CatalogSource for FakeDatabase {
        async fn list_schemas(&self) -> Vec<String> {
            vec!["public".to_string()]
        }

        async fn list_tables(&self, schema: &str) -> Vec<String> {
            vec![format!("{schema}_table")]
        }

        async fn list_all_tables(&self) -> Vec<TableRef> {
            vec![TableRef::new("public", "users")]
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commands_report_back_over_the_channel() {
        let (dispatcher, mut receiver) =
            Dispatcher::new(tokio::runtime::Handle::current(), Arc::new(FakeDatabase));

        dispatcher.dispatch(Command::LoadTables {
            schema: "app".to_string(),
            auto_select: true,
        });
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("worker should answer in time")
            .expect("channel should stay open");
        assert_eq!(
            event,
            WorkerEvent::Tables {
                schema: "app".to_string(),
                tables: vec!["app_table".to_string()],
                auto_select: true,
            }
        );

        dispatcher.dispatch(Command::Execute(QueryRequest {
            id: 4,
            kind: RequestKind::Count,
            sql: "SELECT count(*) FROM missing;".to_string(),
        }));
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("worker should answer in time")
            .expect("channel should stay open");
        let WorkerEvent::Query(response) = event else {
            panic!("expected a query response, got {event:?}");
        };
        assert_eq!(response.id, 4);
        assert!(matches!(response.outcome, QueryOutcome::Failed { .. }));
    }
}
