use pgview_adapters::postgres::PostgresConnectionBackend;
use pgview_core::catalog::{CatalogSource, TableRef};
use pgview_core::connection_manager::ConnectionManager;
use pgview_core::filter::{Filter, FilterOperator};
use pgview_core::profiles::{ConnectionProfile, TlsMode};
use pgview_core::query_runner::QueryBackend;
use pgview_core::sorting::{SortCriterion, SortDirection};
use pgview_core::sql_generator::{count_sql, windowed_select_sql, SqlTarget};

const SCHEMA: &str = "pgview_adapters_cov";

fn postgres_integration_enabled() -> bool {
    matches!(
        std::env::var("PGVIEW_RUN_PG_INTEGRATION").ok().as_deref(),
        Some("1")
    )
}

fn integration_profile() -> ConnectionProfile {
    let host = std::env::var("PGVIEW_TEST_DB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let user = std::env::var("PGVIEW_TEST_DB_USER").unwrap_or_else(|_| "postgres".to_string());
    let port = std::env::var("PGVIEW_TEST_DB_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(5432);

    let mut profile = ConnectionProfile::new("adapters-integration", host, user);
    profile.port = port;
    profile.tls_mode = TlsMode::Disabled;
    profile.database = Some(
        std::env::var("PGVIEW_TEST_DB_NAME").unwrap_or_else(|_| "postgres".to_string()),
    );
    profile.password = std::env::var("PGVIEW_TEST_DB_PASSWORD").ok();
    profile
}

async fn execute_sql(manager: &ConnectionManager<PostgresConnectionBackend>, sql: &str) {
    manager.execute(sql).await.expect("statement should succeed");
}

#[tokio::test(flavor = "current_thread")]
async fn postgres_backend_catalog_and_query_paths() {
    if !postgres_integration_enabled() {
        return;
    }

    let manager = ConnectionManager::new(PostgresConnectionBackend, integration_profile());
    assert!(manager.connect().await, "connect should succeed");

    execute_sql(&manager, &format!("DROP SCHEMA IF EXISTS {SCHEMA} CASCADE")).await;
    execute_sql(&manager, &format!("CREATE SCHEMA {SCHEMA}")).await;
    execute_sql(
        &manager,
        &format!(
            "CREATE TABLE {SCHEMA}.integration_users (\
             id BIGINT PRIMARY KEY,\
             email TEXT NOT NULL,\
             age INT NULL,\
             profile JSONB NULL,\
             created_at TIMESTAMP NOT NULL DEFAULT '2024-01-02 03:04:05')"
        ),
    )
    .await;
    execute_sql(
        &manager,
        &format!(
            "INSERT INTO {SCHEMA}.integration_users (id, email, age, profile) VALUES \
             (1, 'a@example.com', 22, '{{\"tier\": \"gold\"}}'), \
             (2, 'b@example.com', NULL, NULL), \
             (3, 'c@example.com', 40, NULL)"
        ),
    )
    .await;

    let schemas = manager.list_schemas().await;
    assert!(schemas.iter().any(|schema| schema == SCHEMA));
    assert_eq!(
        manager.list_tables(SCHEMA).await,
        vec!["integration_users".to_string()]
    );
    assert!(manager
        .list_all_tables()
        .await
        .contains(&TableRef::new(SCHEMA, "integration_users")));

    let target = SqlTarget::new(SCHEMA, "integration_users").expect("valid target");
    let filters = vec![Filter::new(0, "email", FilterOperator::ILike, "example")];
    let sorting = vec![SortCriterion::new("id", SortDirection::Desc)];
    let result = manager
        .execute(&windowed_select_sql(&target, &filters, &sorting, 2))
        .await
        .expect("windowed query should succeed");

    assert_eq!(
        result.columns,
        ["row", "id", "email", "age", "profile", "created_at"].map(String::from)
    );
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0][0], "1");
    assert_eq!(result.rows[0][1], "3");
    assert_eq!(result.rows[1][3], "NULL");
    assert_eq!(result.rows[1][5], "2024-01-02 03:04:05");

    let json_row = manager
        .execute(&format!(
            "SELECT profile FROM {SCHEMA}.integration_users WHERE id = 1"
        ))
        .await
        .expect("json query should succeed");
    assert_eq!(json_row.rows[0][0], "{\"tier\":\"gold\"}");

    let wire_types = manager
        .execute(
            "SELECT '1 day 02:00:00'::interval, 42::oid, '10.1.2.3'::inet, \
             ARRAY[true, NULL]::bool[], 'x'::\"char\"",
        )
        .await
        .expect("wire type query should succeed");
    assert_eq!(
        wire_types.rows[0],
        ["1 day 02:00:00", "42", "10.1.2.3", "{true,NULL}", "x"].map(String::from)
    );

    let null_filter = vec![Filter::new(1, "age", FilterOperator::Equal, "NULL")];
    let count = manager
        .execute(&count_sql(&target, &null_filter))
        .await
        .expect("count should succeed");
    assert_eq!(count.rows, vec![vec!["1".to_string()]]);

    let empty = manager
        .execute(&format!(
            "SELECT id, email FROM {SCHEMA}.integration_users WHERE false"
        ))
        .await
        .expect("empty query should succeed");
    assert_eq!(empty.columns, ["id", "email"].map(String::from));
    assert!(empty.rows.is_empty());

    let failure = manager
        .execute("SELECT * FROM pgview_missing_relation")
        .await
        .expect_err("missing relation should fail");
    assert!(failure.message().contains("pgview_missing_relation"));

    execute_sql(&manager, &format!("DROP SCHEMA IF EXISTS {SCHEMA} CASCADE")).await;
    manager.close().await;
}
