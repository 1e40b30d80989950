use async_trait::async_trait;
use chrono::Local;
use pgview_core::connection_manager::{BackendError, ConnectionBackend};
use pgview_core::profiles::{ConnectionProfile, PasswordSource, TlsMode};
use pgview_core::query_runner::TabularResult;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgConnectOptions, PgRow, PgSslMode};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{Decimal, Uuid};
use sqlx::{
    Column, Connection, Decode, Executor, PgConnection, Postgres, Row, Type, TypeInfo, ValueRef,
};
use tracing::{debug, info};

const APPLICATION_NAME: &str = "pgview";
const PASSWORD_ENV_VAR: &str = "PGVIEW_DB_PASSWORD";
const NULL_TEXT: &str = "NULL";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MONEY_SCALE: u32 = 2;
const MICROS_PER_SECOND: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnectionBackend;

#[async_trait]
impl ConnectionBackend for PostgresConnectionBackend {
    type Connection = PgConnection;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Self::Connection, BackendError> {
        let mut connection = PgConnection::connect_with(&connect_options(profile))
            .await
            .map_err(to_backend_error)?;

        if profile.read_only {
            (&mut connection)
                .execute(sqlx::raw_sql(
                    "SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY",
                ))
                .await
                .map_err(to_backend_error)?;
            info!(profile = %profile.name, "session set to read-only");
        }
        Ok(connection)
    }

    async fn is_closed(&self, connection: &mut Self::Connection) -> bool {
        connection.ping().await.is_err()
    }

    async fn run(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, BackendError> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *connection)
            .await
            .map_err(to_backend_error)?;

        let Some(first) = rows.first() else {
            // No rows still carries column names for the grid header.
            let describe = (&mut *connection).describe(sql).await.map_err(to_backend_error)?;
            let columns = describe
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();
            return Ok(TabularResult::new(columns, Vec::new()));
        };

        let columns = first
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect::<Vec<_>>();
        let rows = rows
            .iter()
            .map(|row| (0..columns.len()).map(|index| cell_to_text(row, index)).collect())
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), columns = columns.len(), "fetched rows");
        Ok(TabularResult::new(columns, rows))
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        connection.close().await.map_err(to_backend_error)
    }
}

fn connect_options(profile: &ConnectionProfile) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&profile.host)
        .port(profile.port)
        .username(&profile.user)
        .ssl_mode(ssl_mode(profile.tls_mode))
        .application_name(APPLICATION_NAME);

    if let Some(database) = non_empty(profile.database.as_deref()) {
        options = options.database(database);
    }
    if let Some(password) = resolve_password(profile, |key| std::env::var(key).ok()) {
        options = options.password(&password);
    }
    if let Some(ca_cert_path) = non_empty(profile.tls_ca_cert_path.as_deref()) {
        options = options.ssl_root_cert(ca_cert_path);
    }
    options
}

fn ssl_mode(mode: TlsMode) -> PgSslMode {
    match mode {
        TlsMode::Disabled => PgSslMode::Disable,
        TlsMode::Prefer => PgSslMode::Prefer,
        TlsMode::Require => PgSslMode::Require,
        TlsMode::VerifyCa => PgSslMode::VerifyCa,
        TlsMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Inline password first (environment and demo profiles), then the profile's password source.
fn resolve_password(
    profile: &ConnectionProfile,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(password) = profile.password.clone().filter(|pw| !pw.is_empty()) {
        return Some(password);
    }

    let env_password = lookup_env(PASSWORD_ENV_VAR).filter(|pw| !pw.is_empty());
    match profile.password_source {
        PasswordSource::EnvVar => env_password,
        PasswordSource::Keyring => {
            if let Some(password) = load_keyring_password(profile) {
                return Some(password);
            }

            if let Some(password) = env_password {
                store_keyring_password(profile, &password);
                return Some(password);
            }

            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn load_keyring_password(profile: &ConnectionProfile) -> Option<String> {
    let entry = keyring_entry(profile)?;
    entry.get_password().ok().filter(|pw| !pw.is_empty())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn load_keyring_password(_profile: &ConnectionProfile) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn store_keyring_password(profile: &ConnectionProfile, password: &str) {
    if password.is_empty() {
        return;
    }
    if let Some(entry) = keyring_entry(profile) {
        let _ = entry.set_password(password);
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn store_keyring_password(_profile: &ConnectionProfile, _password: &str) {}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn keyring_entry(profile: &ConnectionProfile) -> Option<keyring::Entry> {
    let service = non_empty(profile.keyring_service.as_deref()).unwrap_or(APPLICATION_NAME);
    let account = non_empty(profile.keyring_account.as_deref()).unwrap_or(profile.name.as_str());
    keyring::Entry::new(service, account).ok()
}

/// Renders one cell as display text, decoding by the column's Postgres type name.
fn cell_to_text(row: &PgRow, index: usize) -> String {
    let is_null = row.try_get_raw(index).map_or(true, |value| value.is_null());
    if is_null {
        return NULL_TEXT.to_string();
    }

    let type_name = row.column(index).type_info().name().to_string();
    decode_typed(row, index, &type_name).unwrap_or_else(|| raw_text(row, index, &type_name))
}

fn decode_typed(row: &PgRow, index: usize, type_name: &str) -> Option<String> {
    let text = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).ok()?.to_string(),
        "INT2" => row.try_get::<i16, _>(index).ok()?.to_string(),
        "INT4" => row.try_get::<i32, _>(index).ok()?.to_string(),
        "INT8" => row.try_get::<i64, _>(index).ok()?.to_string(),
        "FLOAT4" => row.try_get::<f32, _>(index).ok()?.to_string(),
        "FLOAT8" => row.try_get::<f64, _>(index).ok()?.to_string(),
        "NUMERIC" => row.try_get::<Decimal, _>(index).ok()?.to_string(),
        "OID" => row.try_get::<Oid, _>(index).ok()?.0.to_string(),
        "MONEY" => format_money(row.try_get::<PgMoney, _>(index).ok()?),
        "\"CHAR\"" => format_char(row.try_get::<i8, _>(index).ok()?),
        "DATE" => row.try_get::<NaiveDate, _>(index).ok()?.to_string(),
        "TIME" => row.try_get::<NaiveTime, _>(index).ok()?.to_string(),
        "TIMESTAMP" => format_timestamp(row.try_get::<NaiveDateTime, _>(index).ok()?),
        "TIMESTAMPTZ" => format_timestamptz(row.try_get::<DateTime<Utc>, _>(index).ok()?),
        "INTERVAL" => format_interval(&row.try_get::<PgInterval, _>(index).ok()?),
        "INET" | "CIDR" => format_network(row.try_get::<IpNetwork, _>(index).ok()?, type_name),
        "UUID" => row.try_get::<Uuid, _>(index).ok()?.to_string(),
        "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(index).ok()?.to_string(),
        "BYTEA" => format_bytea(&row.try_get::<Vec<u8>, _>(index).ok()?),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" | "CHAR[]" => array_text::<String>(row, index)?,
        "BOOL[]" => array_text::<bool>(row, index)?,
        "INT2[]" => array_text::<i16>(row, index)?,
        "INT4[]" => array_text::<i32>(row, index)?,
        "INT8[]" => array_text::<i64>(row, index)?,
        "FLOAT4[]" => array_text::<f32>(row, index)?,
        "FLOAT8[]" => array_text::<f64>(row, index)?,
        "NUMERIC[]" => array_text::<Decimal>(row, index)?,
        "UUID[]" => array_text::<Uuid>(row, index)?,
        "DATE[]" => array_text::<NaiveDate>(row, index)?,
        "TIMESTAMP[]" => {
            let items = row.try_get::<Vec<Option<NaiveDateTime>>, _>(index).ok()?;
            let items = items
                .into_iter()
                .map(|item| item.map(format_timestamp))
                .collect::<Vec<_>>();
            format_array(&items)
        }
        "TIMESTAMPTZ[]" => {
            let items = row.try_get::<Vec<Option<DateTime<Utc>>>, _>(index).ok()?;
            let items = items
                .into_iter()
                .map(|item| item.map(format_timestamptz))
                .collect::<Vec<_>>();
            format_array(&items)
        }
        _ => row.try_get::<String, _>(index).ok()?,
    };
    Some(text)
}

fn array_text<'r, T>(row: &'r PgRow, index: usize) -> Option<String>
where
    T: ToString,
    Vec<Option<T>>: Decode<'r, Postgres> + Type<Postgres>,
{
    let items = row.try_get::<Vec<Option<T>>, _>(index).ok()?;
    Some(format_array(&items))
}

/// Fallback for enums, domains and other types whose binary form is their text.
/// Anything else shows as `<typename>` rather than raw wire bytes.
fn raw_text(row: &PgRow, index: usize, type_name: &str) -> String {
    row.try_get_unchecked::<Vec<u8>, _>(index)
        .ok()
        .and_then(printable_text)
        .unwrap_or_else(|| format!("<{}>", type_name.to_lowercase()))
}

fn printable_text(bytes: Vec<u8>) -> Option<String> {
    let text = String::from_utf8(bytes).ok()?;
    let has_control = text.chars().any(|character| {
        character.is_control() && !matches!(character, '\n' | '\r' | '\t')
    });
    (!has_control).then_some(text)
}

fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn format_timestamptz(value: DateTime<Utc>) -> String {
    format_timestamp(value.with_timezone(&Local).naive_local())
}

fn format_money(value: PgMoney) -> String {
    value.to_decimal(MONEY_SCALE).to_string()
}

fn format_char(value: i8) -> String {
    char::from(u8::from_ne_bytes(value.to_ne_bytes())).to_string()
}

/// `1 year 2 mons 3 days 04:05:06`, the way the server prints intervals.
fn format_interval(interval: &PgInterval) -> String {
    let plural = |value: i32, unit: &str| {
        let suffix = if value == 1 { "" } else { "s" };
        format!("{value} {unit}{suffix}")
    };

    let mut parts = Vec::new();
    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        parts.push(plural(years, "year"));
    }
    if months != 0 {
        parts.push(plural(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(plural(interval.days, "day"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let seconds = micros / MICROS_PER_SECOND;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        let fraction = micros % MICROS_PER_SECOND;
        if fraction != 0 {
            clock.push('.');
            clock.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// Host addresses drop the full-length prefix like psql does; networks keep it.
fn format_network(network: IpNetwork, type_name: &str) -> String {
    let full_prefix = if network.is_ipv4() { 32 } else { 128 };
    if type_name == "INET" && network.prefix() == full_prefix {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}

fn format_bytea(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(2 + bytes.len() * 2);
    text.push_str("\\x");
    for byte in bytes {
        text.push_str(&format!("{byte:02x}"));
    }
    text
}

/// Array literal text: `{1,NULL,"a b"}`.
fn format_array<T: ToString>(items: &[Option<T>]) -> String {
    let joined = items
        .iter()
        .map(|item| {
            item.as_ref().map_or_else(
                || NULL_TEXT.to_string(),
                |value| array_element(&value.to_string()),
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{joined}}}")
}

fn array_element(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.eq_ignore_ascii_case(NULL_TEXT)
        || value.chars().any(|character| {
            matches!(character, '{' | '}' | ',' | '"' | '\\') || character.is_whitespace()
        });
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Database errors surface the server message alone, the way psql prints them.
fn to_backend_error(error: sqlx::Error) -> BackendError {
    match error.as_database_error() {
        Some(database_error) => BackendError::new(database_error.message()),
        None => BackendError::new(error.to_string()),
    }
}
