//! PostgreSQL target writer.
//!
//! The writer owns a deadpool-postgres pool. Every table copy checks out its
//! own [`PgSession`], which drives explicit `BEGIN`/`COMMIT`/`ROLLBACK` and
//! caches prepared statements by parameter types.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Config as PgConfig, Statement};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::PostgresDialect;
use crate::config::{ConnectionConfig, PG_DEFAULT_PORT};
use crate::core::timeout::with_timeout;
use crate::core::traits::{Dialect, TargetSession, TargetWriter};
use crate::core::value::{SqlNullType, SqlValue};
use crate::drivers::{SslMode, TlsBuilder};
use crate::error::{MigrateError, Result};

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    endpoint: String,
    schema: String,
    timeout: Duration,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Connect to the target and verify the connection with `SELECT 1`.
    pub async fn new(
        config: &ConnectionConfig,
        schema: &str,
        max_conns: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let port = config.port_or(PG_DEFAULT_PORT);
        let endpoint = format!("postgres://{}:{}/{}", config.host, port, config.database);

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(timeout);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let tls = TlsBuilder::new(SslMode::parse(&config.ssl_mode)?).build()?;
        let mgr = match tls {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };
        let pool = Pool::builder(mgr)
            .max_size(max_conns.max(1))
            .build()
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        with_timeout(timeout, "testing PostgreSQL target connection", async {
            let client = pool
                .get()
                .await
                .map_err(|e| MigrateError::connection(&endpoint, e))?;
            client
                .simple_query("SELECT 1")
                .await
                .map_err(|e| MigrateError::connection(&endpoint, e))
        })
        .await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, port, config.database
        );

        Ok(Self {
            pool,
            endpoint,
            schema: schema.to_string(),
            timeout,
            dialect: PostgresDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn session(&self) -> Result<Box<dyn TargetSession>> {
        let client = with_timeout(self.timeout, "acquiring PostgreSQL session", async {
            self.pool
                .get()
                .await
                .map_err(|e| MigrateError::connection(&self.endpoint, e))
        })
        .await?;

        Ok(Box::new(PgSession {
            client,
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
            statements: HashMap::new(),
        }))
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// One pooled connection with explicit transaction control.
struct PgSession {
    client: Object,
    endpoint: String,
    timeout: Duration,
    statements: HashMap<(String, Vec<Type>), Statement>,
}

impl PgSession {
    async fn run_simple(&self, sql: &str) -> Result<()> {
        with_timeout(self.timeout, sql, async {
            self.client
                .batch_execute(sql)
                .await
                .map_err(|e| classify(&self.endpoint, sql, e))
        })
        .await
    }

    /// Prepared statement for `sql`, cached by SQL text and parameter types.
    async fn prepare(&mut self, sql: &str, types: Vec<Type>) -> Result<Statement> {
        let key = (sql.to_string(), types);
        if let Some(statement) = self.statements.get(&key).cloned() {
            return Ok(statement);
        }

        let statement = with_timeout(self.timeout, sql, async {
            self.client
                .prepare_typed(sql, &key.1)
                .await
                .map_err(|e| classify(&self.endpoint, sql, e))
        })
        .await?;

        debug!("Prepared statement: {}", sql);
        self.statements.insert(key, statement.clone());
        Ok(statement)
    }
}

#[async_trait]
impl TargetSession for PgSession {
    async fn begin(&mut self) -> Result<()> {
        self.run_simple("BEGIN").await
    }

    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        if params.is_empty() {
            return with_timeout(self.timeout, statement, async {
                self.client
                    .execute(statement, &[])
                    .await
                    .map_err(|e| classify(&self.endpoint, statement, e))
            })
            .await;
        }

        let types = params.iter().map(|v| pg_type(v.null_type())).collect();
        let prepared = self.prepare(statement, types).await?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(as_param).collect();

        with_timeout(self.timeout, statement, async {
            self.client
                .execute(&prepared, &refs)
                .await
                .map_err(|e| classify(&self.endpoint, statement, e))
        })
        .await
    }

    async fn commit(&mut self) -> Result<()> {
        self.run_simple("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run_simple("ROLLBACK").await
    }
}

/// PostgreSQL parameter type for a value type.
fn pg_type(t: SqlNullType) -> Type {
    match t {
        SqlNullType::Bool => Type::BOOL,
        SqlNullType::I16 => Type::INT2,
        SqlNullType::I32 => Type::INT4,
        SqlNullType::I64 => Type::INT8,
        SqlNullType::F32 => Type::FLOAT4,
        SqlNullType::F64 => Type::FLOAT8,
        SqlNullType::String => Type::TEXT,
        SqlNullType::Bytes => Type::BYTEA,
        SqlNullType::Uuid => Type::UUID,
        SqlNullType::Decimal => Type::NUMERIC,
        SqlNullType::DateTime => Type::TIMESTAMP,
        SqlNullType::Date => Type::DATE,
        SqlNullType::Time => Type::TIME,
    }
}

fn as_param(value: &SqlValue) -> &(dyn ToSql + Sync) {
    match value {
        SqlValue::Null(t) => null_param(*t),
        SqlValue::Bool(v) => v,
        SqlValue::I16(v) => v,
        SqlValue::I32(v) => v,
        SqlValue::I64(v) => v,
        SqlValue::F32(v) => v,
        SqlValue::F64(v) => v,
        SqlValue::Text(v) => v,
        SqlValue::Bytes(v) => v,
        SqlValue::Uuid(v) => v,
        SqlValue::Decimal(v) => v,
        SqlValue::DateTime(v) => v,
        SqlValue::Date(v) => v,
        SqlValue::Time(v) => v,
    }
}

/// Typed NULL so the bound parameter matches the prepared type.
fn null_param(t: SqlNullType) -> &'static (dyn ToSql + Sync) {
    match t {
        SqlNullType::Bool => &None::<bool>,
        SqlNullType::I16 => &None::<i16>,
        SqlNullType::I32 => &None::<i32>,
        SqlNullType::I64 => &None::<i64>,
        SqlNullType::F32 => &None::<f32>,
        SqlNullType::F64 => &None::<f64>,
        SqlNullType::String => &None::<&str>,
        SqlNullType::Bytes => &None::<&[u8]>,
        SqlNullType::Uuid => &None::<Uuid>,
        SqlNullType::Decimal => &None::<Decimal>,
        SqlNullType::DateTime => &None::<NaiveDateTime>,
        SqlNullType::Date => &None::<NaiveDate>,
        SqlNullType::Time => &None::<NaiveTime>,
    }
}

/// Map a tokio-postgres error onto the engine's error kinds.
///
/// - `42P07` duplicate_table → [`MigrateError::DuplicateTable`]
/// - class `23` integrity violations → [`MigrateError::ConstraintViolation`]
/// - class `08`, shutdown codes, closed or broken sockets → [`MigrateError::Connection`]
/// - everything else → [`MigrateError::Query`]
fn classify(endpoint: &str, context: &str, err: tokio_postgres::Error) -> MigrateError {
    if let Some(db) = err.as_db_error() {
        let code = db.code();
        if *code == SqlState::DUPLICATE_TABLE {
            let name = quoted_name(db.message()).unwrap_or(db.message());
            return MigrateError::DuplicateTable(name.to_string());
        }
        if code.code().starts_with("23") {
            return MigrateError::ConstraintViolation {
                table: db.table().unwrap_or_default().to_string(),
                message: db.message().to_string(),
            };
        }
        if is_connection_state(code) {
            return MigrateError::connection(endpoint, db.message());
        }
        return MigrateError::query(context, db.message());
    }

    let io_failure = std::error::Error::source(&err)
        .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
    if err.is_closed() || io_failure {
        return MigrateError::connection(endpoint, err);
    }
    MigrateError::query(context, err)
}

fn is_connection_state(code: &SqlState) -> bool {
    code.code().starts_with("08")
        || *code == SqlState::ADMIN_SHUTDOWN
        || *code == SqlState::CRASH_SHUTDOWN
        || *code == SqlState::CANNOT_CONNECT_NOW
}

/// First double-quoted name in a server message: `relation "users" already exists` → `users`.
fn quoted_name(message: &str) -> Option<&str> {
    let start = message.find('"')? + 1;
    let len = message[start..].find('"')?;
    Some(&message[start..start + len])
}
