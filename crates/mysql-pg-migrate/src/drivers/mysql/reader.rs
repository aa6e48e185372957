//! MySQL/MariaDB source reader.
//!
//! Uses an sqlx pool. Metadata comes from INFORMATION_SCHEMA of the connected
//! database; rows are streamed with a plain `SELECT` in declared column order.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Row, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::MysqlDialect;
use crate::config::{ConnectionConfig, MYSQL_DEFAULT_PORT};
use crate::core::schema::ColumnDescriptor;
use crate::core::timeout::with_timeout;
use crate::core::traits::{Dialect, SourceReader};
use crate::core::value::{Batch, Row as ValueRow, SqlNullType, SqlValue};
use crate::drivers::SslMode;
use crate::error::{MigrateError, Result};

/// Batches buffered between the reader task and the copier.
const CHANNEL_DEPTH: usize = 4;

/// MySQL/MariaDB source reader.
pub struct MysqlReader {
    pool: MySqlPool,
    endpoint: String,
    timeout: Duration,
    dialect: MysqlDialect,
}

impl MysqlReader {
    /// Connect to the source and verify the connection with `SELECT 1`.
    pub async fn new(config: &ConnectionConfig, max_conns: usize, timeout: Duration) -> Result<Self> {
        let port = config.port_or(MYSQL_DEFAULT_PORT);
        let endpoint = format!("mysql://{}:{}/{}", config.host, port, config.database);
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode.to_mysql());

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        with_timeout(timeout, "testing MySQL source connection", async {
            sqlx::query("SELECT 1")
                .fetch_one(&pool)
                .await
                .map_err(|e| MigrateError::connection(&endpoint, e))
        })
        .await?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, port, config.database
        );

        Ok(Self {
            pool,
            endpoint,
            timeout,
            dialect: MysqlDialect::new(),
        })
    }

    async fn stream_table(
        pool: MySqlPool,
        endpoint: String,
        timeout: Duration,
        sql: String,
        columns: Vec<ColumnDescriptor>,
        batch_size: usize,
        tx: mpsc::Sender<Result<Batch>>,
    ) -> Result<()> {
        let operation = format!("reading rows: {}", sql);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut batch = Vec::with_capacity(batch_size);

        loop {
            let next = with_timeout(timeout, operation.as_str(), async {
                rows.try_next()
                    .await
                    .map_err(|e| classify(&endpoint, "reading MySQL rows", e))
            })
            .await?;

            let Some(row) = next else { break };
            match decode_row(&row, &columns) {
                Ok(values) => batch.push(values),
                Err(e) => {
                    // Flush first so the error lands in read order.
                    let done = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    if !done.is_empty() && tx.send(Ok(Batch::new(done))).await.is_err() {
                        return Ok(());
                    }
                    if tx.send(Err(e)).await.is_err() {
                        return Ok(());
                    }
                    continue;
                }
            }

            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if tx.send(Ok(Batch::new(full))).await.is_err() {
                    // Receiver dropped
                    return Ok(());
                }
            }
        }

        if !batch.is_empty() {
            let _ = tx.send(Ok(Batch::new(batch))).await;
        }
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        // CAST to CHAR: some servers report information_schema names as VARBINARY
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = with_timeout(self.timeout, "listing MySQL tables", async {
            sqlx::query(query)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| classify(&self.endpoint, "listing MySQL tables", e))
        })
        .await?;

        let tables = rows
            .iter()
            .map(|row| {
                row.try_get::<String, _>("TABLE_NAME")
                    .map_err(|e| MigrateError::query("listing MySQL tables", e))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Found {} base tables in MySQL source", tables.len());
        Ok(tables)
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR(1024)) AS COLUMN_TYPE,
                CAST(ORDINAL_POSITION AS UNSIGNED) AS ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let context = format!("describing MySQL table {}", table);
        let rows: Vec<MySqlRow> = with_timeout(self.timeout, context.as_str(), async {
            sqlx::query(query)
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| classify(&self.endpoint, &context, e))
        })
        .await?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get("COLUMN_NAME")
                    .map_err(|e| MigrateError::query(context.as_str(), e))?;
                let type_signature: String = row
                    .try_get("COLUMN_TYPE")
                    .map_err(|e| MigrateError::query(context.as_str(), e))?;
                let ordinal: u64 = row
                    .try_get("ORDINAL_POSITION")
                    .map_err(|e| MigrateError::query(context.as_str(), e))?;
                Ok(ColumnDescriptor::new(name, type_signature, ordinal as u32))
            })
            .collect()
    }

    fn read_rows(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        batch_size: usize,
    ) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let sql = self.dialect.build_select_all("", table, columns);
        let pool = self.pool.clone();
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout;
        let columns = columns.to_vec();
        let batch_size = batch_size.max(1);

        tokio::spawn(async move {
            let result = Self::stream_table(
                pool,
                endpoint,
                timeout,
                sql,
                columns,
                batch_size,
                tx.clone(),
            )
            .await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Split sqlx errors into connection-level (fatal) and query-level failures.
fn classify(endpoint: &str, context: &str, err: sqlx::Error) -> MigrateError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            MigrateError::connection(endpoint, format!("{}: {}", context, err))
        }
        other => MigrateError::query(context, other),
    }
}

fn decode_row(row: &MySqlRow, columns: &[ColumnDescriptor]) -> Result<ValueRow> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, col))
        .collect()
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize, col: &ColumnDescriptor) -> Result<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<T, _>(idx).map_err(|e| MigrateError::Decode {
        column: col.name.clone(),
        message: e.to_string(),
    })
}

/// Decode one column by its MySQL base type.
///
/// Unsigned integers widen to the next signed type so no value is lost;
/// `bigint unsigned` has no wider integer and becomes a decimal.
fn decode_value(row: &MySqlRow, idx: usize, col: &ColumnDescriptor) -> Result<SqlValue> {
    let base = col.base_type();
    let unsigned = col.is_unsigned();

    let is_null = row
        .try_get_raw(idx)
        .map(|v| v.is_null())
        .map_err(|e| MigrateError::Decode {
            column: col.name.clone(),
            message: e.to_string(),
        })?;
    if is_null {
        return Ok(SqlValue::Null(null_type_for(&base, unsigned)));
    }

    let value = match (base.as_str(), unsigned) {
        ("tinyint", false) => SqlValue::I16(get::<i8>(row, idx, col)? as i16),
        ("tinyint", true) => SqlValue::I16(get::<u8>(row, idx, col)? as i16),
        ("smallint", false) => SqlValue::I16(get(row, idx, col)?),
        ("smallint", true) => SqlValue::I32(get::<u16>(row, idx, col)? as i32),
        ("mediumint" | "int" | "integer", false) => SqlValue::I32(get(row, idx, col)?),
        ("mediumint" | "int" | "integer", true) => SqlValue::I64(get::<u32>(row, idx, col)? as i64),
        ("bigint", false) => SqlValue::I64(get(row, idx, col)?),
        ("bigint", true) => SqlValue::Decimal(Decimal::from(get::<u64>(row, idx, col)?)),
        ("year", _) => SqlValue::I32(get::<u16>(row, idx, col)? as i32),
        ("bit", _) => SqlValue::I64(get::<u64>(row, idx, col)? as i64),

        ("float", _) => SqlValue::F32(get(row, idx, col)?),
        ("double" | "real", _) => SqlValue::F64(get(row, idx, col)?),
        ("decimal" | "numeric", _) => SqlValue::Decimal(get(row, idx, col)?),

        ("binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob", _) => {
            SqlValue::Bytes(get(row, idx, col)?)
        }

        ("date", _) => SqlValue::Date(get(row, idx, col)?),
        ("time", _) => SqlValue::Time(get(row, idx, col)?),
        ("datetime" | "timestamp", _) => SqlValue::DateTime(get(row, idx, col)?),

        // char, varchar, text types, enum, set, json and anything unknown
        _ => decode_text(row, idx, col)?,
    };
    Ok(value)
}

/// Text-like values. Falls back to raw bytes for columns sqlx reports as binary.
fn decode_text(row: &MySqlRow, idx: usize, col: &ColumnDescriptor) -> Result<SqlValue> {
    if let Ok(s) = row.try_get::<String, _>(idx) {
        return Ok(SqlValue::Text(s));
    }
    let bytes: Vec<u8> = get(row, idx, col)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => SqlValue::Text(s),
        Err(e) => SqlValue::Bytes(e.into_bytes()),
    })
}

fn null_type_for(base: &str, unsigned: bool) -> SqlNullType {
    match (base, unsigned) {
        ("tinyint", _) | ("smallint", false) => SqlNullType::I16,
        ("smallint", true) | ("mediumint" | "int" | "integer", false) | ("year", _) => {
            SqlNullType::I32
        }
        ("mediumint" | "int" | "integer", true) | ("bigint", false) | ("bit", _) => SqlNullType::I64,
        ("bigint", true) | ("decimal" | "numeric", _) => SqlNullType::Decimal,
        ("float", _) => SqlNullType::F32,
        ("double" | "real", _) => SqlNullType::F64,
        ("binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob", _) => {
            SqlNullType::Bytes
        }
        ("date", _) => SqlNullType::Date,
        ("time", _) => SqlNullType::Time,
        ("datetime" | "timestamp", _) => SqlNullType::DateTime,
        _ => SqlNullType::String,
    }
}
