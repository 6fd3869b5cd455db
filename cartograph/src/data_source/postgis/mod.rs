//! `spatial-db` backend: tables and views of a PostgreSQL database with the PostGIS extension.
//!
//! Required configuration keys: `PG_HOST` (or `PG_HOST_ADDR`), `PG_PORT`, `PG_USER`,
//! `PG_PASSWORD`, `PG_DB_NAME` and `PG_CONNECT_TIMEOUT` (seconds, `0` to wait indefinitely).
//! Optional: `PG_SSL_MODE` (`disable`, `prefer`, `require`, ...) and `PG_FETCH_SIZE`, the number
//! of rows fetched from the server at once.
//!
//! Datasets are named `schema.table`. The connection runs in a single read-only transaction,
//! and every cursor reads through its own server-side SQL cursor, so tables of any size are
//! never loaded whole.
//!
//! The backend drives its connection on a private single-threaded `tokio` runtime. It must
//! not be used from within an asynchronous task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Executor, Row};
use tokio::runtime::Runtime;

use crate::config::ConnectionConfig;
use crate::data_source::backend::{Backend, ColumnDescriptor, PropertyType, RecordReader};
use crate::data_source::registry::BackendFactory;
use crate::error::CartographError;

mod options;
mod reader;

use options::PgOptions;
use reader::PgCursorReader;

/// Type tag of the backend.
pub const SPATIAL_DB: &str = "spatial-db";

/// PostGIS bookkeeping tables and views that are not listed as datasets.
const POSTGIS_METADATA: [&str; 5] = [
    "spatial_ref_sys",
    "geometry_columns",
    "geography_columns",
    "raster_columns",
    "raster_overviews",
];

const LIST_TABLES: &str = "
    SELECT table_schema::text, table_name::text
    FROM information_schema.tables
    WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
      AND table_schema NOT LIKE 'pg\\_%'
    ORDER BY table_schema, table_name";

const LIST_COLUMNS: &str = "
    SELECT column_name::text, udt_name::text
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position";

/// Factory of the `spatial-db` backend.
#[derive(Debug, Default, Copy, Clone)]
pub struct PostgisFactory;

impl BackendFactory for PostgisFactory {
    fn tag(&self) -> &str {
        SPATIAL_DB
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Backend>, CartographError> {
        let options = PgOptions::from_config(config)?;
        Ok(Box::new(PostgisBackend::connect(options)?))
    }
}

fn connection_failed(reason: impl std::fmt::Display) -> CartographError {
    CartographError::ConnectionFailed {
        backend: SPATIAL_DB.to_owned(),
        reason: reason.to_string(),
    }
}

fn read_failed(target: &str, reason: impl std::fmt::Display) -> CartographError {
    CartographError::ReadFailed {
        backend: SPATIAL_DB.to_owned(),
        target: target.to_owned(),
        reason: reason.to_string(),
    }
}

/// Connection shared by the backend and all of its readers.
struct PgSession {
    runtime: Runtime,
    connection: Mutex<Option<PgConnection>>,
    cursor_seq: AtomicU64,
}

impl PgSession {
    /// Runs `f` with the connection. `target` names the dataset (or database) in errors.
    fn with_connection<T>(
        &self,
        target: &str,
        f: impl FnOnce(&Runtime, &mut PgConnection) -> Result<T, sqlx::Error>,
    ) -> Result<T, CartographError> {
        let mut connection = self.connection.lock();
        let connection = connection
            .as_mut()
            .ok_or_else(|| CartographError::SourceClosed {
                backend: SPATIAL_DB.to_owned(),
            })?;

        f(&self.runtime, connection).map_err(|err| read_failed(target, err))
    }

    /// Executes a statement with the simple query protocol.
    fn execute(&self, target: &str, sql: &str) -> Result<(), CartographError> {
        self.with_connection(target, |runtime, connection| {
            runtime.block_on(connection.execute(sql)).map(|_| ())
        })
    }

    /// Runs a query with the simple query protocol. All values come back as text.
    fn fetch_all(&self, target: &str, sql: &str) -> Result<Vec<PgRow>, CartographError> {
        self.with_connection(target, |runtime, connection| {
            runtime.block_on(connection.fetch_all(sql))
        })
    }

    fn next_cursor_name(&self) -> String {
        format!(
            "cartograph_cursor_{}",
            self.cursor_seq.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn close(&self) {
        if let Some(connection) = self.connection.lock().take() {
            if let Err(err) = self.runtime.block_on(connection.close()) {
                log::warn!("Failed to close PostgreSQL connection cleanly: {err}");
            }
        }
    }
}

#[derive(Debug, Clone)]
struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    fn dataset_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    fn quoted(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.table))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn property_type(udt_name: &str) -> PropertyType {
    match udt_name {
        "int2" | "int4" | "int8" => PropertyType::Integer,
        "float4" | "float8" | "numeric" => PropertyType::Real,
        "text" | "varchar" | "bpchar" | "name" | "char" => PropertyType::String,
        "geometry" | "geography" => PropertyType::Geometry,
        _ => PropertyType::Other,
    }
}

/// Open `spatial-db` connection.
pub struct PostgisBackend {
    session: Arc<PgSession>,
    database: String,
    fetch_size: usize,
    tables: Vec<TableName>,
}

impl std::fmt::Debug for PostgisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgisBackend")
            .field("database", &self.database)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

impl PostgisBackend {
    fn connect(options: PgOptions) -> Result<Self, CartographError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(connection_failed)?;

        let mut connection = runtime.block_on(async {
            let connecting = PgConnection::connect_with(&options.connect);
            match options.connect_timeout {
                Some(timeout) => tokio::time::timeout(timeout, connecting)
                    .await
                    .map_err(|_| {
                        connection_failed(format!(
                            "no answer from the server within {} s",
                            timeout.as_secs()
                        ))
                    })
                    .and_then(|connected| connected.map_err(connection_failed)),
                None => connecting.await.map_err(connection_failed),
            }
        })?;

        runtime
            .block_on(connection.execute("BEGIN TRANSACTION READ ONLY"))
            .map_err(connection_failed)?;

        log::info!("Connected to PostgreSQL database '{}'", options.database);

        Ok(Self {
            session: Arc::new(PgSession {
                runtime,
                connection: Mutex::new(Some(connection)),
                cursor_seq: AtomicU64::new(0),
            }),
            database: options.database,
            fetch_size: options.fetch_size,
            tables: vec![],
        })
    }

    fn columns(&self, table: &TableName) -> Result<Vec<ColumnDescriptor>, CartographError> {
        let rows = self
            .session
            .with_connection(&table.dataset_name(), |runtime, connection| {
                runtime.block_on(
                    sqlx::query(LIST_COLUMNS)
                        .bind(table.schema.as_str())
                        .bind(table.table.as_str())
                        .fetch_all(connection),
                )
            })?;

        rows.iter()
            .map(|row| -> Result<ColumnDescriptor, sqlx::Error> {
                let name: String = row.try_get(0)?;
                let udt_name: String = row.try_get(1)?;
                Ok(ColumnDescriptor::new(name, property_type(&udt_name)))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|err| read_failed(&table.dataset_name(), err))
    }
}

impl Backend for PostgisBackend {
    fn dataset_names(&mut self) -> Result<Vec<String>, CartographError> {
        let rows = self
            .session
            .with_connection(&self.database, |runtime, connection| {
                runtime.block_on(sqlx::query(LIST_TABLES).fetch_all(connection))
            })?;

        let tables = rows
            .iter()
            .map(|row| -> Result<TableName, sqlx::Error> {
                Ok(TableName {
                    schema: row.try_get(0)?,
                    table: row.try_get(1)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|err| read_failed(&self.database, err))?;

        self.tables = tables
            .into_iter()
            .filter(|t| !POSTGIS_METADATA.contains(&t.table.as_str()))
            .collect();

        Ok(self.tables.iter().map(TableName::dataset_name).collect())
    }

    fn open_reader(&mut self, dataset: &str) -> Result<Box<dyn RecordReader>, CartographError> {
        let table = self
            .tables
            .iter()
            .find(|t| t.dataset_name() == dataset)
            .cloned()
            .ok_or_else(|| CartographError::DatasetNotFound {
                backend: SPATIAL_DB.to_owned(),
                dataset: dataset.to_owned(),
            })?;

        let columns = self.columns(&table)?;
        let select = reader::select_statement(&table.quoted(), &columns);

        Ok(Box::new(PgCursorReader::new(
            self.session.clone(),
            dataset.to_owned(),
            columns,
            select,
            self.fetch_size,
        )))
    }

    fn close(&mut self) {
        self.session.close();
        log::info!("Closed PostgreSQL connection to '{}'", self.database);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn udt_names() {
        assert_eq!(property_type("int8"), PropertyType::Integer);
        assert_eq!(property_type("numeric"), PropertyType::Real);
        assert_eq!(property_type("varchar"), PropertyType::String);
        assert_eq!(property_type("geography"), PropertyType::Geometry);
        assert_eq!(property_type("timestamptz"), PropertyType::Other);
    }

    #[test]
    fn identifiers_are_quoted() {
        let table = TableName {
            schema: "public".into(),
            table: "odd\"name".into(),
        };
        assert_eq!(table.dataset_name(), "public.odd\"name");
        assert_eq!(table.quoted(), "\"public\".\"odd\"\"name\"");
    }

    #[test]
    fn missing_configuration() {
        let err = PostgisFactory
            .connect(&ConnectionConfig::from([("PG_HOST", "localhost")]))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }

    #[test]
    fn unreachable_server() {
        let config = ConnectionConfig::from([
            ("PG_HOST", "127.0.0.1"),
            ("PG_PORT", "1"),
            ("PG_USER", "nobody"),
            ("PG_PASSWORD", "nothing"),
            ("PG_DB_NAME", "none"),
            ("PG_CONNECT_TIMEOUT", "2"),
            ("PG_SSL_MODE", "disable"),
        ]);
        let err = PostgisFactory.connect(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }
}
