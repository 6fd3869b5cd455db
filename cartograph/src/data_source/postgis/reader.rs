use std::collections::VecDeque;
use std::sync::Arc;

use cartograph_types::Geometry;
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{quote_identifier, read_failed, PgSession};
use crate::data_source::backend::{ColumnDescriptor, PropertyType, Record, RecordReader, Value};
use crate::error::CartographError;

/// Builds the query a cursor is declared for. Every column is cast so that its text
/// representation can be decoded into the matching [`Value`] variant.
pub(super) fn select_statement(table: &str, columns: &[ColumnDescriptor]) -> String {
    if columns.is_empty() {
        return format!("SELECT FROM {table}");
    }

    let list = columns
        .iter()
        .map(|column| {
            let name = quote_identifier(&column.name);
            match column.property_type {
                PropertyType::Integer => format!("{name}::int8"),
                PropertyType::Real => format!("{name}::float8"),
                PropertyType::Geometry => format!("ST_AsText({name}::geometry)"),
                PropertyType::String | PropertyType::Other => format!("{name}::text"),
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {list} FROM {table}")
}

/// Reader over a server-side cursor, fetching `fetch_size` rows at a time.
pub(super) struct PgCursorReader {
    session: Arc<PgSession>,
    dataset: String,
    columns: Vec<ColumnDescriptor>,
    select: String,
    cursor_name: Option<String>,
    fetch_size: usize,
    buffer: VecDeque<Record>,
    drained: bool,
}

impl PgCursorReader {
    pub(super) fn new(
        session: Arc<PgSession>,
        dataset: String,
        columns: Vec<ColumnDescriptor>,
        select: String,
        fetch_size: usize,
    ) -> Self {
        Self {
            session,
            dataset,
            columns,
            select,
            cursor_name: None,
            fetch_size,
            buffer: VecDeque::new(),
            drained: false,
        }
    }

    fn declare(&mut self) -> Result<String, CartographError> {
        let name = self.session.next_cursor_name();
        self.session.execute(
            &self.dataset,
            &format!("DECLARE {name} NO SCROLL CURSOR FOR {}", self.select),
        )?;
        log::trace!("Declared cursor {name} for '{}'", self.dataset);

        self.cursor_name = Some(name.clone());
        self.drained = false;
        Ok(name)
    }

    fn close_cursor(&mut self) -> Result<(), CartographError> {
        self.buffer.clear();
        match self.cursor_name.take() {
            Some(name) => self.session.execute(&self.dataset, &format!("CLOSE {name}")),
            None => Ok(()),
        }
    }

    fn fetch(&mut self) -> Result<(), CartographError> {
        let name = match &self.cursor_name {
            Some(name) => name.clone(),
            None => self.declare()?,
        };

        let rows = self.session.fetch_all(
            &self.dataset,
            &format!("FETCH FORWARD {} FROM {name}", self.fetch_size),
        )?;
        if rows.len() < self.fetch_size {
            self.drained = true;
        }

        for row in &rows {
            let record = self.decode(row)?;
            self.buffer.push_back(record);
        }

        Ok(())
    }

    fn decode(&self, row: &PgRow) -> Result<Record, CartographError> {
        let failed = |err: sqlx::Error| read_failed(&self.dataset, err);

        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| -> Result<Value, CartographError> {
                let value = match column.property_type {
                    PropertyType::Integer => row
                        .try_get::<Option<i64>, _>(index)
                        .map_err(failed)?
                        .map(Value::Integer),
                    PropertyType::Real => row
                        .try_get::<Option<f64>, _>(index)
                        .map_err(failed)?
                        .map(Value::Real),
                    PropertyType::String => row
                        .try_get::<Option<String>, _>(index)
                        .map_err(failed)?
                        .map(Value::String),
                    PropertyType::Other => row
                        .try_get::<Option<String>, _>(index)
                        .map_err(failed)?
                        .map(Value::Other),
                    PropertyType::Geometry => row
                        .try_get::<Option<String>, _>(index)
                        .map_err(failed)?
                        .map(|wkt| Geometry::from_wkt(&wkt).map(Value::Geometry))
                        .transpose()
                        .map_err(|err| read_failed(&self.dataset, err))?,
                };

                Ok(value.unwrap_or(Value::Null))
            })
            .collect()
    }
}

impl RecordReader for PgCursorReader {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn rewind(&mut self) -> Result<(), CartographError> {
        self.close_cursor()?;
        self.drained = false;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, CartographError> {
        if self.buffer.is_empty() && !self.drained {
            self.fetch()?;
        }

        Ok(self.buffer.pop_front())
    }
}

impl Drop for PgCursorReader {
    fn drop(&mut self) {
        if let Err(err) = self.close_cursor() {
            log::debug!("Failed to close cursor over '{}': {err}", self.dataset);
        }
    }
}
