use std::sync::{Arc, Weak};

use cartograph_types::Geometry;
use parking_lot::Mutex;

use crate::data_source::backend::{ColumnDescriptor, PropertyType, Value};
use crate::data_source::{CursorEntry, CursorId, Position, SourceState};
use crate::error::CartographError;

/// Where a [`DatasetCursor`] is within its dataset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Not moved yet, or the last move failed.
    Unpositioned,
    /// On a record; values can be read.
    Positioned,
    /// Moved past the last record.
    Exhausted,
}

/// Forward-only cursor over the records of one dataset.
///
/// Created by [`DataSource::open_dataset`](super::DataSource::open_dataset). A new cursor is
/// not positioned on any record: call [`DatasetCursor::move_first`] (or `move_next`) before
/// reading values.
///
/// The cursor does not keep its data source alive. Once the source is closed or dropped,
/// every method returns [`CartographError::SourceClosed`].
pub struct DatasetCursor {
    source: Weak<Mutex<SourceState>>,
    backend: Arc<str>,
    id: CursorId,
    dataset: String,
    columns: Vec<ColumnDescriptor>,
}

impl std::fmt::Debug for DatasetCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetCursor")
            .field("backend", &self.backend)
            .field("dataset", &self.dataset)
            .field("columns", &self.columns)
            .finish()
    }
}

impl DatasetCursor {
    pub(crate) fn new(
        source: Weak<Mutex<SourceState>>,
        backend: Arc<str>,
        id: CursorId,
        dataset: String,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        Self {
            source,
            backend,
            id,
            dataset,
            columns,
        }
    }

    /// Name of the dataset the cursor reads.
    pub fn dataset_name(&self) -> &str {
        &self.dataset
    }

    fn closed(&self) -> CartographError {
        CartographError::SourceClosed {
            backend: self.backend.to_string(),
        }
    }

    fn with_entry<T>(
        &self,
        f: impl FnOnce(&mut CursorEntry) -> Result<T, CartographError>,
    ) -> Result<T, CartographError> {
        let source = self.source.upgrade().ok_or_else(|| self.closed())?;
        let mut state = source.lock();
        let entry = state.cursor_mut(self.id).ok_or_else(|| self.closed())?;
        f(entry)
    }

    /// Rewinds to the first record. Returns false if the dataset is empty.
    ///
    /// Can be called any number of times; every call positions the cursor on the same first
    /// record.
    pub fn move_first(&mut self) -> Result<bool, CartographError> {
        self.with_entry(|entry| {
            entry.position = Position::Unpositioned;
            entry.reader.rewind()?;
            advance(entry)
        })
    }

    /// Advances to the next record. Returns false once there are no more records, and keeps
    /// returning false after that.
    ///
    /// On a cursor that was not moved yet this is the same as [`DatasetCursor::move_first`].
    pub fn move_next(&mut self) -> Result<bool, CartographError> {
        self.with_entry(|entry| match entry.position {
            Position::Exhausted => Ok(false),
            Position::Unpositioned | Position::Positioned(_) => advance(entry),
        })
    }

    /// Current position of the cursor.
    pub fn state(&self) -> Result<CursorState, CartographError> {
        self.with_entry(|entry| {
            Ok(match entry.position {
                Position::Unpositioned => CursorState::Unpositioned,
                Position::Positioned(_) => CursorState::Positioned,
                Position::Exhausted => CursorState::Exhausted,
            })
        })
    }

    /// Descriptors of all properties, in order.
    pub fn columns(&self) -> Result<&[ColumnDescriptor], CartographError> {
        self.with_entry(|_| Ok(()))?;
        Ok(&self.columns)
    }

    /// Number of properties of the dataset. Does not depend on the position.
    pub fn property_count(&self) -> Result<usize, CartographError> {
        Ok(self.columns()?.len())
    }

    fn column(&self, index: usize) -> Result<&ColumnDescriptor, CartographError> {
        self.columns()?
            .get(index)
            .ok_or_else(|| CartographError::IndexOutOfBounds {
                dataset: self.dataset.clone(),
                index,
                count: self.columns.len(),
            })
    }

    /// Name of the property at `index`.
    pub fn property_name(&self, index: usize) -> Result<&str, CartographError> {
        Ok(&self.column(index)?.name)
    }

    /// Declared type of the property at `index`.
    pub fn property_type(&self, index: usize) -> Result<PropertyType, CartographError> {
        Ok(self.column(index)?.property_type)
    }

    /// Index of the first property with the given name.
    pub fn property_index(&self, name: &str) -> Result<Option<usize>, CartographError> {
        Ok(self.columns()?.iter().position(|c| c.name == name))
    }

    /// Index of the first geometry property, if the dataset has one.
    pub fn first_geometry_index(&self) -> Result<Option<usize>, CartographError> {
        Ok(self
            .columns()?
            .iter()
            .position(|c| c.property_type == PropertyType::Geometry))
    }

    fn read<T>(
        &self,
        index: usize,
        f: impl FnOnce(&Value) -> Result<T, CartographError>,
    ) -> Result<T, CartographError> {
        self.with_entry(|entry| {
            let Position::Positioned(record) = &entry.position else {
                return Err(CartographError::CursorNotPositioned {
                    dataset: self.dataset.clone(),
                });
            };

            let value = record
                .get(index)
                .ok_or_else(|| CartographError::IndexOutOfBounds {
                    dataset: self.dataset.clone(),
                    index,
                    count: self.columns.len(),
                })?;

            f(value)
        })
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> CartographError {
        CartographError::TypeMismatch {
            dataset: self.dataset.clone(),
            property: self
                .columns
                .get(index)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            expected,
        }
    }

    /// Value of the property at `index` of the current record.
    pub fn value(&self, index: usize) -> Result<Value, CartographError> {
        self.read(index, |value| Ok(value.clone()))
    }

    /// Returns true if the property at `index` of the current record has no value.
    pub fn is_null(&self, index: usize) -> Result<bool, CartographError> {
        self.read(index, |value| Ok(value.is_null()))
    }

    /// Text representation of the property at `index`. Any type can be read as text: null
    /// values give an empty string and geometries their WKT.
    pub fn value_as_string(&self, index: usize) -> Result<String, CartographError> {
        self.read(index, |value| Ok(value.to_string()))
    }

    /// Integer value of the property at `index`, or `None` if it is null.
    pub fn value_as_integer(&self, index: usize) -> Result<Option<i64>, CartographError> {
        self.read(index, |value| match value {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            _ => Err(self.mismatch(index, "integer")),
        })
    }

    /// Real value of the property at `index`, or `None` if it is null. Integer properties
    /// are converted.
    pub fn value_as_real(&self, index: usize) -> Result<Option<f64>, CartographError> {
        self.read(index, |value| match value {
            Value::Null => Ok(None),
            Value::Real(v) => Ok(Some(*v)),
            Value::Integer(v) => Ok(Some(*v as f64)),
            _ => Err(self.mismatch(index, "real")),
        })
    }

    /// Geometry value of the property at `index`, or `None` if it is null.
    pub fn value_as_geometry(&self, index: usize) -> Result<Option<Geometry>, CartographError> {
        self.read(index, |value| match value {
            Value::Null => Ok(None),
            Value::Geometry(geometry) => Ok(Some(geometry.clone())),
            _ => Err(self.mismatch(index, "geometry")),
        })
    }
}

fn advance(entry: &mut CursorEntry) -> Result<bool, CartographError> {
    match entry.reader.next_record() {
        Ok(Some(record)) => {
            entry.position = Position::Positioned(record);
            Ok(true)
        }
        Ok(None) => {
            entry.position = Position::Exhausted;
            Ok(false)
        }
        Err(err) => {
            entry.position = Position::Unpositioned;
            Err(err)
        }
    }
}

impl Drop for DatasetCursor {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.lock().release_cursor(self.id);
        }
    }
}
