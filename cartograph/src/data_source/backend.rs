use std::fmt::{Display, Formatter};

use cartograph_types::Geometry;

use crate::error::CartographError;

/// Declared type of a dataset property (column).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Signed integer values.
    Integer,
    /// Floating point values.
    Real,
    /// Text values.
    String,
    /// Geometry values, see [`Geometry`].
    Geometry,
    /// Anything else. Values are carried as text.
    Other,
}

impl PropertyType {
    /// Lowercase name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Integer => "integer",
            PropertyType::Real => "real",
            PropertyType::String => "string",
            PropertyType::Geometry => "geometry",
            PropertyType::Other => "other",
        }
    }
}

/// Name and declared type of a dataset property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub property_type: PropertyType,
}

impl ColumnDescriptor {
    /// Creates a new descriptor.
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
        }
    }
}

/// Value of one property of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// Integer value.
    Integer(i64),
    /// Real value.
    Real(f64),
    /// Text value.
    String(String),
    /// Geometry value.
    Geometry(Geometry),
    /// Value of a type the backend has no mapping for, as text.
    Other(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Display for Value {
    /// Null values are written as an empty string and geometries as WKT.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::String(v) | Value::Other(v) => f.write_str(v),
            Value::Geometry(geometry) => match geometry.to_wkt() {
                Ok(wkt) => f.write_str(&wkt),
                Err(_) => write!(f, "{} geometry", geometry.type_name()),
            },
        }
    }
}

/// One record of a dataset: a value per column, in column order.
pub type Record = Vec<Value>;

/// Open connection to a backend, produced by a [`BackendFactory`](super::BackendFactory).
///
/// A backend is owned exclusively by one [`DataSource`](super::DataSource), which serializes
/// all calls to it.
pub trait Backend: Send {
    /// Identifiers of the datasets available through the connection, in backend order.
    fn dataset_names(&mut self) -> Result<Vec<String>, CartographError>;
    /// Opens a forward-only reader over the named dataset. The name is always one of those
    /// returned by [`Backend::dataset_names`].
    fn open_reader(&mut self, dataset: &str) -> Result<Box<dyn RecordReader>, CartographError>;
    /// Releases the connection. Called once, before the backend is dropped.
    fn close(&mut self) {}
}

/// Forward-only, pull-based reader over the records of one dataset.
///
/// A new reader is positioned before the first record. Implementations must never require
/// the whole dataset to be held in memory by the caller.
pub trait RecordReader: Send {
    /// Columns of the dataset. Fixed for the lifetime of the reader.
    fn columns(&self) -> &[ColumnDescriptor];
    /// Positions the reader before the first record again.
    fn rewind(&mut self) -> Result<(), CartographError>;
    /// Reads the next record, or returns `None` when there are no more records. Every
    /// returned record has exactly one value per column.
    fn next_record(&mut self) -> Result<Option<Record>, CartographError>;
}
