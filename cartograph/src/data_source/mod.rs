//! Data sources give access to named datasets of a backend through cursors.
//!
//! A [`DataSource`] is opened by a backend type tag and a [`ConnectionConfig`]. The tag
//! selects a [`BackendFactory`] from a [`BackendRegistry`]. Built-in backends:
//!
//! * `file-vector` ([`file_vector`]): a directory (or a single file) of GeoJSON files and
//!   ESRI shapefiles.
//! * `spatial-db` ([`postgis`], `postgis` feature): tables of a PostgreSQL/PostGIS database.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ConnectionConfig;
use crate::error::CartographError;
use crate::layer::Layer;
use crate::session;

mod backend;
mod cursor;
pub mod file_vector;
#[cfg(feature = "postgis")]
pub mod postgis;
mod registry;

pub use backend::{Backend, ColumnDescriptor, PropertyType, Record, RecordReader, Value};
pub use cursor::{CursorState, DatasetCursor};
pub use registry::{BackendFactory, BackendRegistry};

pub(crate) type CursorId = u64;

/// Position of a cursor within its dataset.
pub(crate) enum Position {
    Unpositioned,
    Positioned(Record),
    Exhausted,
}

pub(crate) struct CursorEntry {
    pub(crate) reader: Box<dyn RecordReader>,
    pub(crate) position: Position,
}

/// Everything owned by an open data source: the backend connection and the readers of all
/// cursors handed out over it. Cursors only keep ids into `cursors`, so closing the source
/// invalidates all of them at once.
pub(crate) struct SourceState {
    backend: Option<Box<dyn Backend>>,
    dataset_names: Option<Vec<String>>,
    cursors: HashMap<CursorId, CursorEntry>,
    next_cursor_id: CursorId,
}

impl SourceState {
    pub(crate) fn cursor_mut(&mut self, id: CursorId) -> Option<&mut CursorEntry> {
        if self.backend.is_none() {
            return None;
        }

        self.cursors.get_mut(&id)
    }

    pub(crate) fn release_cursor(&mut self, id: CursorId) {
        self.cursors.remove(&id);
    }

    fn close(&mut self) -> bool {
        // Readers can hold backend resources, so they go first.
        self.cursors.clear();
        self.dataset_names = None;
        match self.backend.take() {
            Some(mut backend) => {
                backend.close();
                true
            }
            None => false,
        }
    }
}

impl Drop for SourceState {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open connection to one backend.
///
/// `DataSource` is a cheap handle: clones share the same connection, which stays open until
/// [`DataSource::close`] is called on any of them or the last clone (and the last layer
/// referring to it) is dropped. All operations on one data source and its cursors are
/// serialized.
#[derive(Clone)]
pub struct DataSource {
    state: Arc<Mutex<SourceState>>,
    backend: Arc<str>,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("backend", &self.backend)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DataSource {
    /// Opens a data source using the process-wide [`BackendRegistry`].
    ///
    /// Requires an active [`Session`](crate::Session).
    pub fn open(backend: &str, config: &ConnectionConfig) -> Result<Self, CartographError> {
        Self::open_with(BackendRegistry::global(), backend, config)
    }

    /// Opens a data source with a factory from the given registry.
    ///
    /// Requires an active [`Session`](crate::Session).
    pub fn open_with(
        registry: &BackendRegistry,
        backend: &str,
        config: &ConnectionConfig,
    ) -> Result<Self, CartographError> {
        session::ensure_active()?;

        let connection = registry.connect(backend, config)?;
        log::info!("Opened '{backend}' data source");

        Ok(Self {
            state: Arc::new(Mutex::new(SourceState {
                backend: Some(connection),
                dataset_names: None,
                cursors: HashMap::new(),
                next_cursor_id: 0,
            })),
            backend: backend.into(),
        })
    }

    /// Type tag of the backend.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Returns false once the data source was closed.
    pub fn is_open(&self) -> bool {
        self.state.lock().backend.is_some()
    }

    fn closed(&self) -> CartographError {
        CartographError::SourceClosed {
            backend: self.backend.to_string(),
        }
    }

    /// Names of the datasets available through the source.
    ///
    /// The list is read from the backend once and stays the same until the source is closed.
    pub fn dataset_names(&self) -> Result<Vec<String>, CartographError> {
        let mut state = self.state.lock();
        Self::dataset_names_locked(&mut state, &self.backend)
    }

    fn dataset_names_locked(
        state: &mut SourceState,
        backend_tag: &str,
    ) -> Result<Vec<String>, CartographError> {
        if let Some(names) = &state.dataset_names {
            return Ok(names.clone());
        }

        let backend = state
            .backend
            .as_mut()
            .ok_or_else(|| CartographError::SourceClosed {
                backend: backend_tag.to_owned(),
            })?;
        let names = backend.dataset_names()?;
        log::debug!("'{backend_tag}' data source lists {} datasets", names.len());

        state.dataset_names = Some(names.clone());
        Ok(names)
    }

    /// Returns true if the source lists a dataset with the name.
    pub fn has_dataset(&self, dataset: &str) -> Result<bool, CartographError> {
        Ok(self.dataset_names()?.iter().any(|name| name == dataset))
    }

    /// Opens a new cursor over the named dataset. The cursor starts before the first record.
    ///
    /// Any number of cursors can be open over the same source at once, each with its own
    /// position.
    pub fn open_dataset(&self, dataset: &str) -> Result<DatasetCursor, CartographError> {
        let mut state = self.state.lock();

        if !Self::dataset_names_locked(&mut state, &self.backend)?
            .iter()
            .any(|name| name == dataset)
        {
            return Err(CartographError::DatasetNotFound {
                backend: self.backend.to_string(),
                dataset: dataset.to_owned(),
            });
        }

        let backend = state.backend.as_mut().ok_or_else(|| self.closed())?;
        let reader = backend.open_reader(dataset)?;
        let columns = reader.columns().to_vec();

        let id = state.next_cursor_id;
        state.next_cursor_id += 1;
        state.cursors.insert(
            id,
            CursorEntry {
                reader,
                position: Position::Unpositioned,
            },
        );

        log::trace!("Opened cursor {id} over '{dataset}'");

        Ok(DatasetCursor::new(
            Arc::downgrade(&self.state),
            self.backend.clone(),
            id,
            dataset.to_owned(),
            columns,
        ))
    }

    /// Creates a layer over the named dataset, named after the dataset.
    pub fn layer(&self, dataset: &str) -> Result<Layer, CartographError> {
        Layer::new(dataset, self, dataset)
    }

    /// Closes the connection. All cursors opened over the source become unusable.
    ///
    /// Closing an already closed source does nothing.
    pub fn close(&self) {
        if self.state.lock().close() {
            log::info!("Closed '{}' data source", self.backend);
        }
    }

    #[cfg(test)]
    pub(crate) fn open_cursor_count(&self) -> usize {
        self.state.lock().cursors.len()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::ErrorKind;
    use crate::tests::{memory_registry, MemoryDataset};
    use crate::Session;

    fn source() -> (Session, DataSource) {
        let session = Session::begin().unwrap();
        let registry = memory_registry(vec![
            MemoryDataset::points("cities", &[(1.0, 2.0), (3.0, 4.0)]),
            MemoryDataset::points("empty", &[]),
        ]);
        let source = DataSource::open_with(&registry, "memory", &ConnectionConfig::new()).unwrap();
        (session, source)
    }

    #[test]
    fn lists_datasets() {
        let (_session, source) = source();
        assert_eq!(source.backend(), "memory");
        assert_eq!(source.dataset_names().unwrap(), ["cities", "empty"]);
        assert!(source.has_dataset("cities").unwrap());
        assert!(!source.has_dataset("rivers").unwrap());
    }

    #[test]
    fn unknown_dataset() {
        let (_session, source) = source();
        assert_matches!(
            source.open_dataset("rivers"),
            Err(CartographError::DatasetNotFound { dataset, .. }) if dataset == "rivers"
        );
    }

    #[test]
    fn unknown_backend() {
        let _session = Session::begin().unwrap();
        let result = DataSource::open("no-such-backend", &ConnectionConfig::new());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::UnsupportedBackend);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let (_session, source) = source();
        let copy = source.clone();
        source.close();
        source.close();

        assert!(!copy.is_open());
        assert_eq!(
            copy.dataset_names().unwrap_err().kind(),
            ErrorKind::SourceClosed
        );
        assert_eq!(
            copy.open_dataset("cities").unwrap_err().kind(),
            ErrorKind::SourceClosed
        );
    }

    #[test]
    fn close_invalidates_cursors() {
        let (_session, source) = source();
        let mut cursor = source.open_dataset("cities").unwrap();
        assert!(cursor.move_first().unwrap());

        source.close();
        assert_eq!(cursor.move_next().unwrap_err().kind(), ErrorKind::SourceClosed);
        assert_eq!(cursor.value(0).unwrap_err().kind(), ErrorKind::SourceClosed);
        assert_eq!(
            cursor.property_count().unwrap_err().kind(),
            ErrorKind::SourceClosed
        );
    }

    #[test]
    fn dropped_cursors_release_readers() {
        let (_session, source) = source();
        let first = source.open_dataset("cities").unwrap();
        let second = source.open_dataset("cities").unwrap();
        assert_eq!(source.state.lock().cursors.len(), 2);

        drop(first);
        assert_eq!(source.state.lock().cursors.len(), 1);
        drop(second);
        assert!(source.state.lock().cursors.is_empty());
    }
}
