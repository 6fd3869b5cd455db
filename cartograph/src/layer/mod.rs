//! [Layers](Layer) bind a dataset of a data source to the way it is drawn.

use std::sync::Arc;

use cartograph_types::{Geometry, Rect};
use parking_lot::RwLock;

use crate::color::Color;
use crate::data_source::{DataSource, DatasetCursor, PropertyType};
use crate::error::CartographError;
use crate::render::{GeometryEngine, PlanarBounds};

/// A dataset of a [`DataSource`] prepared for rendering.
///
/// The layer reads geometries from one geometry column of the dataset: the first one, unless
/// another is selected with [`Layer::with_geometry_column`]. Its extent is computed on first
/// request and then cached; clones of a layer share the cache.
#[derive(Clone)]
pub struct Layer {
    name: String,
    source: DataSource,
    dataset: String,
    geometry_column: Option<String>,
    color: Color,
    geometry_engine: Arc<dyn GeometryEngine>,
    extent: Arc<RwLock<Option<Rect>>>,
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("backend", &self.source.backend())
            .field("dataset", &self.dataset)
            .field("geometry_column", &self.geometry_column)
            .field("color", &self.color)
            .field("extent", &*self.extent.read())
            .finish()
    }
}

impl Layer {
    /// Color of layers that were not given one.
    pub const DEFAULT_COLOR: Color = Color::rgb(0x33, 0x66, 0x99);

    /// Creates a layer over a dataset of the source. Fails if the source does not list the
    /// dataset.
    ///
    /// The layer keeps the source open for as long as it exists, unless the source is closed
    /// explicitly.
    pub fn new(
        name: impl Into<String>,
        source: &DataSource,
        dataset: &str,
    ) -> Result<Self, CartographError> {
        if !source.has_dataset(dataset)? {
            return Err(CartographError::DatasetNotFound {
                backend: source.backend().to_owned(),
                dataset: dataset.to_owned(),
            });
        }

        Ok(Self {
            name: name.into(),
            source: source.clone(),
            dataset: dataset.to_owned(),
            geometry_column: None,
            color: Self::DEFAULT_COLOR,
            geometry_engine: Arc::new(PlanarBounds),
            extent: Arc::new(RwLock::new(None)),
        })
    }

    /// Sets the color the layer is drawn with.
    pub fn with_color(self, color: Color) -> Self {
        Self { color, ..self }
    }

    /// Reads geometries from the named column instead of the first geometry column.
    pub fn with_geometry_column(self, column: impl Into<String>) -> Self {
        Self {
            geometry_column: Some(column.into()),
            extent: Arc::new(RwLock::new(None)),
            ..self
        }
    }

    /// Sets the engine used to compute geometry bounds.
    pub fn with_geometry_engine(self, engine: Arc<dyn GeometryEngine>) -> Self {
        Self {
            geometry_engine: engine,
            extent: Arc::new(RwLock::new(None)),
            ..self
        }
    }

    /// Name of the layer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data source the layer reads from.
    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Name of the dataset the layer reads.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Color the layer is drawn with.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Extent if it was computed already.
    pub fn cached_extent(&self) -> Option<Rect> {
        *self.extent.read()
    }

    /// Smallest rectangle containing every geometry of the dataset.
    ///
    /// The dataset is scanned on the first call only. Null geometries and geometries without
    /// coordinates are skipped; if nothing is left, [`CartographError::EmptyDataset`] is
    /// returned and the next call scans again.
    pub fn extent(&self) -> Result<Rect, CartographError> {
        if let Some(extent) = *self.extent.read() {
            return Ok(extent);
        }

        let mut extent: Option<Rect> = None;
        self.for_each_geometry(|geometry| {
            if let Some(bounds) = self.geometry_engine.bounds(geometry) {
                extent = Some(match extent {
                    Some(extent) => extent.merge(bounds),
                    None => bounds,
                });
            }

            Ok(())
        })?;

        let extent = extent.ok_or_else(|| CartographError::EmptyDataset {
            dataset: self.dataset.clone(),
        })?;
        log::debug!("Extent of layer '{}': {extent:?}", self.name);

        *self.extent.write() = Some(extent);
        Ok(extent)
    }

    /// Calls `f` with every non-null geometry of the dataset, in dataset order. Stops at the
    /// first error.
    pub fn for_each_geometry(
        &self,
        mut f: impl FnMut(&Geometry) -> Result<(), CartographError>,
    ) -> Result<(), CartographError> {
        let mut cursor = self.source.open_dataset(&self.dataset)?;
        let index = self.geometry_index(&cursor)?;

        let mut has_record = cursor.move_first()?;
        while has_record {
            if let Some(geometry) = cursor.value_as_geometry(index)? {
                f(&geometry)?;
            }

            has_record = cursor.move_next()?;
        }

        Ok(())
    }

    fn geometry_index(&self, cursor: &DatasetCursor) -> Result<usize, CartographError> {
        let Some(column) = &self.geometry_column else {
            return cursor
                .first_geometry_index()?
                .ok_or_else(|| CartographError::EmptyDataset {
                    dataset: self.dataset.clone(),
                });
        };

        match cursor.property_index(column)? {
            Some(index) if cursor.property_type(index)? == PropertyType::Geometry => Ok(index),
            _ => Err(CartographError::TypeMismatch {
                dataset: self.dataset.clone(),
                property: column.clone(),
                expected: "geometry",
            }),
        }
    }
}
