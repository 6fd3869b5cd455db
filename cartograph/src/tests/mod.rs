//! In-memory backend used by unit tests.

use std::sync::Arc;

use cartograph_types::Geometry;
use geo_types::{coord, Point, Rect};

use crate::config::ConnectionConfig;
use crate::data_source::{
    Backend, BackendFactory, BackendRegistry, ColumnDescriptor, PropertyType, Record,
    RecordReader, Value,
};
use crate::error::CartographError;

#[derive(Debug, Clone)]
pub struct MemoryDataset {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub records: Vec<Record>,
}

impl MemoryDataset {
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>, records: Vec<Record>) -> Self {
        Self {
            name: name.to_owned(),
            columns,
            records,
        }
    }

    /// `id` and `geometry` columns, one point per record.
    pub fn points(name: &str, points: &[(f64, f64)]) -> Self {
        Self::with_geometries(
            name,
            points
                .iter()
                .map(|&(x, y)| Some(Geometry::from(Point::new(x, y)))),
        )
    }

    /// `id` and `geometry` columns, one `(x_min, y_min, x_max, y_max)` polygon per record.
    pub fn rects(name: &str, rects: &[(f64, f64, f64, f64)]) -> Self {
        Self::with_geometries(
            name,
            rects.iter().map(|&(x_min, y_min, x_max, y_max)| {
                let rect = Rect::new(coord! { x: x_min, y: y_min }, coord! { x: x_max, y: y_max });
                Some(Geometry::from(rect.to_polygon()))
            }),
        )
    }

    pub fn with_geometries(name: &str, geometries: impl Iterator<Item = Option<Geometry>>) -> Self {
        let records = geometries
            .enumerate()
            .map(|(id, geometry)| {
                vec![
                    Value::Integer(id as i64),
                    geometry.map(Value::Geometry).unwrap_or(Value::Null),
                ]
            })
            .collect();

        Self::new(
            name,
            vec![
                ColumnDescriptor::new("id", PropertyType::Integer),
                ColumnDescriptor::new("geometry", PropertyType::Geometry),
            ],
            records,
        )
    }
}

struct MemoryBackend {
    datasets: Arc<Vec<MemoryDataset>>,
}

impl Backend for MemoryBackend {
    fn dataset_names(&mut self) -> Result<Vec<String>, CartographError> {
        Ok(self.datasets.iter().map(|d| d.name.clone()).collect())
    }

    fn open_reader(&mut self, dataset: &str) -> Result<Box<dyn RecordReader>, CartographError> {
        let dataset = self
            .datasets
            .iter()
            .find(|d| d.name == dataset)
            .cloned()
            .ok_or_else(|| CartographError::DatasetNotFound {
                backend: "memory".into(),
                dataset: dataset.into(),
            })?;

        Ok(Box::new(MemoryReader { dataset, next: 0 }))
    }
}

struct MemoryReader {
    dataset: MemoryDataset,
    next: usize,
}

impl RecordReader for MemoryReader {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.dataset.columns
    }

    fn rewind(&mut self) -> Result<(), CartographError> {
        self.next = 0;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, CartographError> {
        let record = self.dataset.records.get(self.next).cloned();
        if record.is_some() {
            self.next += 1;
        }

        Ok(record)
    }
}

struct MemoryFactory {
    datasets: Arc<Vec<MemoryDataset>>,
}

impl BackendFactory for MemoryFactory {
    fn tag(&self) -> &str {
        "memory"
    }

    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Backend>, CartographError> {
        Ok(Box::new(MemoryBackend {
            datasets: self.datasets.clone(),
        }))
    }
}

/// Registry with only the `memory` backend, serving the given datasets.
pub fn memory_registry(datasets: Vec<MemoryDataset>) -> BackendRegistry {
    let registry = BackendRegistry::new();
    registry.register(MemoryFactory {
        datasets: Arc::new(datasets),
    });
    registry
}
