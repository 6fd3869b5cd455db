//! `file-vector` backend: GeoJSON files and ESRI shapefiles on the local file system.
//!
//! The `URI` (or `SOURCE`) configuration key points either to a single file or to a
//! directory. Every `.geojson`, `.json` and `.shp` file in the directory is a dataset, named
//! after the file without its extension. Subdirectories are not scanned.

use std::path::{Path, PathBuf};

use crate::config::ConnectionConfig;
use crate::data_source::backend::{Backend, RecordReader};
use crate::data_source::registry::BackendFactory;
use crate::error::CartographError;

mod geojson_reader;
mod shape_reader;

use geojson_reader::GeoJsonReader;
use shape_reader::ShapeFileReader;

/// Type tag of the backend.
pub const FILE_VECTOR: &str = "file-vector";

/// Configuration keys that can hold the path, in order of preference.
pub const PATH_KEYS: [&str; 2] = ["URI", "SOURCE"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FileFormat {
    GeoJson,
    ShapeFile,
}

impl FileFormat {
    fn of(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "geojson" | "json" => Some(Self::GeoJson),
            "shp" => Some(Self::ShapeFile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct DatasetFile {
    name: String,
    path: PathBuf,
    format: FileFormat,
}

impl DatasetFile {
    fn new(path: PathBuf) -> Option<Self> {
        let format = FileFormat::of(&path)?;
        let name = path.file_stem()?.to_str()?.to_owned();
        Some(Self { name, path, format })
    }
}

/// Factory of the `file-vector` backend.
#[derive(Debug, Default, Copy, Clone)]
pub struct FileVectorFactory;

impl BackendFactory for FileVectorFactory {
    fn tag(&self) -> &str {
        FILE_VECTOR
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Backend>, CartographError> {
        let path = config.require(FILE_VECTOR, &PATH_KEYS)?;
        Ok(Box::new(FileVectorBackend::open(path)?))
    }
}

/// Open `file-vector` connection.
#[derive(Debug)]
pub struct FileVectorBackend {
    root: PathBuf,
    datasets: Vec<DatasetFile>,
}

fn connection_failed(reason: String) -> CartographError {
    CartographError::ConnectionFailed {
        backend: FILE_VECTOR.to_owned(),
        reason,
    }
}

impl FileVectorBackend {
    /// Opens a directory of vector files, or a single file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CartographError> {
        let root = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&root)
            .map_err(|err| connection_failed(format!("cannot access {}: {err}", root.display())))?;

        let datasets = if metadata.is_dir() {
            Self::scan_directory(&root)?
        } else {
            let file = DatasetFile::new(root.clone()).ok_or_else(|| {
                connection_failed(format!("unsupported file type: {}", root.display()))
            })?;
            vec![file]
        };

        log::debug!(
            "Found {} vector datasets in {}",
            datasets.len(),
            root.display()
        );

        Ok(Self { root, datasets })
    }

    fn scan_directory(root: &Path) -> Result<Vec<DatasetFile>, CartographError> {
        let entries = std::fs::read_dir(root)
            .map_err(|err| connection_failed(format!("cannot list {}: {err}", root.display())))?;

        let mut files = vec![];
        for entry in entries {
            let entry = entry.map_err(|err| {
                connection_failed(format!("cannot list {}: {err}", root.display()))
            })?;
            let path = entry.path();
            if path.is_file() {
                files.extend(DatasetFile::new(path));
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut datasets: Vec<DatasetFile> = Vec::with_capacity(files.len());
        for file in files {
            if datasets.iter().any(|d| d.name == file.name) {
                log::warn!(
                    "Skipping {}: a dataset named '{}' already exists",
                    file.path.display(),
                    file.name
                );
                continue;
            }

            datasets.push(file);
        }

        Ok(datasets)
    }

    /// Path the backend was opened with.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Backend for FileVectorBackend {
    fn dataset_names(&mut self) -> Result<Vec<String>, CartographError> {
        Ok(self.datasets.iter().map(|d| d.name.clone()).collect())
    }

    fn open_reader(&mut self, dataset: &str) -> Result<Box<dyn RecordReader>, CartographError> {
        let file = self
            .datasets
            .iter()
            .find(|d| d.name == dataset)
            .ok_or_else(|| CartographError::DatasetNotFound {
                backend: FILE_VECTOR.to_owned(),
                dataset: dataset.to_owned(),
            })?;

        let reader: Box<dyn RecordReader> = match file.format {
            FileFormat::GeoJson => Box::new(GeoJsonReader::open(&file.name, &file.path)?),
            FileFormat::ShapeFile => Box::new(ShapeFileReader::open(&file.name, &file.path)?),
        };

        Ok(reader)
    }

    fn close(&mut self) {
        log::debug!("Closing vector files at {}", self.root.display());
    }
}

fn read_failed(dataset: &str, reason: impl std::fmt::Display) -> CartographError {
    CartographError::ReadFailed {
        backend: FILE_VECTOR.to_owned(),
        target: dataset.to_owned(),
        reason: reason.to_string(),
    }
}
