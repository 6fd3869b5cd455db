use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use cartograph_types::Geometry;
use geojson::{Feature, FeatureReader, GeoJson, JsonValue};

use super::read_failed;
use crate::data_source::backend::{ColumnDescriptor, PropertyType, Record, RecordReader, Value};
use crate::error::CartographError;

type FeatureStream = Box<dyn Iterator<Item = geojson::Result<Feature>> + Send>;

enum Features {
    /// Features of a `FeatureCollection`, read one at a time from the file.
    Stream(FeatureStream),
    /// A single feature or geometry document, or a collection that cannot be streamed.
    Loaded { features: Vec<Feature>, next: usize },
}

/// Reader over the features of a GeoJSON document.
///
/// Accepts a `FeatureCollection`, a single `Feature` or a bare geometry. Columns are the
/// union of the feature property names followed by the geometry column; property types are
/// inferred from the values.
///
/// Feature collections whose `features` array is the first array of the document are streamed:
/// opening makes one pass over the file to infer the columns, and records are then read from a
/// fresh pass. Rewinding reopens the file.
pub(super) struct GeoJsonReader {
    dataset: String,
    path: PathBuf,
    columns: Vec<ColumnDescriptor>,
    features: Features,
}

impl GeoJsonReader {
    pub(super) fn open(dataset: &str, path: &Path) -> Result<Self, CartographError> {
        let stream = open_stream(path).map_err(|err| read_failed(dataset, err))?;
        let (columns, features) = match stream {
            Some(stream) => {
                let mut inference = ColumnInference::default();
                let mut count = 0usize;
                for feature in stream {
                    inference.add(&feature.map_err(|err| read_failed(dataset, err))?);
                    count += 1;
                }
                log::trace!("GeoJSON dataset '{dataset}' streams {count} features");

                let stream = open_stream(path)
                    .map_err(|err| read_failed(dataset, err))?
                    .ok_or_else(|| read_failed(dataset, "document changed while reading"))?;
                (inference.finish(), Features::Stream(stream))
            }
            None => {
                let features = load_document(path).map_err(|err| read_failed(dataset, err))?;
                let mut inference = ColumnInference::default();
                for feature in &features {
                    inference.add(feature);
                }
                log::trace!(
                    "GeoJSON dataset '{dataset}' has {} features loaded",
                    features.len()
                );
                (inference.finish(), Features::Loaded { features, next: 0 })
            }
        };

        Ok(Self {
            dataset: dataset.to_owned(),
            path: path.to_owned(),
            columns,
            features,
        })
    }

    fn to_record(&self, feature: &Feature) -> Result<Record, CartographError> {
        let properties = feature.properties.as_ref();
        let mut record = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let value = match column.property_type {
                PropertyType::Geometry => match &feature.geometry {
                    Some(geometry) => Value::Geometry(
                        Geometry::from_geojson(geometry.clone())
                            .map_err(|err| read_failed(&self.dataset, err))?,
                    ),
                    None => Value::Null,
                },
                property_type => properties
                    .and_then(|p| p.get(&column.name))
                    .map(|v| json_to_value(v, property_type))
                    .unwrap_or(Value::Null),
            };

            record.push(value);
        }

        Ok(record)
    }
}

impl RecordReader for GeoJsonReader {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn rewind(&mut self) -> Result<(), CartographError> {
        match &mut self.features {
            Features::Stream(stream) => {
                *stream = open_stream(&self.path)
                    .map_err(|err| read_failed(&self.dataset, err))?
                    .ok_or_else(|| read_failed(&self.dataset, "document changed while reading"))?;
            }
            Features::Loaded { next, .. } => *next = 0,
        }

        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, CartographError> {
        let feature = match &mut self.features {
            Features::Stream(stream) => match stream.next() {
                Some(feature) => feature.map_err(|err| read_failed(&self.dataset, err))?,
                None => return Ok(None),
            },
            Features::Loaded { features, next } => match features.get(*next) {
                Some(feature) => {
                    *next += 1;
                    feature.clone()
                }
                None => return Ok(None),
            },
        };

        self.to_record(&feature).map(Some)
    }
}

/// Opens a feature stream over the `features` array of a collection.
///
/// Returns `None` when the first array of the document is not the `features` member, which is
/// the case for single features, bare geometries and collections with a leading `bbox`.
fn open_stream(path: &Path) -> std::io::Result<Option<FeatureStream>> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut prefix = vec![];
    reader.read_until(b'[', &mut prefix)?;
    if prefix.pop() != Some(b'[') {
        return Ok(None);
    }

    let key = String::from_utf8_lossy(&prefix);
    let key = key.trim_end().strip_suffix(':').map(str::trim_end);
    if key.map_or(true, |key| !key.ends_with("\"features\"")) {
        return Ok(None);
    }

    // An empty array is not handled by the feature reader.
    loop {
        let buffer = reader.fill_buf()?;
        let Some(&byte) = buffer.first() else {
            return Ok(None);
        };
        if !byte.is_ascii_whitespace() {
            if byte == b']' {
                return Ok(Some(Box::new(std::iter::empty())));
            }
            break;
        }
        reader.consume(1);
    }

    let features = FeatureReader::from_reader(Cursor::new(b"[").chain(reader)).features();
    Ok(Some(Box::new(features)))
}

fn load_document(path: &Path) -> Result<Vec<Feature>, geojson::Error> {
    let text = std::fs::read_to_string(path)?;
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    Ok(features)
}

fn json_type(value: &JsonValue) -> Option<PropertyType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) if n.is_i64() => Some(PropertyType::Integer),
        JsonValue::Number(_) => Some(PropertyType::Real),
        JsonValue::String(_) => Some(PropertyType::String),
        _ => Some(PropertyType::Other),
    }
}

fn merge_types(current: Option<PropertyType>, next: Option<PropertyType>) -> Option<PropertyType> {
    match (current, next) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(PropertyType::Integer), Some(PropertyType::Real))
        | (Some(PropertyType::Real), Some(PropertyType::Integer)) => Some(PropertyType::Real),
        _ => Some(PropertyType::Other),
    }
}

/// Column names and types accumulated over the features of a document.
#[derive(Default)]
struct ColumnInference {
    names: Vec<String>,
    types: Vec<Option<PropertyType>>,
}

impl ColumnInference {
    fn add(&mut self, feature: &Feature) {
        let Some(properties) = &feature.properties else {
            return;
        };

        for (name, value) in properties {
            let index = match self.names.iter().position(|n| n == name) {
                Some(index) => index,
                None => {
                    self.names.push(name.clone());
                    self.types.push(None);
                    self.names.len() - 1
                }
            };

            self.types[index] = merge_types(self.types[index], json_type(value));
        }
    }

    fn finish(self) -> Vec<ColumnDescriptor> {
        let geometry_name = geometry_column_name(&self.names);
        let mut columns: Vec<ColumnDescriptor> = self
            .names
            .into_iter()
            .zip(self.types)
            // Properties that are null everywhere are read as strings.
            .map(|(name, t)| ColumnDescriptor::new(name, t.unwrap_or(PropertyType::String)))
            .collect();
        columns.push(ColumnDescriptor::new(geometry_name, PropertyType::Geometry));

        columns
    }
}

fn geometry_column_name(property_names: &[String]) -> String {
    let mut name = "geometry".to_owned();
    while property_names.contains(&name) {
        name.insert(0, '_');
    }

    name
}

fn json_to_value(value: &JsonValue, property_type: PropertyType) -> Value {
    match (property_type, value) {
        (_, JsonValue::Null) => Value::Null,
        (PropertyType::Integer, JsonValue::Number(n)) => match n.as_i64() {
            Some(v) => Value::Integer(v),
            None => Value::Other(n.to_string()),
        },
        (PropertyType::Real, JsonValue::Number(n)) => match n.as_f64() {
            Some(v) => Value::Real(v),
            None => Value::Other(n.to_string()),
        },
        (_, JsonValue::String(s)) => match property_type {
            PropertyType::String => Value::String(s.clone()),
            _ => Value::Other(s.clone()),
        },
        (_, other) => Value::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(json: &str) -> (tempfile::TempDir, GeoJsonReader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.geojson");
        std::fs::write(&path, json).unwrap();
        let reader = GeoJsonReader::open("data", &path).unwrap();
        (dir, reader)
    }

    fn names(reader: &mut GeoJsonReader) -> Vec<Value> {
        let mut names = vec![];
        while let Some(record) = reader.next_record().unwrap() {
            names.push(record[0].clone());
        }
        names
    }

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "A", "pop": 10, "area": 1.5},
                "geometry": {"type": "Point", "coordinates": [0, 0]}
            },
            {
                "type": "Feature",
                "properties": {"name": null, "pop": 2.5, "tags": ["x"]},
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn columns_are_inferred() {
        let (_dir, reader) = reader(COLLECTION);
        assert!(matches!(reader.features, Features::Stream(_)));
        let columns: Vec<_> = reader
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.property_type))
            .collect();

        assert_eq!(
            columns,
            [
                ("area", PropertyType::Real),
                ("name", PropertyType::String),
                ("pop", PropertyType::Real),
                ("tags", PropertyType::Other),
                ("geometry", PropertyType::Geometry),
            ]
        );
    }

    #[test]
    fn records() {
        let (_dir, mut reader) = reader(COLLECTION);

        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first[0], Value::Real(1.5));
        assert_eq!(first[1], Value::String("A".into()));
        assert_eq!(first[2], Value::Real(10.0));
        assert_eq!(first[3], Value::Null);
        assert!(matches!(first[4], Value::Geometry(_)));

        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second[0], Value::Null);
        assert_eq!(second[1], Value::Null);
        assert_eq!(second[3], Value::Other(r#"["x"]"#.into()));
        assert_eq!(second[4], Value::Null);

        assert!(reader.next_record().unwrap().is_none());
        reader.rewind().unwrap();
        assert_eq!(reader.next_record().unwrap().unwrap(), first);
    }

    #[test]
    fn bare_geometry() {
        let (_dir, mut reader) =
            reader(r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#);
        assert_eq!(reader.columns().len(), 1);
        let record = reader.next_record().unwrap().unwrap();
        let Value::Geometry(geometry) = &record[0] else {
            panic!("expected a geometry");
        };
        assert_eq!(geometry.type_name(), "LineString");
    }

    #[test]
    fn geometry_property_name_clash() {
        let (_dir, reader) = reader(
            r#"{"type": "Feature", "properties": {"geometry": "wkt"},
                "geometry": {"type": "Point", "coordinates": [0, 0]}}"#,
        );
        assert_eq!(reader.columns()[1].name, "_geometry");
    }

    #[test]
    fn invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        std::fs::write(&path, "{ not json").unwrap();
        let err = GeoJsonReader::open("broken", &path).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::ReadFailed);
    }

    #[test]
    fn empty_collection() {
        let (_dir, mut reader) = reader(r#"{"type": "FeatureCollection", "features": [ ]}"#);
        assert!(matches!(reader.features, Features::Stream(_)));
        assert_eq!(reader.columns().len(), 1);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn collection_with_leading_bbox_is_loaded() {
        let (_dir, mut reader) = reader(
            r#"{"type": "FeatureCollection", "bbox": [0, 0, 1, 1], "features": [
                {"type": "Feature", "properties": {"name": "A"}, "geometry": null},
                {"type": "Feature", "properties": {"name": "B"}, "geometry": null}
            ]}"#,
        );
        assert!(matches!(reader.features, Features::Loaded { .. }));
        assert_eq!(
            names(&mut reader),
            [Value::String("A".into()), Value::String("B".into())]
        );
    }

    #[test]
    fn rewind_reopens_the_file() {
        let collection = |names: &[&str]| {
            let features: Vec<String> = names
                .iter()
                .map(|name| {
                    format!(
                        r#"{{"type": "Feature", "properties": {{"name": "{name}"}},
                            "geometry": null}}"#
                    )
                })
                .collect();
            format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features.join(","))
        };

        let (dir, mut reader) = reader(&collection(&["A", "B"]));
        assert_eq!(reader.next_record().unwrap().unwrap()[0], Value::String("A".into()));

        std::fs::write(dir.path().join("data.geojson"), collection(&["C"])).unwrap();
        reader.rewind().unwrap();
        assert_eq!(names(&mut reader), [Value::String("C".into())]);
    }

    #[test]
    fn broken_feature_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "prop"#,
        )
        .unwrap();
        let err = GeoJsonReader::open("broken", &path).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::ReadFailed);
    }
}
