use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use cartograph_types::Geometry;
use geo_types::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use shapefile::dbase::{self, FieldType, FieldValue};
use shapefile::{PolygonRing, ReadableShape, Shape};

use super::read_failed;
use crate::data_source::backend::{ColumnDescriptor, PropertyType, Record, RecordReader, Value};
use crate::error::CartographError;

/// Size of the main file header, in bytes.
const SHP_HEADER_SIZE: u64 = 100;

/// Reader over an ESRI shapefile: the `.shp` geometries joined with the attributes of the
/// `.dbf` file next to it, if there is one.
///
/// Attribute columns come first, in `.dbf` order, followed by the `geometry` column. Records
/// are read from disk one at a time; only the file headers are read on open.
pub(super) struct ShapeFileReader {
    dataset: String,
    columns: Vec<ColumnDescriptor>,
    shapes: ShapeStream,
    attributes: Option<AttributeStream>,
}

fn dbf_path(shp: &Path) -> Option<PathBuf> {
    ["dbf", "DBF"]
        .into_iter()
        .map(|ext| shp.with_extension(ext))
        .find(|p| p.is_file())
}

impl ShapeFileReader {
    pub(super) fn open(dataset: &str, path: &Path) -> Result<Self, CartographError> {
        let shapes = ShapeStream::open(path).map_err(|err| read_failed(dataset, err))?;

        let mut columns = vec![];
        let attributes = match dbf_path(path) {
            Some(dbf) => {
                let attributes =
                    AttributeStream::open(&dbf).map_err(|err| read_failed(dataset, err))?;
                columns = attributes
                    .reader
                    .fields()
                    .iter()
                    .filter(|field| field.name() != "DeletionFlag")
                    .map(|field| {
                        ColumnDescriptor::new(field.name(), field_type(field.field_type()))
                    })
                    .collect();
                Some(attributes)
            }
            None => {
                log::debug!("Shapefile '{dataset}' has no attribute table");
                None
            }
        };

        columns.push(ColumnDescriptor::new("geometry", PropertyType::Geometry));

        Ok(Self {
            dataset: dataset.to_owned(),
            columns,
            shapes,
            attributes,
        })
    }
}

impl RecordReader for ShapeFileReader {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn rewind(&mut self) -> Result<(), CartographError> {
        self.shapes
            .rewind()
            .map_err(|err| read_failed(&self.dataset, err))?;
        if let Some(attributes) = &mut self.attributes {
            attributes
                .rewind()
                .map_err(|err| read_failed(&self.dataset, err))?;
        }

        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, CartographError> {
        let Some(shape) = self
            .shapes
            .next_shape()
            .map_err(|err| read_failed(&self.dataset, err))?
        else {
            return Ok(None);
        };

        let attributes = match &mut self.attributes {
            Some(stream) => stream
                .next_record()
                .map_err(|err| read_failed(&self.dataset, err))?,
            None => None,
        };
        if attributes.is_none() && self.attributes.is_some() {
            log::warn!(
                "Shapefile '{}' has more shapes than attribute records",
                self.dataset
            );
        }

        let attribute_count = self.columns.len() - 1;
        let mut record: Record = self.columns[..attribute_count]
            .iter()
            .map(|column| {
                attributes
                    .as_ref()
                    .and_then(|r| r.get(&column.name))
                    .map(field_value)
                    .unwrap_or(Value::Null)
            })
            .collect();

        record.push(
            shape_to_geometry(&shape)
                .map(|g| Value::Geometry(Geometry::new(g)))
                .unwrap_or(Value::Null),
        );

        Ok(Some(record))
    }
}

/// Sequential reader over the records of a `.shp` file.
struct ShapeStream {
    path: PathBuf,
    source: BufReader<File>,
    /// Offset of the next record header.
    position: u64,
    /// File length declared by the header.
    end: u64,
}

impl ShapeStream {
    fn open(path: &Path) -> Result<Self, shapefile::Error> {
        let mut source = BufReader::new(File::open(path)?);
        let header = shapefile::header::Header::read_from(&mut source)?;

        Ok(Self {
            path: path.to_owned(),
            source,
            position: SHP_HEADER_SIZE,
            end: u64::try_from(header.file_length).unwrap_or(0) * 2,
        })
    }

    /// Reopens the file and positions the stream on the first record.
    fn rewind(&mut self) -> Result<(), shapefile::Error> {
        *self = Self::open(&self.path)?;
        Ok(())
    }

    fn next_shape(&mut self) -> Result<Option<Shape>, shapefile::Error> {
        if self.position >= self.end {
            return Ok(None);
        }

        // Record number and content length in 16-bit words, both big endian.
        let mut header = [0u8; 8];
        self.source.read_exact(&mut header)?;
        let content_length = i32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if content_length < 2 {
            return Err(shapefile::Error::InvalidShapeRecordSize);
        }

        let content_size = content_length * 2;
        let shape = Shape::read_from(&mut self.source, content_size)?;
        self.position += 8 + content_size as u64;

        // Keep record boundaries even if the shape reader stopped short of the content length.
        let offset = self.source.stream_position()?;
        if offset != self.position {
            self.source.seek(SeekFrom::Start(self.position))?;
        }

        Ok(Some(shape))
    }
}

/// Sequential reader over the records of a `.dbf` file.
struct AttributeStream {
    reader: dbase::Reader<BufReader<File>>,
    read: u32,
}

impl AttributeStream {
    fn open(path: &Path) -> Result<Self, dbase::Error> {
        let mut stream = Self {
            reader: dbase::Reader::from_path(path)?,
            read: 0,
        };
        stream.rewind()?;
        Ok(stream)
    }

    fn rewind(&mut self) -> Result<(), dbase::Error> {
        self.reader.seek(0)?;
        self.read = 0;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<dbase::Record>, dbase::Error> {
        if self.read >= self.reader.header().num_records {
            return Ok(None);
        }

        self.read += 1;
        self.reader.iter_records().next().transpose()
    }
}

fn field_type(field_type: FieldType) -> PropertyType {
    match field_type {
        FieldType::Character | FieldType::Memo => PropertyType::String,
        FieldType::Integer => PropertyType::Integer,
        FieldType::Numeric | FieldType::Float | FieldType::Double | FieldType::Currency => {
            PropertyType::Real
        }
        _ => PropertyType::Other,
    }
}

fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) => Value::String(s.trim_end().to_owned()),
        FieldValue::Memo(s) => Value::String(s.clone()),
        FieldValue::Integer(v) => Value::Integer(i64::from(*v)),
        FieldValue::Numeric(Some(v)) => Value::Real(*v),
        FieldValue::Float(Some(v)) => Value::Real(f64::from(*v)),
        FieldValue::Double(v) | FieldValue::Currency(v) => Value::Real(*v),
        FieldValue::Character(None) | FieldValue::Numeric(None) | FieldValue::Float(None) => {
            Value::Null
        }
        other => Value::Other(format!("{other:?}")),
    }
}

fn coord(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

fn line_strings<'a, P: 'a>(
    parts: impl Iterator<Item = &'a Vec<P>>,
    xy: impl Fn(&P) -> Coord<f64>,
) -> geo_types::Geometry<f64> {
    let mut lines: Vec<LineString<f64>> = parts
        .map(|part| LineString::new(part.iter().map(&xy).collect()))
        .collect();

    if lines.len() == 1 {
        lines.remove(0).into()
    } else {
        MultiLineString::new(lines).into()
    }
}

/// Groups shapefile rings into polygons: each outer ring starts a polygon and the inner rings
/// that follow it are its holes.
fn polygons<'a, P: 'a>(
    rings: impl Iterator<Item = &'a PolygonRing<P>>,
    xy: impl Fn(&P) -> Coord<f64>,
) -> Option<geo_types::Geometry<f64>> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = vec![];

    for ring in rings {
        let line = LineString::new(ring.points().iter().map(&xy).collect());
        match (ring, polygons.last_mut()) {
            (PolygonRing::Inner(_), Some((_, holes))) => holes.push(line),
            _ => polygons.push((line, vec![])),
        }
    }

    let mut polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();

    match polygons.len() {
        0 => None,
        1 => Some(polygons.remove(0).into()),
        _ => Some(MultiPolygon::new(polygons).into()),
    }
}

fn shape_to_geometry(shape: &Shape) -> Option<geo_types::Geometry<f64>> {
    match shape {
        Shape::NullShape => None,
        Shape::Point(p) => Some(Point::new(p.x, p.y).into()),
        Shape::PointM(p) => Some(Point::new(p.x, p.y).into()),
        Shape::PointZ(p) => Some(Point::new(p.x, p.y).into()),
        Shape::Multipoint(mp) => Some(
            MultiPoint::new(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect()).into(),
        ),
        Shape::MultipointM(mp) => Some(
            MultiPoint::new(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect()).into(),
        ),
        Shape::MultipointZ(mp) => Some(
            MultiPoint::new(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect()).into(),
        ),
        Shape::Polyline(line) => Some(line_strings(line.parts().iter(), |p| coord(p.x, p.y))),
        Shape::PolylineM(line) => Some(line_strings(line.parts().iter(), |p| coord(p.x, p.y))),
        Shape::PolylineZ(line) => Some(line_strings(line.parts().iter(), |p| coord(p.x, p.y))),
        Shape::Polygon(polygon) => polygons(polygon.rings().iter(), |p| coord(p.x, p.y)),
        Shape::PolygonM(polygon) => polygons(polygon.rings().iter(), |p| coord(p.x, p.y)),
        Shape::PolygonZ(polygon) => polygons(polygon.rings().iter(), |p| coord(p.x, p.y)),
        Shape::Multipatch(_) => {
            log::debug!("Multipatch shapes are not supported, reading as null");
            None
        }
    }
}
