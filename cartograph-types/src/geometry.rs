use geozero::wkt::Wkt;
use geozero::{ToGeo, ToWkt};

use crate::error::TypesError;

/// Geometry value of a dataset record.
///
/// Data sources pass geometries through without interpreting them. Computing bounds or
/// drawing is the job of the geometry and rendering engines, which can look inside through
/// [`Geometry::as_geo`].
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(geo_types::Geometry<f64>);

impl Geometry {
    /// Wraps a `geo-types` geometry.
    pub fn new(geometry: geo_types::Geometry<f64>) -> Self {
        Self(geometry)
    }

    /// Parses a geometry from its WKT representation.
    pub fn from_wkt(text: &str) -> Result<Self, TypesError> {
        Wkt(text)
            .to_geo()
            .map(Self)
            .map_err(|err| TypesError::Parse(err.to_string()))
    }

    /// Converts a GeoJSON geometry.
    pub fn from_geojson(geometry: geojson::Geometry) -> Result<Self, TypesError> {
        geo_types::Geometry::<f64>::try_from(geometry)
            .map(Self)
            .map_err(|err| TypesError::Conversion(err.to_string()))
    }

    /// WKT representation of the geometry.
    pub fn to_wkt(&self) -> Result<String, TypesError> {
        self.0
            .to_wkt()
            .map_err(|err| TypesError::Conversion(err.to_string()))
    }

    /// Name of the geometry type, e.g. `Polygon`.
    pub fn type_name(&self) -> &'static str {
        match &self.0 {
            geo_types::Geometry::Point(_) => "Point",
            geo_types::Geometry::Line(_) => "Line",
            geo_types::Geometry::LineString(_) => "LineString",
            geo_types::Geometry::Polygon(_) => "Polygon",
            geo_types::Geometry::MultiPoint(_) => "MultiPoint",
            geo_types::Geometry::MultiLineString(_) => "MultiLineString",
            geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
            geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
            geo_types::Geometry::Rect(_) => "Rect",
            geo_types::Geometry::Triangle(_) => "Triangle",
        }
    }

    /// Borrows the underlying `geo-types` geometry.
    pub fn as_geo(&self) -> &geo_types::Geometry<f64> {
        &self.0
    }

    /// Unwraps the underlying `geo-types` geometry.
    pub fn into_geo(self) -> geo_types::Geometry<f64> {
        self.0
    }
}

impl From<geo_types::Geometry<f64>> for Geometry {
    fn from(value: geo_types::Geometry<f64>) -> Self {
        Self(value)
    }
}

impl From<geo_types::Point<f64>> for Geometry {
    fn from(value: geo_types::Point<f64>) -> Self {
        Self(value.into())
    }
}

impl From<geo_types::LineString<f64>> for Geometry {
    fn from(value: geo_types::LineString<f64>) -> Self {
        Self(value.into())
    }
}

impl From<geo_types::Polygon<f64>> for Geometry {
    fn from(value: geo_types::Polygon<f64>) -> Self {
        Self(value.into())
    }
}

impl From<geo_types::MultiPolygon<f64>> for Geometry {
    fn from(value: geo_types::MultiPolygon<f64>) -> Self {
        Self(value.into())
    }
}
