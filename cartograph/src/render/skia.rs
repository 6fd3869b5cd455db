use cartograph_types::{Geometry, Rect};
use geo_types::{Coord, LineString, Polygon};
use nalgebra::Point2;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Shader, Stroke, Transform};

use crate::color::Color;
use crate::error::CartographError;
use crate::layer::Layer;
use crate::render::engine::{Frame, GeometryEngine, PlanarBounds, RawImage, RenderEngine};
use crate::view::CanvasView;

/// CPU [`RenderEngine`] based on `tiny-skia`.
///
/// Polygons are filled with the layer color, lines are stroked with it and points are drawn
/// as discs. Anti-aliasing is off, so every pixel has either the layer color or what was
/// under it, and the output does not depend on the platform.
#[derive(Debug, Clone, Copy)]
pub struct SkiaEngine {
    line_width: f32,
    point_radius: f32,
}

impl Default for SkiaEngine {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            point_radius: 2.0,
        }
    }
}

impl SkiaEngine {
    /// Creates an engine with 1 px lines and 2 px point radius.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the width of stroked lines, in pixels.
    pub fn with_line_width(self, line_width: f32) -> Self {
        Self { line_width, ..self }
    }

    /// Sets the radius of point discs, in pixels.
    pub fn with_point_radius(self, point_radius: f32) -> Self {
        Self {
            point_radius,
            ..self
        }
    }

    fn draw_geometry(
        &self,
        pixmap: &mut Pixmap,
        view: &CanvasView,
        geometry: &geo_types::Geometry<f64>,
        paint: &Paint,
    ) {
        use geo_types::Geometry as G;

        match geometry {
            G::Point(point) => self.draw_point(pixmap, view, point.0, paint),
            G::MultiPoint(points) => {
                for point in points {
                    self.draw_point(pixmap, view, point.0, paint);
                }
            }
            G::Line(line) => {
                let line = LineString::new(vec![line.start, line.end]);
                self.draw_line(pixmap, view, &line, paint);
            }
            G::LineString(line) => self.draw_line(pixmap, view, line, paint),
            G::MultiLineString(lines) => {
                for line in lines {
                    self.draw_line(pixmap, view, line, paint);
                }
            }
            G::Polygon(polygon) => self.draw_polygon(pixmap, view, polygon, paint),
            G::MultiPolygon(polygons) => {
                for polygon in polygons {
                    self.draw_polygon(pixmap, view, polygon, paint);
                }
            }
            G::Rect(rect) => self.draw_polygon(pixmap, view, &rect.to_polygon(), paint),
            G::Triangle(triangle) => {
                self.draw_polygon(pixmap, view, &triangle.to_polygon(), paint)
            }
            G::GeometryCollection(collection) => {
                for geometry in collection {
                    self.draw_geometry(pixmap, view, geometry, paint);
                }
            }
        }
    }

    fn draw_point(&self, pixmap: &mut Pixmap, view: &CanvasView, point: Coord<f64>, paint: &Paint) {
        let center = to_screen(view, point);
        if let Some(path) = PathBuilder::from_circle(center.0, center.1, self.point_radius) {
            pixmap.fill_path(&path, paint, FillRule::Winding, Transform::default(), None);
        }
    }

    fn draw_line(&self, pixmap: &mut Pixmap, view: &CanvasView, line: &LineString<f64>, paint: &Paint) {
        let mut builder = PathBuilder::new();
        add_contour(&mut builder, view, line, false);

        if let Some(path) = builder.finish() {
            let stroke = Stroke {
                width: self.line_width,
                ..Default::default()
            };
            pixmap.stroke_path(&path, paint, &stroke, Transform::default(), None);
        }
    }

    fn draw_polygon(&self, pixmap: &mut Pixmap, view: &CanvasView, polygon: &Polygon<f64>, paint: &Paint) {
        if let Some(path) = polygon_path(view, polygon) {
            pixmap.fill_path(&path, paint, FillRule::EvenOdd, Transform::default(), None);
        }
    }
}

fn to_screen(view: &CanvasView, coord: Coord<f64>) -> (f32, f32) {
    let point = view.map_to_screen(Point2::new(coord.x, coord.y));
    (point.x as f32, point.y as f32)
}

fn add_contour(builder: &mut PathBuilder, view: &CanvasView, line: &LineString<f64>, close: bool) {
    let mut coords = line.coords();
    let Some(first) = coords.next() else {
        return;
    };

    let (x, y) = to_screen(view, *first);
    builder.move_to(x, y);
    for coord in coords {
        let (x, y) = to_screen(view, *coord);
        builder.line_to(x, y);
    }

    if close {
        builder.close();
    }
}

fn polygon_path(view: &CanvasView, polygon: &Polygon<f64>) -> Option<Path> {
    let mut builder = PathBuilder::new();
    add_contour(&mut builder, view, polygon.exterior(), true);
    for interior in polygon.interiors() {
        add_contour(&mut builder, view, interior, true);
    }

    builder.finish()
}

fn layer_paint(color: Color) -> Paint<'static> {
    let [r, g, b, a] = color.to_u8_array();
    Paint {
        shader: Shader::SolidColor(tiny_skia::Color::from_rgba8(r, g, b, a)),
        anti_alias: false,
        ..Default::default()
    }
}

impl GeometryEngine for SkiaEngine {
    fn bounds(&self, geometry: &Geometry) -> Option<Rect> {
        PlanarBounds.bounds(geometry)
    }
}

impl RenderEngine for SkiaEngine {
    fn initialize(&self) -> Result<(), CartographError> {
        Pixmap::new(1, 1)
            .map(|_| ())
            .ok_or_else(|| CartographError::Bootstrap("cannot allocate a pixel buffer".into()))
    }

    fn draw(&self, frame: &Frame, layers: &[Layer]) -> Result<RawImage, CartographError> {
        let (width, height) = (frame.size.width(), frame.size.height());
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            CartographError::RenderFailed(format!("cannot allocate a {width}x{height} canvas"))
        })?;

        let [r, g, b, a] = frame.background.to_u8_array();
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        let view = CanvasView::fit(&frame.extent, frame.size);
        for layer in layers {
            let paint = layer_paint(layer.color());
            let mut count = 0usize;
            layer
                .for_each_geometry(|geometry| {
                    self.draw_geometry(&mut pixmap, &view, geometry.as_geo(), &paint);
                    count += 1;
                    Ok(())
                })
                .map_err(|err| err.for_layer(layer.name()))?;

            log::debug!("Drew {count} geometries of layer '{}'", layer.name());
        }

        let bytes = pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect();

        Ok(RawImage::new(bytes, width, height))
    }
}
