use cartograph_types::{Geometry, Rect, Size};
use geo::BoundingRect;

use crate::color::Color;
use crate::error::CartographError;
use crate::layer::Layer;

/// Computes geometric properties of geometry values.
pub trait GeometryEngine: Send + Sync {
    /// Axis-aligned bounding box of the geometry, or `None` if it has no coordinates.
    fn bounds(&self, geometry: &Geometry) -> Option<Rect>;
}

/// [`GeometryEngine`] for planar coordinates.
#[derive(Debug, Default, Copy, Clone)]
pub struct PlanarBounds;

impl GeometryEngine for PlanarBounds {
    fn bounds(&self, geometry: &Geometry) -> Option<Rect> {
        geometry.as_geo().bounding_rect().map(Rect::from)
    }
}

/// What to draw: the map area, the canvas size and its background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Map area to fit into the canvas.
    pub extent: Rect,
    /// Canvas size in pixels.
    pub size: Size<u32>,
    /// Color the canvas is cleared with before drawing.
    pub background: Color,
}

/// Pixel buffer produced by a [`RenderEngine`]: 8-bit RGBA with straight (not premultiplied)
/// alpha, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl RawImage {
    /// Wraps a pixel buffer. The length is not checked here; the render pipeline rejects
    /// buffers that do not match the dimensions.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }

    /// Pixel data.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Unwraps the pixel data.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Rasterizes layers into a pixel buffer.
///
/// An engine is set up once per [`Session`](crate::Session): `initialize` when the session
/// begins and `finalize` when it ends.
pub trait RenderEngine: GeometryEngine {
    /// Prepares the engine for drawing.
    fn initialize(&self) -> Result<(), CartographError> {
        Ok(())
    }

    /// Releases what `initialize` acquired.
    fn finalize(&self) {}

    /// Draws `layers` in order, later layers on top, onto a canvas of `frame.size` cleared with
    /// `frame.background`, with `frame.extent` fit into the canvas.
    fn draw(&self, frame: &Frame, layers: &[Layer]) -> Result<RawImage, CartographError>;
}
