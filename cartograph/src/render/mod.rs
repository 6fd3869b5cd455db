//! Rendering of layers into encoded raster images.
//!
//! A [`Renderer`] runs the whole pipeline for a [`RenderRequest`]:
//!
//! 1. checks that a session is active and validates the request,
//! 2. computes the combined extent of all layers,
//! 3. lets the [`RenderEngine`] draw the layers in order onto a canvas fit to that extent,
//! 4. checks the pixel buffer and encodes it with the requested [`OutputFormat`].

use std::path::Path;
use std::sync::Arc;

use cartograph_types::{Rect, Size};

use crate::color::Color;
use crate::error::CartographError;
use crate::layer::Layer;
use crate::session;

mod codec;
mod engine;
mod skia;

pub use codec::OutputFormat;
pub use engine::{Frame, GeometryEngine, PlanarBounds, RawImage, RenderEngine};
pub use skia::SkiaEngine;

/// Layers to render and how to render them.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    layers: Vec<Layer>,
    size: Size<u32>,
    background: Color,
    format: OutputFormat,
}

impl RenderRequest {
    /// Creates a request for an image of the given size, with a white background and PNG
    /// output.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: vec![],
            size: Size::new(width, height),
            background: Color::WHITE,
            format: OutputFormat::Png,
        }
    }

    /// Adds a layer on top of the layers added before.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Adds layers in order, the last one on top.
    pub fn with_layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
        self.layers.extend(layers);
        self
    }

    /// Sets the canvas background.
    pub fn with_background(self, background: Color) -> Self {
        Self { background, ..self }
    }

    /// Sets the output encoding.
    pub fn with_format(self, format: OutputFormat) -> Self {
        Self { format, ..self }
    }

    /// Layers in drawing order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Image size in pixels.
    pub fn size(&self) -> Size<u32> {
        self.size
    }

    /// Canvas background.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Output encoding.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn validate(&self) -> Result<(), CartographError> {
        if self.layers.is_empty() {
            return Err(CartographError::InvalidRenderRequest(
                "at least one layer is required".into(),
            ));
        }

        if self.size.is_zero() {
            return Err(CartographError::InvalidRenderRequest(format!(
                "image size must be positive, got {}x{}",
                self.size.width(),
                self.size.height()
            )));
        }

        Ok(())
    }
}

/// Encoded image produced by a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl RenderedImage {
    /// Encoded image data.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unwraps the encoded image data.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if there are no encoded bytes. Never the case for a successful render.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encoding of the data.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Writes the encoded data to a file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), CartographError> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes).map_err(|err| {
            CartographError::ImageEncodingFailed(format!("cannot write {}: {err}", path.display()))
        })
    }
}

/// Union of the extents of all layers. Errors are attributed to the layer that raised them.
pub fn combined_extent(layers: &[Layer]) -> Result<Rect, CartographError> {
    let extents = layers
        .iter()
        .map(|layer| layer.extent().map_err(|err| err.for_layer(layer.name())))
        .collect::<Result<Vec<_>, _>>()?;

    Rect::union_all(extents)
        .ok_or_else(|| CartographError::InvalidRenderRequest("no layers to render".into()))
}

/// Runs the render pipeline with a [`RenderEngine`].
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn RenderEngine>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a renderer that draws with the given engine. Renderers are handed out by
    /// [`Session::renderer`](crate::Session::renderer) once the engine is initialized.
    pub(crate) fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self { engine }
    }

    /// Engine the renderer draws with.
    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    /// Renders `layers` in order, the last one on top, into a `width` x `height` PNG image with
    /// the given background.
    pub fn render(
        &self,
        layers: &[Layer],
        width: u32,
        height: u32,
        background: Color,
    ) -> Result<RenderedImage, CartographError> {
        let request = RenderRequest::new(width, height)
            .with_layers(layers.iter().cloned())
            .with_background(background);
        self.render_request(&request)
    }

    /// Renders a request.
    ///
    /// Fails with [`CartographError::SessionInactive`] once no session is active, even if this
    /// renderer was created by a session that has since ended.
    pub fn render_request(&self, request: &RenderRequest) -> Result<RenderedImage, CartographError> {
        session::ensure_active()?;
        request.validate()?;

        let extent = combined_extent(&request.layers)?;
        log::debug!(
            "Rendering {} layers, extent {:?}, {}x{} px",
            request.layers.len(),
            extent,
            request.size.width(),
            request.size.height()
        );

        let frame = Frame {
            extent,
            size: request.size,
            background: request.background,
        };
        let raw = self.engine.draw(&frame, &request.layers)?;
        let bitmap = codec::decode(raw, request.size)?;
        let bytes = codec::encode(bitmap, request.format)?;

        log::info!(
            "Rendered {}x{} {} image ({} bytes)",
            request.size.width(),
            request.size.height(),
            request.format.extension(),
            bytes.len()
        );

        Ok(RenderedImage {
            bytes,
            format: request.format,
            width: request.size.width(),
            height: request.size.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::ConnectionConfig;
    use crate::data_source::DataSource;
    use crate::error::ErrorKind;
    use crate::tests::{memory_registry, MemoryDataset};
    use crate::Session;

    struct WrongSizeEngine;

    impl GeometryEngine for WrongSizeEngine {
        fn bounds(&self, geometry: &cartograph_types::Geometry) -> Option<Rect> {
            PlanarBounds.bounds(geometry)
        }
    }

    impl RenderEngine for WrongSizeEngine {
        fn draw(&self, _frame: &Frame, _layers: &[Layer]) -> Result<RawImage, CartographError> {
            Ok(RawImage::new(vec![0; 12], 1, 3))
        }
    }

    fn source() -> (Session, DataSource) {
        let session = Session::begin().unwrap();
        let registry = memory_registry(vec![
            MemoryDataset::rects("a", &[(0.0, 0.0, 10.0, 10.0)]),
            MemoryDataset::rects("b", &[(5.0, 5.0, 15.0, 15.0)]),
            MemoryDataset::rects("c", &[]),
        ]);
        let source = DataSource::open_with(&registry, "memory", &ConnectionConfig::new()).unwrap();
        (session, source)
    }

    #[test]
    fn extent_is_the_union() {
        let (_session, source) = source();
        let layers = [source.layer("a").unwrap(), source.layer("b").unwrap()];
        assert_eq!(combined_extent(&layers).unwrap(), Rect::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn invalid_requests() {
        let (session, source) = source();
        let renderer = session.renderer();

        let err = renderer.render(&[], 10, 10, Color::WHITE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRenderRequest);

        let layer = source.layer("a").unwrap();
        let err = renderer.render(&[layer.clone()], 0, 10, Color::WHITE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRenderRequest);
        let err = renderer.render(&[layer], 10, 0, Color::WHITE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRenderRequest);
    }

    #[test]
    fn empty_layer_is_named() {
        let (session, source) = source();
        let layers = [source.layer("a").unwrap(), source.layer("c").unwrap()];
        let err = session
            .renderer()
            .render(&layers, 10, 10, Color::WHITE)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyDataset);
        assert_eq!(err.layer(), Some("c"));
        assert_eq!(source.open_cursor_count(), 0);
    }

    #[test]
    fn failed_draw_releases_cursors() {
        let (session, source) = source();
        let other = DataSource::open_with(
            &memory_registry(vec![MemoryDataset::rects("d", &[(0.0, 0.0, 1.0, 1.0)])]),
            "memory",
            &ConnectionConfig::new(),
        )
        .unwrap();

        let a = source.layer("a").unwrap();
        let d = other.layer("d").unwrap();
        a.extent().unwrap();
        d.extent().unwrap();
        other.close();

        // Extents are cached, so the failure comes from drawing `d` after `a` was drawn.
        let err = session
            .renderer()
            .render(&[a, d], 10, 10, Color::WHITE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceClosed);
        assert_eq!(err.layer(), Some("d"));
        assert_eq!(source.open_cursor_count(), 0);
    }

    struct InterruptedEngine;

    impl GeometryEngine for InterruptedEngine {
        fn bounds(&self, geometry: &cartograph_types::Geometry) -> Option<Rect> {
            PlanarBounds.bounds(geometry)
        }
    }

    impl RenderEngine for InterruptedEngine {
        fn draw(&self, _frame: &Frame, layers: &[Layer]) -> Result<RawImage, CartographError> {
            for layer in layers {
                layer.for_each_geometry(|_| {
                    Err(CartographError::RenderFailed("interrupted".into()))
                })?;
            }

            Ok(RawImage::new(vec![], 0, 0))
        }
    }

    #[test]
    fn interrupted_draw_releases_cursors() {
        let (_session, source) = source();
        let layer = source.layer("b").unwrap();

        let err = Renderer::new(Arc::new(InterruptedEngine))
            .render(&[layer], 10, 10, Color::WHITE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
        assert_eq!(source.open_cursor_count(), 0);
    }

    #[test]
    fn closed_source_is_named() {
        let (session, source) = source();
        let layer = source.layer("b").unwrap();
        source.close();

        let err = session
            .renderer()
            .render(&[layer], 10, 10, Color::WHITE)
            .unwrap_err();
        assert_matches!(
            &err,
            CartographError::Layer { layer, source } if layer == "b" && source.kind() == ErrorKind::SourceClosed
        );
    }

    #[test]
    fn engine_output_is_checked() {
        let (_session, source) = source();
        let renderer = Renderer::new(Arc::new(WrongSizeEngine));
        let err = renderer
            .render(&[source.layer("a").unwrap()], 4, 4, Color::WHITE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImageEncodingFailed);
    }

    #[test]
    fn request_output() {
        let (session, source) = source();
        let request = RenderRequest::new(30, 20)
            .with_layer(source.layer("a").unwrap())
            .with_background(Color::BLACK)
            .with_format(OutputFormat::Jpeg { quality: 75 });

        let image = session.renderer().render_request(&request).unwrap();
        assert_eq!(image.format(), OutputFormat::Jpeg { quality: 75 });
        assert_eq!((image.width(), image.height()), (30, 20));
        assert!(!image.is_empty());

        let decoded = image::load_from_memory(image.bytes()).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (30, 20));
    }
}
