//! Cartograph gives uniform access to spatial data backends and renders their datasets into
//! raster images.
//!
//! # Quick start
//!
//! ```ignore
//! use cartograph::{Color, ConnectionConfig, DataSource, Session};
//!
//! let session = Session::begin()?;
//!
//! let config = ConnectionConfig::new().with("URI", "./data");
//! let source = DataSource::open("file-vector", &config)?;
//! for name in source.dataset_names()? {
//!     println!("{name}");
//! }
//!
//! let layers = [source.layer("countries")?, source.layer("rivers")?.with_color(Color::BLUE)];
//! let image = session.renderer().render(&layers, 1000, 1000, Color::WHITE)?;
//! image.write_to("map.png")?;
//!
//! source.close();
//! session.end();
//! ```
//!
//! # Main components
//!
//! * A [`Session`] brackets all work. It sets up the backend registry and the render engine,
//!   and data sources cannot be opened outside of it.
//! * A [`DataSource`] is a connection to one backend, chosen by a type tag (`file-vector`,
//!   `spatial-db`) and configured with a [`ConnectionConfig`]. It lists named datasets and
//!   opens forward-only [`DatasetCursor`]s over their records.
//! * A [`Layer`] binds a dataset to a color and knows its spatial extent.
//! * A [`Renderer`] draws layers in order onto a canvas fit to their combined extent and
//!   encodes the result as a [`RenderedImage`].
//!
//! Backends beyond the built-in ones are added by implementing
//! [`BackendFactory`](data_source::BackendFactory) and registering it in a
//! [`BackendRegistry`](data_source::BackendRegistry).

mod color;
mod config;
pub mod data_source;
pub mod error;
pub mod layer;
pub mod render;
mod session;
mod view;

#[cfg(test)]
mod tests;

pub use color::Color;
pub use config::ConnectionConfig;
pub use data_source::{DataSource, DatasetCursor};
pub use error::{CartographError, ErrorKind};
pub use layer::Layer;
pub use render::{OutputFormat, RenderRequest, RenderedImage, Renderer};
pub use session::Session;
pub use view::CanvasView;

// Reexport cartograph_types so that consumers use the same version
pub use cartograph_types;
