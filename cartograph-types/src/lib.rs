//! Geometric value types shared by the `cartograph` data sources and renderers.
//!
//! * [`Rect`] is the axis-aligned extent of geometries, layers and render frames.
//! * [`Size`] describes canvas and image dimensions.
//! * [`Geometry`] is the opaque value carried by geometry-typed dataset columns.

pub mod error;
mod geometry;
mod rect;
mod size;

pub use geometry::Geometry;
pub use rect::Rect;
pub use size::Size;

// Reexport geo-types so that consumers use the same version
pub use geo_types;
