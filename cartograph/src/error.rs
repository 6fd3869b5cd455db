//! Error types used by the crate.

use thiserror::Error;

/// Cartograph error type.
///
/// Every variant names the backend, dataset or layer it originated from, since one render
/// call can touch several of each.
#[derive(Debug, Error)]
pub enum CartographError {
    /// No backend is registered under the requested type tag.
    #[error("unsupported backend type '{backend}'")]
    UnsupportedBackend {
        /// Requested type tag.
        backend: String,
    },
    /// The backend rejected the connection configuration.
    #[error("failed to connect to '{backend}' backend: {reason}")]
    ConnectionFailed {
        /// Backend type tag.
        backend: String,
        /// Reason reported by the backend.
        reason: String,
    },
    /// A connection configuration could not be parsed.
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),
    /// The dataset is not among the names listed by the data source.
    #[error("dataset '{dataset}' not found in '{backend}' data source")]
    DatasetNotFound {
        /// Backend type tag.
        backend: String,
        /// Requested dataset name.
        dataset: String,
    },
    /// The data source was closed.
    #[error("'{backend}' data source is closed")]
    SourceClosed {
        /// Backend type tag.
        backend: String,
    },
    /// A value was requested while the cursor is not positioned on a record.
    #[error("cursor over dataset '{dataset}' is not positioned on a record")]
    CursorNotPositioned {
        /// Dataset of the cursor.
        dataset: String,
    },
    /// Property index is outside of `[0, property_count)`.
    #[error("property index {index} is out of bounds for dataset '{dataset}' with {count} properties")]
    IndexOutOfBounds {
        /// Dataset of the cursor.
        dataset: String,
        /// Requested index.
        index: usize,
        /// Number of properties.
        count: usize,
    },
    /// A typed accessor was used on a property of an incompatible type.
    #[error("property '{property}' of dataset '{dataset}' cannot be read as {expected}")]
    TypeMismatch {
        /// Dataset of the cursor.
        dataset: String,
        /// Name of the property.
        property: String,
        /// Requested type.
        expected: &'static str,
    },
    /// Dataset has no geometry to compute an extent from.
    #[error("dataset '{dataset}' has no geometries")]
    EmptyDataset {
        /// Dataset name.
        dataset: String,
    },
    /// Backend failed while listing or reading data.
    #[error("failed to read '{target}' from '{backend}' backend: {reason}")]
    ReadFailed {
        /// Backend type tag.
        backend: String,
        /// Dataset name, or the connection target when listing datasets.
        target: String,
        /// Underlying error.
        reason: String,
    },
    /// A color string is not in `#RRGGBB` or `#RRGGBBAA` form.
    #[error("invalid color '{0}'")]
    InvalidColor(String),
    /// Render request is malformed.
    #[error("invalid render request: {0}")]
    InvalidRenderRequest(String),
    /// Image codec could not decode the pixel buffer or encode the output.
    #[error("image encoding failed: {0}")]
    ImageEncodingFailed(String),
    /// Rendering engine failed to draw the frame.
    #[error("rendering failed: {0}")]
    RenderFailed(String),
    /// Session bracket could not be set up.
    #[error("session bootstrap failed: {0}")]
    Bootstrap(String),
    /// A data source was opened outside of an active session.
    #[error("no active session: call Session::begin() before opening data sources")]
    SessionInactive,
    /// An error raised on behalf of a layer.
    #[error("layer '{layer}': {source}")]
    Layer {
        /// Layer name.
        layer: String,
        /// Original error.
        #[source]
        source: Box<CartographError>,
    },
}

/// Flat classification of [`CartographError`] without context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CartographError::UnsupportedBackend`].
    UnsupportedBackend,
    /// See [`CartographError::ConnectionFailed`].
    ConnectionFailed,
    /// See [`CartographError::InvalidConfig`].
    InvalidConfig,
    /// See [`CartographError::DatasetNotFound`].
    DatasetNotFound,
    /// See [`CartographError::SourceClosed`].
    SourceClosed,
    /// See [`CartographError::CursorNotPositioned`].
    CursorNotPositioned,
    /// See [`CartographError::IndexOutOfBounds`].
    IndexOutOfBounds,
    /// See [`CartographError::TypeMismatch`].
    TypeMismatch,
    /// See [`CartographError::EmptyDataset`].
    EmptyDataset,
    /// See [`CartographError::ReadFailed`].
    ReadFailed,
    /// See [`CartographError::InvalidColor`].
    InvalidColor,
    /// See [`CartographError::InvalidRenderRequest`].
    InvalidRenderRequest,
    /// See [`CartographError::ImageEncodingFailed`].
    ImageEncodingFailed,
    /// See [`CartographError::RenderFailed`].
    RenderFailed,
    /// See [`CartographError::Bootstrap`].
    Bootstrap,
    /// See [`CartographError::SessionInactive`].
    SessionInactive,
}

impl CartographError {
    /// Kind of the error. Layer wrapping is looked through.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedBackend { .. } => ErrorKind::UnsupportedBackend,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::DatasetNotFound { .. } => ErrorKind::DatasetNotFound,
            Self::SourceClosed { .. } => ErrorKind::SourceClosed,
            Self::CursorNotPositioned { .. } => ErrorKind::CursorNotPositioned,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::EmptyDataset { .. } => ErrorKind::EmptyDataset,
            Self::ReadFailed { .. } => ErrorKind::ReadFailed,
            Self::InvalidColor(_) => ErrorKind::InvalidColor,
            Self::InvalidRenderRequest(_) => ErrorKind::InvalidRenderRequest,
            Self::ImageEncodingFailed(_) => ErrorKind::ImageEncodingFailed,
            Self::RenderFailed(_) => ErrorKind::RenderFailed,
            Self::Bootstrap(_) => ErrorKind::Bootstrap,
            Self::SessionInactive => ErrorKind::SessionInactive,
            Self::Layer { source, .. } => source.kind(),
        }
    }

    /// Name of the layer the error was raised for, if any.
    pub fn layer(&self) -> Option<&str> {
        match self {
            Self::Layer { layer, .. } => Some(layer),
            _ => None,
        }
    }

    /// Wraps the error with the name of the layer it was raised for. Errors that already
    /// name a layer are left as they are.
    pub(crate) fn for_layer(self, layer: &str) -> Self {
        match self {
            err @ Self::Layer { .. } => err,
            err => Self::Layer {
                layer: layer.to_owned(),
                source: Box::new(err),
            },
        }
    }
}

impl From<image::ImageError> for CartographError {
    fn from(value: image::ImageError) -> Self {
        Self::ImageEncodingFailed(value.to_string())
    }
}
