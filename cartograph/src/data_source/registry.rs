use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::config::ConnectionConfig;
use crate::data_source::backend::Backend;
use crate::data_source::file_vector::FileVectorFactory;
use crate::error::CartographError;

/// Creates backend connections for one type tag.
pub trait BackendFactory: Send + Sync {
    /// Type tag the factory is registered under, e.g. `file-vector`.
    fn tag(&self) -> &str;
    /// Connects to the backend described by `config`.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Backend>, CartographError>;
}

lazy_static! {
    static ref GLOBAL_REGISTRY: BackendRegistry = BackendRegistry::with_builtin();
}

/// Mapping from backend type tags to the factories that connect them.
///
/// [`DataSource::open`](super::DataSource::open) uses the process-wide registry returned by
/// [`BackendRegistry::global`]. Tests and embedders that want isolation can build their own
/// registry and use [`DataSource::open_with`](super::DataSource::open_with).
#[derive(Default)]
pub struct BackendRegistry {
    factories: RwLock<Vec<Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all backends compiled into the crate.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(FileVectorFactory);
        #[cfg(feature = "postgis")]
        registry.register(crate::data_source::postgis::PostgisFactory);
        registry
    }

    /// Process-wide registry, populated with the built-in backends on first use.
    pub fn global() -> &'static BackendRegistry {
        &GLOBAL_REGISTRY
    }

    pub(crate) fn initialize_global() {
        lazy_static::initialize(&GLOBAL_REGISTRY);
    }

    /// Registers a factory under its tag. A factory already registered under the same tag is
    /// replaced and returned.
    pub fn register(
        &self,
        factory: impl BackendFactory + 'static,
    ) -> Option<Arc<dyn BackendFactory>> {
        let factory: Arc<dyn BackendFactory> = Arc::new(factory);
        let mut factories = self.factories.write();
        match factories.iter_mut().find(|f| f.tag() == factory.tag()) {
            Some(existing) => {
                log::debug!("Replacing backend factory '{}'", factory.tag());
                Some(std::mem::replace(existing, factory))
            }
            None => {
                log::debug!("Registering backend factory '{}'", factory.tag());
                factories.push(factory);
                None
            }
        }
    }

    /// Removes the factory registered under the tag. Returns false if there was none.
    pub fn unregister(&self, tag: &str) -> bool {
        let mut factories = self.factories.write();
        let before = factories.len();
        factories.retain(|f| f.tag() != tag);
        factories.len() != before
    }

    /// Registered tags, in registration order.
    pub fn tags(&self) -> Vec<String> {
        self.factories
            .read()
            .iter()
            .map(|f| f.tag().to_owned())
            .collect()
    }

    /// Returns true if a factory is registered under the tag.
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.read().iter().any(|f| f.tag() == tag)
    }

    /// Connects using the factory registered under `tag`.
    pub(crate) fn connect(
        &self,
        tag: &str,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Backend>, CartographError> {
        // The lock must not be held while connecting, which may take a while.
        let factory = self
            .factories
            .read()
            .iter()
            .find(|f| f.tag() == tag)
            .cloned()
            .ok_or_else(|| CartographError::UnsupportedBackend {
                backend: tag.to_owned(),
            })?;

        factory.connect(config)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::data_source::backend::RecordReader;

    struct NullBackend;

    impl Backend for NullBackend {
        fn dataset_names(&mut self) -> Result<Vec<String>, CartographError> {
            Ok(vec![])
        }

        fn open_reader(&mut self, dataset: &str) -> Result<Box<dyn RecordReader>, CartographError> {
            Err(CartographError::DatasetNotFound {
                backend: "null".into(),
                dataset: dataset.into(),
            })
        }
    }

    struct NullFactory(&'static str);

    impl BackendFactory for NullFactory {
        fn tag(&self) -> &str {
            self.0
        }

        fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Backend>, CartographError> {
            Ok(Box::new(NullBackend))
        }
    }

    #[test]
    fn builtin_backends() {
        let registry = BackendRegistry::with_builtin();
        assert!(registry.contains("file-vector"));
        #[cfg(feature = "postgis")]
        assert!(registry.contains("spatial-db"));
    }

    #[test]
    fn register_replaces_same_tag() {
        let registry = BackendRegistry::new();
        assert!(registry.register(NullFactory("null")).is_none());
        assert!(registry.register(NullFactory("other")).is_none());
        assert!(registry.register(NullFactory("null")).is_some());
        assert_eq!(registry.tags(), ["null", "other"]);

        assert!(registry.unregister("null"));
        assert!(!registry.unregister("null"));
        assert_eq!(registry.tags(), ["other"]);
    }

    #[test]
    fn unknown_tag() {
        let registry = BackendRegistry::new();
        let err = registry.connect("nope", &ConnectionConfig::new()).err().unwrap();
        assert_matches!(err, CartographError::UnsupportedBackend { backend } if backend == "nope");
    }
}
