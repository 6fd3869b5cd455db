//! Process-wide setup that must wrap all data access and rendering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data_source::BackendRegistry;
use crate::error::CartographError;
use crate::render::{RenderEngine, Renderer, SkiaEngine};

static ACTIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Guard of an active session.
///
/// Data sources can only be opened while at least one session is active. A session owns a
/// [`RenderEngine`]: the engine is initialized when the session begins and finalized when it
/// ends. Sessions can overlap; the process stays active until the last one ends.
///
/// ```ignore
/// let session = Session::begin()?;
/// let source = DataSource::open("file-vector", &config)?;
/// let image = session.renderer().render(&[source.layer("rivers")?], 512, 512, Color::WHITE)?;
/// session.end();
/// ```
pub struct Session {
    engine: Arc<dyn RenderEngine>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Begins a session that renders with [`SkiaEngine`].
    pub fn begin() -> Result<Self, CartographError> {
        Self::begin_with(Arc::new(SkiaEngine::new()))
    }

    /// Begins a session that renders with the given engine.
    ///
    /// Fails with [`CartographError::Bootstrap`] if the engine cannot be initialized; no
    /// session is started in that case.
    pub fn begin_with(engine: Arc<dyn RenderEngine>) -> Result<Self, CartographError> {
        BackendRegistry::initialize_global();

        engine.initialize().map_err(|err| match err {
            err @ CartographError::Bootstrap(_) => err,
            err => CartographError::Bootstrap(err.to_string()),
        })?;

        let active = ACTIVE_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("Session started ({active} active)");

        Ok(Self { engine })
    }

    /// Engine of the session.
    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    /// Renderer that draws with the session engine.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.engine.clone())
    }

    /// Ends the session. Same as dropping it.
    pub fn end(self) {}

    /// Returns true if any session is active in the process.
    pub fn is_active() -> bool {
        ACTIVE_SESSIONS.load(Ordering::SeqCst) > 0
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.engine.finalize();
        let active = ACTIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        log::info!("Session ended ({active} active)");
    }
}

pub(crate) fn ensure_active() -> Result<(), CartographError> {
    if Session::is_active() {
        Ok(())
    } else {
        Err(CartographError::SessionInactive)
    }
}
