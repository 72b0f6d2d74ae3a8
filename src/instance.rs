//! Graphics instance.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::{self, GpuBackend};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;

/// Entry point of the graphics system: owns the backend and creates devices.
pub struct GraphicsInstance {
    backend: Arc<dyn GpuBackend>,
}

assert_impl_all!(GraphicsInstance: Send, Sync);

impl GraphicsInstance {
    /// Create an instance on the default backend.
    pub fn new() -> Result<Arc<Self>, GraphicsError> {
        let backend = backend::create_backend()?;
        Ok(Self::with_backend(backend))
    }

    /// Create an instance over an explicitly constructed backend.
    ///
    /// This is how a Vulkan-backed instance is built: the caller creates the
    /// backend from its adopted device handles and passes it in.
    pub fn with_backend(backend: Arc<dyn GpuBackend>) -> Arc<Self> {
        log::debug!("Created graphics instance on {} backend", backend.name());
        Arc::new(Self { backend })
    }

    /// The active backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Create a logical device.
    pub fn create_device(self: &Arc<Self>) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        self.create_device_named(format!("{}-device", self.backend.name()))
    }

    /// Create a logical device with an explicit name.
    pub fn create_device_named(
        self: &Arc<Self>,
        name: impl Into<String>,
    ) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        Ok(GraphicsDevice::new(self.clone(), name.into()))
    }
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("backend", &self.backend.name())
            .finish()
    }
}
