//! GPU context and initialization
//!
//! Adapter discovery distinguishes "no GPU found" (expected on headless
//! machines) from "GPU found but failed to initialize" (worth a warning).

use crate::error::SurfaceError;

/// Result of a GPU initialization attempt
#[derive(Debug)]
pub enum GpuInitResult {
    /// GPU initialized successfully
    #[cfg(feature = "gpu")]
    Success(GpuContext),
    /// No GPU adapter found
    NoGpuFound,
    /// GPU found but initialization failed
    InitFailed {
        /// Name of the adapter that failed
        adapter_name: String,
        /// Error message
        error: String,
    },
}

impl GpuInitResult {
    /// Collapse the failure variants into a [`SurfaceError`].
    #[cfg(feature = "gpu")]
    pub fn into_context(self) -> Result<GpuContext, SurfaceError> {
        match self {
            Self::Success(context) => Ok(context),
            Self::NoGpuFound => Err(SurfaceError::NoAdapter),
            Self::InitFailed {
                adapter_name,
                error,
            } => Err(SurfaceError::DeviceFailed {
                adapter_name,
                error,
            }),
        }
    }

    #[cfg(not(feature = "gpu"))]
    pub fn into_context(self) -> Result<std::convert::Infallible, SurfaceError> {
        match self {
            Self::NoGpuFound => Err(SurfaceError::NoAdapter),
            Self::InitFailed {
                adapter_name,
                error,
            } => Err(SurfaceError::DeviceFailed {
                adapter_name,
                error,
            }),
        }
    }
}

#[cfg(feature = "gpu")]
mod gpu_impl {
    use super::GpuInitResult;
    use tracing::{debug, info};

    /// Instance, adapter, device and queue for one mount.
    ///
    /// The instance and adapter are kept so a window surface can be created
    /// and configured against the same adapter the device came from.
    #[derive(Debug)]
    pub struct GpuContext {
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: wgpu::AdapterInfo,
    }

    impl GpuContext {
        /// Initialize a device without a presentation surface.
        #[allow(clippy::new_ret_no_self)]
        pub fn new() -> GpuInitResult {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            Self::with_instance(instance, None)
        }

        /// Initialize a device compatible with `surface`, if given.
        pub fn with_instance(
            instance: wgpu::Instance,
            surface: Option<&wgpu::Surface<'_>>,
        ) -> GpuInitResult {
            info!("Attempting to initialize GPU context");

            let adapter = if let Some(a) =
                pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: surface,
                    force_fallback_adapter: false,
                })) {
                debug!("Found GPU adapter: {}", a.get_info().name);
                a
            } else {
                debug!("No GPU adapter found");
                return GpuInitResult::NoGpuFound;
            };

            let adapter_info = adapter.get_info();
            let adapter_name = adapter_info.name.clone();

            match pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Constellation GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )) {
                Ok((device, queue)) => {
                    info!("GPU context initialized successfully: {}", adapter_name);
                    GpuInitResult::Success(Self {
                        instance,
                        adapter,
                        device,
                        queue,
                        adapter_info,
                    })
                }
                Err(e) => {
                    debug!("Failed to create GPU device: {}", e);
                    GpuInitResult::InitFailed {
                        adapter_name,
                        error: e.to_string(),
                    }
                }
            }
        }

        #[must_use]
        pub fn adapter_name(&self) -> &str {
            &self.adapter_info.name
        }

        /// Whether vertex buffers of the given sizes fit the device limits.
        #[must_use]
        pub fn can_allocate(&self, vertex_bytes: u64) -> bool {
            vertex_bytes <= self.device.limits().max_buffer_size
        }

        #[must_use]
        pub fn instance(&self) -> &wgpu::Instance {
            &self.instance
        }

        #[must_use]
        pub fn adapter(&self) -> &wgpu::Adapter {
            &self.adapter
        }

        #[must_use]
        pub fn device(&self) -> &wgpu::Device {
            &self.device
        }

        #[must_use]
        pub fn queue(&self) -> &wgpu::Queue {
            &self.queue
        }
    }

}

#[cfg(feature = "gpu")]
pub use gpu_impl::GpuContext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_map_to_surface_errors() {
        assert_eq!(
            GpuInitResult::NoGpuFound.into_context().unwrap_err(),
            SurfaceError::NoAdapter
        );
        let failed = GpuInitResult::InitFailed {
            adapter_name: "Test Adapter".to_string(),
            error: "device lost".to_string(),
        };
        assert!(matches!(
            failed.into_context(),
            Err(SurfaceError::DeviceFailed { ref adapter_name, .. }) if adapter_name == "Test Adapter"
        ));
    }
}
