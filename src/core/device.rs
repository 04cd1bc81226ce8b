//! Wrapper around an externally created `VkDevice`.
//!
//! Device creation (instance, physical device selection, queue setup) is the job of the application.
//! Deimos only consumes the resulting [`ash::Device`] together with a little bit of information about how
//! it was created.

use std::collections::HashSet;
use std::fmt::Formatter;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::Result;

/// Device extensions that change how deimos creates objects.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum ExtensionID {
    /// `VK_KHR_acceleration_structure`. Descriptor pools reserve room for acceleration structure descriptors.
    AccelerationStructure,
}

impl std::fmt::Display for ExtensionID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    queue_families: Vec<u32>,
    extensions: HashSet<ExtensionID>,
}

/// Cheaply clonable handle to a `VkDevice`. Internal state is wrapped in an `Arc<DeviceInner>`.
///
/// The device must have `synchronization2` and `dynamic_rendering` enabled.
/// The wrapped device is not destroyed when the last copy is dropped, its lifetime is owned by the application.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Wrap an existing device.
    /// * `queue_families` - All queue families that queues were requested from. Used to pick a sharing mode for images.
    /// * `extensions` - Optional extensions that were enabled on this device.
    pub fn new(handle: ash::Device, queue_families: Vec<u32>, extensions: impl IntoIterator<Item = ExtensionID>) -> Self {
        Device {
            inner: Arc::new(DeviceInner {
                handle,
                queue_families,
                extensions: extensions.into_iter().collect(),
            }),
        }
    }

    /// Wait for the device to be completely idle.
    /// This should not be used as a synchronization measure, except on exit and swapchain recreation.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { Ok(self.inner.handle.device_wait_idle()?) }
    }

    /// Get unsafe access to the underlying VkDevice handle
    /// # Safety
    /// * The caller should not call `vkDestroyDevice` on this while deimos objects are alive.
    pub unsafe fn handle(&self) -> ash::Device {
        self.inner.handle.clone()
    }

    /// Get the queue families we requested on this device.
    pub fn queue_families(&self) -> &[u32] {
        self.inner.queue_families.as_slice()
    }

    /// Check if an extension is enabled.
    pub fn is_extension_enabled(&self, ext: ExtensionID) -> bool {
        self.inner.extensions.contains(&ext)
    }

    /// True we only have a single queue family, and thus the sharing mode for resources is always EXCLUSIVE.
    pub fn is_single_queue(&self) -> bool {
        self.inner.queue_families.len() <= 1
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}

impl From<ash::Device> for Device {
    fn from(handle: ash::Device) -> Self {
        Device::new(handle, vec![], [])
    }
}
