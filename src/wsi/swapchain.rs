//! Presentation through a swapchain.
//!
//! The renderer talks to the swapchain through [`SwapchainInterface`]. [`Swapchain`] implements it on top of a
//! `VkSwapchainKHR` created by the application. Creating and recreating the swapchain itself is left to the application,
//! which should do so whenever [`SwapchainInterface::is_invalid()`] returns true.

use anyhow::Result;
use ash::vk;

use crate::resource::image::{Image, ImageView};
use crate::{Device, Error};

/// Result of an acquire or present operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SwapchainStatus<T> {
    /// The operation succeeded.
    Ready(T),
    /// The swapchain no longer matches the surface exactly. It should be recreated.
    Suboptimal,
    /// The swapchain can no longer be used with the surface and must be recreated.
    OutOfDate,
}

impl<T> SwapchainStatus<T> {
    /// Whether the swapchain must be rebuilt after this result.
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, SwapchainStatus::Ready(_))
    }
}

/// The operations the renderer needs from a swapchain.
pub trait SwapchainInterface {
    /// Number of images in the swapchain.
    fn image_count(&self) -> usize {
        self.images().len()
    }

    /// All swapchain images, ordered by image index.
    fn images(&self) -> &[vk::Image];

    /// A color view for each image in [`SwapchainInterface::images()`].
    fn views(&self) -> &[vk::ImageView];

    /// Image format of the swapchain images.
    fn format(&self) -> vk::Format;

    /// Size of the swapchain images.
    fn extent(&self) -> vk::Extent2D;

    /// Acquire the index of the next image to render to. `signal` is signaled once the image may be written to.
    /// # Errors
    /// Any result besides success, suboptimal and out-of-date is fatal.
    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> Result<SwapchainStatus<u32>>;

    /// Present an image once `wait` is signaled.
    /// # Errors
    /// Any result besides success, suboptimal and out-of-date is fatal.
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> Result<SwapchainStatus<()>>;

    /// Whether the swapchain was flagged for recreation.
    fn is_invalid(&self) -> bool;

    /// Flag the swapchain for recreation.
    fn invalidate(&mut self);
}

/// Swapchain wrapper implementing [`SwapchainInterface`].
///
/// The `VkSwapchainKHR` handle stays owned by the application and is not destroyed on drop. The image views
/// created for its images are.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    #[derivative(Debug = "ignore")]
    functions: ash::extensions::khr::Swapchain,
    present_queue: vk::Queue,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    view_handles: Vec<vk::ImageView>,
    // Views must be dropped before the images they were created from.
    #[derivative(Debug = "ignore")]
    views: Vec<ImageView>,
    #[derivative(Debug = "ignore")]
    managed_images: Vec<Image>,
    invalid: bool,
}

impl Swapchain {
    /// Wrap an existing swapchain. A view is created for every swapchain image.
    /// * `functions` - Loaded `VK_KHR_swapchain` functions.
    /// * `present_queue` - Queue that supports presenting to the surface of this swapchain.
    /// # Errors
    /// Fails if the swapchain images cannot be queried, or if creating a view fails.
    pub fn new(
        device: Device,
        functions: ash::extensions::khr::Swapchain,
        handle: vk::SwapchainKHR,
        present_queue: vk::Queue,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let images = unsafe { functions.get_swapchain_images(handle)? };
        let managed_images = images
            .iter()
            .map(|&image| Image::new_managed(device.clone(), image, format, extent, vk::ImageUsageFlags::COLOR_ATTACHMENT))
            .collect::<Vec<_>>();
        let views = managed_images
            .iter()
            .map(|image| image.whole_view(vk::ImageAspectFlags::COLOR))
            .collect::<Result<Vec<_>>>()?;
        let view_handles = views.iter().map(|view| unsafe { view.handle() }).collect();

        Ok(Self {
            handle,
            functions,
            present_queue,
            format,
            extent,
            images,
            view_handles,
            views,
            managed_images,
            invalid: false,
        })
    }

    /// Unsafe access to the underlying vulkan handle.
    /// # Safety
    /// The swapchain must not be destroyed while this wrapper is in use.
    pub unsafe fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Unsafe access to the swapchain extension functions.
    /// # Safety
    /// See [`Swapchain::handle()`].
    pub unsafe fn loader(&self) -> ash::extensions::khr::Swapchain {
        self.functions.clone()
    }
}

impl SwapchainInterface for Swapchain {
    fn images(&self) -> &[vk::Image] {
        &self.images
    }

    fn views(&self) -> &[vk::ImageView] {
        &self.view_handles
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> Result<SwapchainStatus<u32>> {
        let result = unsafe {
            self.functions
                .acquire_next_image(self.handle, u64::MAX, signal, vk::Fence::null())
        };
        match result {
            Ok((index, false)) => Ok(SwapchainStatus::Ready(index)),
            Ok((_, true)) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(SwapchainStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
            Err(err) => Err(Error::from(err).into()),
        }
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> Result<SwapchainStatus<()>> {
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(std::slice::from_ref(&wait))
            .swapchains(std::slice::from_ref(&self.handle))
            .image_indices(std::slice::from_ref(&image_index));
        let result = unsafe { self.functions.queue_present(self.present_queue, &info) };
        match result {
            Ok(false) => Ok(SwapchainStatus::Ready(())),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(SwapchainStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
            Err(err) => Err(Error::from(err).into()),
        }
    }

    fn is_invalid(&self) -> bool {
        self.invalid
    }

    fn invalidate(&mut self) {
        self.invalid = true;
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.views.clear();
        self.managed_images.clear();
    }
}
