//! The [`AttachmentBackend`] trait creates the images backing render graph attachments.
//!
//! [`VulkanAttachmentBackend`] creates real images with memory from an [`Allocator`]. Test code can substitute
//! a backend that hands out fake handles.

use anyhow::Result;
use ash::vk;

use crate::resource::image::{Image, ImageCreateInfo, ImageView};
use crate::{Allocator, DefaultAllocator, Device, MemoryType};

/// Describes a single attachment image to create.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentImageInfo {
    /// Size of the image
    pub extent: vk::Extent2D,
    /// Pixel format
    pub format: vk::Format,
    /// Full usage flags of the image
    pub usage: vk::ImageUsageFlags,
    /// Number of samples
    pub samples: vk::SampleCountFlags,
    /// Aspect of the image view
    pub aspect: vk::ImageAspectFlags,
    /// Whether the image is a transient multisample target that never leaves its render pass.
    pub transient: bool,
}

/// Creates images for attachment containers.
pub trait AttachmentBackend {
    /// An owned image together with its view. Dropping it destroys both.
    type Image;

    /// Create a new image and a view covering all of it.
    /// # Errors
    /// Any failure to create the image, its memory or its view.
    fn create_image(&mut self, info: &AttachmentImageInfo) -> Result<Self::Image>;

    /// Raw image and view handles of an image created by this backend.
    fn handles(image: &Self::Image) -> (vk::Image, vk::ImageView);
}

/// Attachment image created by a [`VulkanAttachmentBackend`].
#[derive(Debug)]
pub struct AttachmentImage<A: Allocator = DefaultAllocator> {
    // Fields drop in declaration order, the view must go before its image.
    view: ImageView,
    image: Image<A>,
}

impl<A: Allocator> AttachmentImage<A> {
    /// The image view
    pub fn view(&self) -> &ImageView {
        &self.view
    }

    /// The image
    pub fn image(&self) -> &Image<A> {
        &self.image
    }
}

/// Creates attachment images on a Vulkan device, with memory from `A`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanAttachmentBackend<A: Allocator = DefaultAllocator> {
    #[derivative(Debug = "ignore")]
    device: Device,
    #[derivative(Debug = "ignore")]
    allocator: A,
}

impl<A: Allocator> VulkanAttachmentBackend<A> {
    /// Create a new attachment backend.
    pub fn new(device: Device, allocator: A) -> Self {
        Self {
            device,
            allocator,
        }
    }
}

impl<A: Allocator> AttachmentBackend for VulkanAttachmentBackend<A> {
    type Image = AttachmentImage<A>;

    fn create_image(&mut self, info: &AttachmentImageInfo) -> Result<Self::Image> {
        let image = Image::new(
            self.device.clone(),
            &mut self.allocator,
            ImageCreateInfo {
                width: info.extent.width,
                height: info.extent.height,
                usage: info.usage,
                format: info.format,
                samples: info.samples,
                memory: if info.transient {
                    MemoryType::Transient
                } else {
                    MemoryType::GpuOnly
                },
            },
        )?;
        let view = image.whole_view(info.aspect)?;
        Ok(AttachmentImage {
            view,
            image,
        })
    }

    fn handles(image: &Self::Image) -> (vk::Image, vk::ImageView) {
        unsafe { (image.image.handle(), image.view.handle()) }
    }
}
