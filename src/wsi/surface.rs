//! Information about the surface frames are rendered to.
//!
//! Surface creation is up to the application. Deimos only needs to know its size and the formats attachments
//! default to, which it reads through the [`SurfaceInterface`] trait.

use anyhow::Result;
use ash::vk;

use crate::Error;

/// Properties of a presentation surface.
pub trait SurfaceInterface {
    /// Current framebuffer extent of the surface.
    fn extent(&self) -> vk::Extent2D;
    /// Format of color attachments that do not specify one. This is usually the swapchain format.
    fn color_format(&self) -> vk::Format;
    /// Format of depth attachments that do not specify one.
    fn depth_format(&self) -> vk::Format;
}

/// Plain [`SurfaceInterface`] implementation holding values queried by the application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceDetails {
    /// Framebuffer extent
    pub extent: vk::Extent2D,
    /// Default color format
    pub color_format: vk::Format,
    /// Default depth format
    pub depth_format: vk::Format,
}

impl SurfaceInterface for SurfaceDetails {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn color_format(&self) -> vk::Format {
        self.color_format
    }

    fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Pick the first format from [`DEPTH_FORMAT_CANDIDATES`] that supports optimal tiling depth attachments.
/// # Errors
/// Fails if none of the candidates is supported.
pub fn choose_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|&format| {
            let properties = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
            properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| Error::Uncategorized("No supported depth format").into())
}
