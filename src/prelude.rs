pub use ash::vk;

pub use crate::core::device::{Device, ExtensionID};
pub use crate::core::error::Error;
pub use crate::core::settings::*;

pub use crate::allocator::default_allocator;
pub use crate::allocator::default_allocator::DefaultAllocator;
pub use crate::allocator::memory_type::MemoryType;
pub use crate::allocator::traits::*;

pub use crate::descriptor::allocator::{AllocatedSet, DescriptorAllocator};
pub use crate::descriptor::backend::DescriptorBackend;
pub use crate::descriptor::descriptor_pool::{DescriptorPool, DescriptorPoolSize, PoolId};

pub use crate::resource::image::{Image, ImageCreateInfo, ImageView, ImgView};

pub use crate::graph::attachment::*;
pub use crate::graph::backend::{AttachmentBackend, AttachmentImage, AttachmentImageInfo, VulkanAttachmentBackend};
pub use crate::graph::name::NameHash;
pub use crate::graph::pass::{ClearColor, ClearDepthStencil, Pass, PassBuilder, PassContext, PassExecutor, PassResource};
pub use crate::graph::render_graph::{RenderGraph, RenderGraphBuilder};
pub use crate::graph::render_resources::{RenderResources, BACKBUFFER_INDEX, BACKBUFFER_NAME};
pub use crate::graph::resource::ResourceUsage;

pub use crate::command_buffer::recorder::CommandRecorder;
pub use crate::command_buffer::state::{RenderingAttachmentInfo, RenderingInfo};
pub use crate::command_buffer::traits::*;

pub use crate::sync::fence::Fence;
pub use crate::sync::frame_backend::{FrameBackend, VulkanFrameBackend};
pub use crate::sync::semaphore::Semaphore;

pub use crate::wsi::renderer::{FrameStatus, Renderer, UsedAttachment};
pub use crate::wsi::surface::{SurfaceDetails, SurfaceInterface};
pub use crate::wsi::swapchain::{Swapchain, SwapchainInterface, SwapchainStatus};

pub mod traits {
    pub use crate::allocator::traits::*;
    pub use crate::command_buffer::traits::*;
    pub use crate::descriptor::backend::DescriptorBackend;
    pub use crate::graph::backend::AttachmentBackend;
    pub use crate::graph::pass::PassExecutor;
    pub use crate::sync::frame_backend::FrameBackend;
    pub use crate::wsi::surface::SurfaceInterface;
    pub use crate::wsi::swapchain::SwapchainInterface;
}
