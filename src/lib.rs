//! Growable descriptor set allocation and render graph attachment tracking for Vulkan.
//!
//! Deimos provides the two pieces of a renderer that are most tedious to get right by hand:
//! - A [`DescriptorAllocator`] that grows its collection of descriptor pools when they run out of space,
//! and destroys pools once every set allocated from them was released.
//! - [`RenderResources`], tracking the images behind every named attachment of a render graph together with
//! the synchronization state they were left in. The [`Renderer`] uses this to emit exactly the barriers each pass needs.
//!
//! Device, surface and swapchain creation stay with the application. Deimos only needs the resulting handles.
//!
//! # Example
//!
//! ```
//! use deimos::*;
//!
//! # fn example(device: Device, allocator: DefaultAllocator, swapchain: Swapchain, surface: SurfaceDetails,
//! #            queue: vk::Queue, family: u32) -> anyhow::Result<()> {
//! let settings = RenderSettingsBuilder::new()
//!     .frames_in_flight(2)
//!     .build()?;
//! let _descriptors = DescriptorAllocator::new(device.clone(), settings.descriptor_allocator())?;
//!
//! let backend = VulkanAttachmentBackend::new(device.clone(), allocator);
//! let mut resources = RenderResources::new(backend, &swapchain, &surface, &settings)?;
//! resources.create_color_attachment(AttachmentSpec::new("scene"), vk::SampleCountFlags::TYPE_4)?;
//!
//! let frames = VulkanFrameBackend::new(device, queue, family, settings.frames_in_flight)?;
//! let _renderer = Renderer::new(&settings, frames)?;
//! # Ok(())
//! # }
//! ```
//!
//! For further example code, check out the following modules
//! - [`descriptor`] for descriptor set allocation.
//! - [`graph`] for declaring attachments and passes.
//! - [`wsi`] for the frame loop.
//! - [`allocator`] for the memory allocators attachment images use.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod command_buffer;
pub mod core;
pub mod descriptor;
pub mod graph;
pub mod resource;
pub mod sync;
pub mod util;
pub mod wsi;
