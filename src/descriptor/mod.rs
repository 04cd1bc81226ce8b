//! This module handles allocation of descriptor sets.
//!
//! The main entry point is the [`DescriptorAllocator`](allocator::DescriptorAllocator). It owns a growing collection
//! of descriptor pools, removing the need to declare pool sizes upfront. Each allocated set remembers its pool,
//! so it can later be released through the same allocator.
//!
//! # Example
//!
//! ```
//! use deimos::*;
//!
//! # fn example(device: Device, layout: vk::DescriptorSetLayout) -> anyhow::Result<()> {
//! let settings = RenderSettingsBuilder::new().build()?;
//! let mut allocator = DescriptorAllocator::new(device, settings.descriptor_allocator())?;
//! let material_set = allocator.allocate(layout)?;
//! // When the material is destroyed
//! allocator.release(material_set)?;
//! # Ok(())
//! # }
//! ```
//!
//! The device calls used by the allocator go through the [`DescriptorBackend`](backend::DescriptorBackend) trait,
//! implemented for [`Device`](crate::Device).

pub mod allocator;
pub mod backend;
pub mod descriptor_pool;
