//! The [`DescriptorBackend`] trait abstracts the handful of device calls a descriptor allocator needs.
//! It is implemented for [`Device`], and can be implemented by test doubles to simulate pool exhaustion.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

use crate::core::device::ExtensionID;
use crate::descriptor::descriptor_pool::DescriptorPoolSize;
use crate::Device;

/// Device capabilities required to manage descriptor pools.
pub trait DescriptorBackend: Clone {
    /// Create a new descriptor pool able to hold `size` descriptors.
    /// # Errors
    /// Failure to create a pool is fatal, the allocator cannot grow any further.
    fn create_pool(&self, size: &DescriptorPoolSize) -> Result<vk::DescriptorPool>;

    /// Allocate a single descriptor set with the given layout from a pool.
    /// Must report an exhausted pool through `ERROR_OUT_OF_POOL_MEMORY` or `ERROR_FRAGMENTED_POOL`.
    fn allocate_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet>;

    /// Destroy a descriptor pool. All sets allocated from it become invalid.
    fn destroy_pool(&self, pool: vk::DescriptorPool);

    /// Whether pools should reserve room for acceleration structure descriptors.
    fn acceleration_structures_enabled(&self) -> bool {
        false
    }
}

impl DescriptorBackend for Device {
    fn create_pool(&self, size: &DescriptorPoolSize) -> Result<vk::DescriptorPool> {
        let pool_sizes = size
            .iter()
            .map(|(descriptor_type, count)| vk::DescriptorPoolSize {
                ty: descriptor_type,
                descriptor_count: count,
            })
            .collect::<Vec<vk::DescriptorPoolSize>>();
        // No FREE_DESCRIPTOR_SET flag: sets are never freed individually, the whole pool goes at once.
        let info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(size.max_sets())
            .pool_sizes(pool_sizes.as_slice());
        let handle = unsafe { self.create_descriptor_pool(&info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorPool {handle:p}");
        Ok(handle)
    }

    fn allocate_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet> {
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&layout));
        let sets = unsafe { self.allocate_descriptor_sets(&info)? };
        sets.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pool(&self, pool: vk::DescriptorPool) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorPool {pool:p}");
        unsafe {
            self.destroy_descriptor_pool(pool, None);
        }
    }

    fn acceleration_structures_enabled(&self) -> bool {
        self.is_extension_enabled(ExtensionID::AccelerationStructure)
    }
}
