//! A descriptor pool is one fixed-capacity arena that descriptor sets are carved from.
//! Pools are created and retired by the [`DescriptorAllocator`](crate::DescriptorAllocator), you never need to create one manually.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use anyhow::Result;
use ash::vk;

use crate::descriptor::backend::DescriptorBackend;
use crate::Error;

/// Identity of a descriptor pool within one allocator. Ids are never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub(crate) u64);

/// Defines how many descriptors a descriptor pool should be able to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    sizes: HashMap<vk::DescriptorType, u32>,
    max_sets: u32,
}

/// Memory pool for descriptor sets. Keeps track of how many sets allocated from it are still alive
/// and whether it ever ran out of space.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorPool<B: DescriptorBackend> {
    #[derivative(Debug = "ignore")]
    backend: B,
    id: PoolId,
    handle: vk::DescriptorPool,
    live_set_count: u32,
    exhausted: bool,
}

impl Display for PoolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl DescriptorPoolSize {
    /// Create a new descriptor pool size description. Every common descriptor type gets room for
    /// `min_capacity` descriptors.
    pub fn new(min_capacity: u32, max_sets: u32) -> Self {
        let mut sizes = HashMap::new();
        sizes.insert(vk::DescriptorType::SAMPLER, min_capacity);
        sizes.insert(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, min_capacity);
        sizes.insert(vk::DescriptorType::SAMPLED_IMAGE, min_capacity);
        sizes.insert(vk::DescriptorType::STORAGE_IMAGE, min_capacity);
        sizes.insert(vk::DescriptorType::UNIFORM_TEXEL_BUFFER, min_capacity);
        sizes.insert(vk::DescriptorType::STORAGE_TEXEL_BUFFER, min_capacity);
        sizes.insert(vk::DescriptorType::UNIFORM_BUFFER, min_capacity);
        sizes.insert(vk::DescriptorType::STORAGE_BUFFER, min_capacity);
        sizes.insert(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, min_capacity);
        sizes.insert(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, min_capacity);
        sizes.insert(vk::DescriptorType::INPUT_ATTACHMENT, min_capacity);
        Self {
            sizes,
            max_sets,
        }
    }

    /// Set the capacity for one descriptor type.
    pub fn with(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.sizes.insert(ty, count);
        self
    }

    /// Capacity for a descriptor type, zero if the pool cannot hold this type.
    pub fn get(&self, ty: vk::DescriptorType) -> u32 {
        self.sizes.get(&ty).copied().unwrap_or_default()
    }

    /// Iterate over all descriptor types and their capacity.
    pub fn iter(&self) -> impl Iterator<Item = (vk::DescriptorType, u32)> + '_ {
        self.sizes.iter().map(|(ty, count)| (*ty, *count))
    }

    /// Maximum number of sets in the pool.
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Display for DescriptorPoolSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut result = writeln!(f, "DescriptorPoolSize (max sets: {}", self.max_sets);
        for (ty, size) in &self.sizes {
            result = result.and_then(|_| writeln!(f, "{ty:?} => {size}"))
        }
        result.and_then(|_| write!(f, ")"))
    }
}

impl<B: DescriptorBackend> DescriptorPool<B> {
    /// Create a new descriptor pool
    pub(crate) fn new(backend: B, id: PoolId, size: &DescriptorPoolSize) -> Result<Self> {
        let handle = backend.create_pool(size)?;
        Ok(Self {
            backend,
            id,
            handle,
            live_set_count: 0,
            exhausted: false,
        })
    }

    /// Attempt to allocate one descriptor set from this pool.
    /// * Returns `Ok(Some(set))` on success.
    /// * Returns `Ok(None)` if the pool is out of memory or too fragmented. The pool is then marked as exhausted.
    /// # Errors
    /// Any other allocation failure is returned as an error.
    pub fn try_allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<Option<vk::DescriptorSet>> {
        match self.backend.allocate_set(self.handle, layout) {
            Ok(set) => {
                self.live_set_count += 1;
                Ok(Some(set))
            }
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(err) => Err(Error::from(err).into()),
        }
    }

    /// Release one set allocated from this pool. The set's memory is not returned to the pool,
    /// only the bookkeeping is updated.
    /// # Errors
    /// Fails with [`Error::DescriptorPoolUnderflow`] if no set from this pool is alive.
    pub fn release(&mut self) -> Result<()> {
        if self.live_set_count == 0 {
            return Err(Error::DescriptorPoolUnderflow.into());
        }
        self.live_set_count -= 1;
        Ok(())
    }

    /// A pool can be destroyed once it ran out of space and no set allocated from it is alive.
    pub fn is_eligible_for_destruction(&self) -> bool {
        self.live_set_count == 0 && self.exhausted
    }

    /// Number of sets allocated from this pool that were not released yet.
    pub fn live_set_count(&self) -> u32 {
        self.live_set_count
    }

    /// Whether an allocation from this pool ever failed because it was full.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Identity of this pool.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Get unsafe access to the raw Vulkan handle of this descriptor pool
    /// # Safety
    /// Allocating from or resetting this pool directly corrupts the bookkeeping of the allocator.
    pub unsafe fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }
}

impl<B: DescriptorBackend> Drop for DescriptorPool<B> {
    fn drop(&mut self) {
        self.backend.destroy_pool(self.handle);
    }
}
