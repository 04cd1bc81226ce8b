//! The [`DescriptorAllocator`] hands out descriptor sets from a growable collection of [`DescriptorPool`]s.
//!
//! Allocations always target a single *current* pool. When it runs out of space, the allocator grabs a fresh pool
//! (creating a whole batch of them when none are left) and makes that the current pool. Pools that ran out of space
//! are retired once every set allocated from them has been released, and destroyed a few frames later.

use anyhow::Result;
use ash::vk;
use static_assertions::assert_impl_all;

use crate::core::device::Device;
use crate::core::settings::DescriptorAllocatorSettings;
use crate::descriptor::backend::DescriptorBackend;
use crate::descriptor::descriptor_pool::{DescriptorPool, DescriptorPoolSize, PoolId};
use crate::util::deferred_delete::DeletionQueue;
use crate::Error;

/// A descriptor set allocated through a [`DescriptorAllocator`]. Remembers the pool it came from so it can be
/// released again with [`DescriptorAllocator::release()`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "Allocated descriptor sets must be released through the allocator"]
pub struct AllocatedSet {
    handle: vk::DescriptorSet,
    pool: PoolId,
}

impl AllocatedSet {
    /// Get unsafe access to the raw descriptor set handle.
    /// # Safety
    /// The handle must not be used after the set was released and its pool destroyed.
    pub unsafe fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }

    /// Identity of the pool this set was allocated from.
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

/// Growable descriptor set allocator.
///
/// # Example
/// ```
/// # use deimos::*;
/// # fn example(device: Device, layout: vk::DescriptorSetLayout) -> anyhow::Result<()> {
/// let mut allocator = DescriptorAllocator::new(device, DescriptorAllocatorSettings::default())?;
/// let set = allocator.allocate(layout)?;
/// // ... write and bind the set
/// allocator.release(set)?;
/// // Once per frame, so retired pools can be destroyed.
/// allocator.next_frame();
/// # Ok(())
/// # }
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorAllocator<B: DescriptorBackend = Device> {
    #[derivative(Debug = "ignore")]
    backend: B,
    settings: DescriptorAllocatorSettings,
    size: DescriptorPoolSize,
    active_pools: Vec<DescriptorPool<B>>,
    free_pools: Vec<DescriptorPool<B>>,
    /// Index into `active_pools`.
    current: usize,
    next_id: u64,
    deferred_pool_delete: DeletionQueue<DescriptorPool<B>>,
}

assert_impl_all!(DescriptorAllocator: Send, Sync);

impl<B: DescriptorBackend> DescriptorAllocator<B> {
    /// Create a new descriptor allocator. This immediately creates the first batch of pools.
    /// # Errors
    /// * Fails if the settings are out of range, see [`DescriptorAllocatorSettings::validate()`].
    /// * Fails if creating the initial descriptor pools fails.
    pub fn new(backend: B, settings: DescriptorAllocatorSettings) -> Result<Self> {
        settings.validate()?;
        let mut size = DescriptorPoolSize::new(settings.descriptors_per_type, settings.max_sets_per_pool);
        if backend.acceleration_structures_enabled() {
            size = size.with(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR, settings.descriptors_per_type);
        }
        let mut allocator = Self {
            backend,
            settings,
            size,
            active_pools: vec![],
            free_pools: vec![],
            current: 0,
            next_id: 0,
            deferred_pool_delete: DeletionQueue::new(settings.pool_deletion_delay),
        };
        allocator.grab_or_create_new_pool()?;
        Ok(allocator)
    }

    /// Allocate a descriptor set with the given layout from the current pool.
    /// If the current pool is full, a new pool becomes the current pool and the allocation is retried once.
    /// # Errors
    /// * Fails if a new pool was needed but could not be created.
    /// * Fails with [`Error::DescriptorAllocationFailed`] if the allocation also fails on a fresh pool.
    /// * Fails if the device reports an error that does not indicate an exhausted pool.
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<AllocatedSet> {
        if let Some(set) = self.active_pools[self.current].try_allocate(layout)? {
            return Ok(self.allocated(set));
        }

        let exhausted = self.active_pools[self.current].id();
        debug!("Descriptor pool {exhausted} is exhausted, rotating to a new pool");
        // The current pool is reassigned before the exhausted one is considered for destruction.
        self.grab_or_create_new_pool()?;
        if let Some(index) = self.position(exhausted) {
            self.retire_if_eligible(index);
        }

        match self.active_pools[self.current].try_allocate(layout)? {
            Some(set) => Ok(self.allocated(set)),
            None => Err(Error::DescriptorAllocationFailed {
                layout,
            }
            .into()),
        }
    }

    /// Release a descriptor set. Once every set of an exhausted pool is released, that pool is retired.
    /// # Errors
    /// * Fails with [`Error::UnknownDescriptorPool`] if the set's pool is not an active pool of this allocator.
    pub fn release(&mut self, set: AllocatedSet) -> Result<()> {
        self.release_from(set.pool)
    }

    /// Release one set allocated from the given pool. Prefer [`DescriptorAllocator::release()`], which
    /// makes it impossible to release the same set twice.
    /// # Errors
    /// * Fails with [`Error::UnknownDescriptorPool`] if the pool is not an active pool of this allocator.
    /// * Fails with [`Error::DescriptorPoolUnderflow`] if the pool has no live sets.
    pub fn release_from(&mut self, pool: PoolId) -> Result<()> {
        let index = self
            .position(pool)
            .ok_or(Error::UnknownDescriptorPool(pool))?;
        self.active_pools[index].release()?;
        self.retire_if_eligible(index);
        Ok(())
    }

    /// Advance the allocator to the next frame. Retired pools whose delay has passed are destroyed.
    pub fn next_frame(&mut self) {
        self.deferred_pool_delete.next_frame();
    }

    /// The pool new allocations are served from.
    pub fn current_pool(&self) -> PoolId {
        self.active_pools[self.current].id()
    }

    /// Look up an active pool.
    pub fn pool(&self, id: PoolId) -> Option<&DescriptorPool<B>> {
        self.active_pools.iter().find(|pool| pool.id() == id)
    }

    /// Iterate over all active pools.
    pub fn active_pools(&self) -> impl Iterator<Item = &DescriptorPool<B>> {
        self.active_pools.iter()
    }

    /// Number of pools that sets were allocated from and that are not retired yet.
    pub fn active_pool_count(&self) -> usize {
        self.active_pools.len()
    }

    /// Number of created pools that were never used.
    pub fn free_pool_count(&self) -> usize {
        self.free_pools.len()
    }

    /// Number of retired pools waiting for their deletion delay to pass.
    pub fn pending_destruction_count(&self) -> usize {
        self.deferred_pool_delete.len()
    }

    /// Total number of live sets over all active pools.
    pub fn live_set_count(&self) -> u32 {
        self.active_pools.iter().map(|pool| pool.live_set_count()).sum()
    }

    /// Descriptor capacity of each pool created by this allocator.
    pub fn pool_size(&self) -> &DescriptorPoolSize {
        &self.size
    }

    fn allocated(&self, handle: vk::DescriptorSet) -> AllocatedSet {
        AllocatedSet {
            handle,
            pool: self.active_pools[self.current].id(),
        }
    }

    fn position(&self, id: PoolId) -> Option<usize> {
        self.active_pools.iter().position(|pool| pool.id() == id)
    }

    /// Retire the pool at `index` if it is empty and exhausted. The current pool is never retired.
    fn retire_if_eligible(&mut self, index: usize) {
        if index == self.current || !self.active_pools[index].is_eligible_for_destruction() {
            return;
        }
        let pool = self.active_pools.remove(index);
        if index < self.current {
            self.current -= 1;
        }
        debug!("Retiring descriptor pool {}", pool.id());
        self.deferred_pool_delete.push(pool);
    }

    fn create_pool(&mut self) -> Result<DescriptorPool<B>> {
        let id = PoolId(self.next_id);
        self.next_id += 1;
        DescriptorPool::new(self.backend.clone(), id, &self.size)
    }

    /// Make a fresh pool the current pool, creating a batch of new pools if no free pool is left.
    fn grab_or_create_new_pool(&mut self) -> Result<()> {
        if self.free_pools.is_empty() {
            for _ in 0..self.settings.pools_per_batch {
                let pool = self.create_pool()?;
                self.free_pools.push(pool);
            }
            info!(
                "Created {} new descriptor pools. {}",
                self.free_pools.len(),
                self.size
            );
        }
        let pool = self
            .free_pools
            .pop()
            .ok_or(Error::Uncategorized("Descriptor pool batch is empty"))?;
        self.active_pools.push(pool);
        self.current = self.active_pools.len() - 1;
        Ok(())
    }
}
