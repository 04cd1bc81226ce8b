//! Traits for plugging a custom memory allocator into deimos.

use anyhow::Result;
use ash::vk;

use crate::allocator::memory_type::MemoryType;

/// A GPU memory allocator. Allocators are cheap to clone handles to shared state.
pub trait Allocator: Clone + Send + Sync {
    /// Allocation type returned by this allocator. Dropping it must free the memory.
    type Allocation: Allocation;

    /// Allocate memory satisfying the given requirements. The name is used for debugging.
    fn allocate(&mut self, name: &str, requirements: &vk::MemoryRequirements, ty: MemoryType) -> Result<Self::Allocation>;

    /// Explicitly free an allocation.
    fn free(&mut self, allocation: Self::Allocation) -> Result<()>;
}

/// A block of GPU memory that can be bound to an image.
pub trait Allocation: Send + Sync {
    /// Get unsafe access to the underlying `VkDeviceMemory`. Always use together with [`Allocation::offset()`].
    /// # Safety
    /// The memory must not be freed, and only the range of this allocation may be accessed.
    unsafe fn memory(&self) -> vk::DeviceMemory;

    /// Offset of this allocation inside its `VkDeviceMemory`.
    fn offset(&self) -> vk::DeviceSize;
}
