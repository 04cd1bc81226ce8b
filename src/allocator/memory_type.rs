//! Exposes different memory types that determine where memory allocations should live.

/// The memory type of an allocation indicates where it should live.
/// Give this to an [`Allocator`](crate::Allocator) to let it decide where your allocation should live.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryType {
    /// GPU only accessible memory. Persistent attachments live here.
    GpuOnly,
    /// Memory for transient attachments whose contents never leave the render pass. Allocators that can
    /// use lazily allocated memory should do so, others fall back to GPU only memory.
    Transient,
}

impl From<MemoryType> for gpu_allocator::MemoryLocation {
    fn from(value: MemoryType) -> Self {
        match value {
            MemoryType::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
            // gpu-allocator has no lazily allocated memory location
            MemoryType::Transient => gpu_allocator::MemoryLocation::GpuOnly,
        }
    }
}
