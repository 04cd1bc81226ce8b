//! Exposes the deimos error type

use std::sync::PoisonError;

use ash::vk;
use gpu_allocator::AllocationError;
use thiserror::Error;

use crate::descriptor::descriptor_pool::PoolId;

/// Error type that deimos can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(vk::Result),
    /// Vulkan allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    AllocationError(AllocationError),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
    /// A descriptor set could not be allocated, not even from a freshly grabbed pool.
    /// Pools are sized far above what a single set can request, so this means the layout is invalid.
    #[error("Failed to allocate descriptor set with layout {layout:?}, even after growing the pool.")]
    DescriptorAllocationFailed {
        /// Layout that was requested
        layout: vk::DescriptorSetLayout,
    },
    /// Released more descriptor sets from a pool than were allocated from it.
    #[error("Released a descriptor set from a pool with no live sets.")]
    DescriptorPoolUnderflow,
    /// Released a descriptor set whose pool is not owned by this allocator (anymore).
    #[error("Descriptor pool `{0}` is not an active pool of this allocator.")]
    UnknownDescriptorPool(PoolId),
    /// No resource was registered under this name
    #[error("No resource bound to name `{0}`")]
    NoResourceBound(String),
    /// A resource with this name was already registered
    #[error("A resource named `{0}` already exists")]
    DuplicateResource(String),
    /// Attachment container index out of range.
    #[error("Attachment container index `{0}` is out of range.")]
    InvalidAttachmentIndex(usize),
    /// The image or frame index selects an attachment slot the container does not have.
    #[error("Attachment slot `{0}` is out of range.")]
    AttachmentSlotOutOfRange(usize),
    /// Requested a barrier towards a state that cannot be transitioned to.
    #[error("Invalid attachment transition from {from:?} to {to:?}.")]
    InvalidTransition {
        /// Layout the attachment is currently in
        from: vk::ImageLayout,
        /// Layout the pass requested
        to: vk::ImageLayout,
    },
    /// A pass clears an attachment, but no clear value was given.
    #[error("Attachment load op is CLEAR, but no clear value was specified.")]
    NoClearValue,
    /// Frames in flight must be either 2 or 3.
    #[error("Invalid number of frames in flight: `{0}`. Must be 2 or 3.")]
    InvalidFramesInFlight(usize),
    /// An attachment resolved to an empty extent.
    #[error("Attachment extent is invalid.")]
    InvalidExtent,
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::VkError(value)
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::AllocationError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
