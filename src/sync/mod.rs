//! The sync module provides utilities dealing with frame-to-frame synchronization.
//!
//! - The [`fence`] module provides a wrapper around `VkFence` objects, used for CPU-GPU sync.
//! - The [`semaphore`] module provides a simple wrapper around `VkSemaphore` objects, used for GPU-GPU sync.
//! - The [`frame_backend`] module owns the per frame in flight resources the renderer cycles through.

pub mod fence;
pub mod frame_backend;
pub mod semaphore;
