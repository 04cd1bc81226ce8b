//! Command recording.
//!
//! The renderer records barriers and dynamic rendering scopes through the [`BarrierRecorder`](traits::BarrierRecorder) trait.
//! [`CommandRecorder`](recorder::CommandRecorder) implements it for a Vulkan command buffer. Passes receive the same
//! recorder in their execute function, and record their draw commands into it.

pub mod command_pool;
pub mod recorder;
pub mod state;
pub mod traits;
