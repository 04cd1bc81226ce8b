//! Traits for recording the commands the renderer issues around each pass.

use ash::vk;

use crate::command_buffer::state::RenderingInfo;

/// Records synchronization and dynamic rendering commands.
pub trait BarrierRecorder {
    /// Record image barriers. Equivalent of `vkCmdPipelineBarrier2` with a dependency on images only.
    fn pipeline_barrier(&mut self, barriers: &[vk::ImageMemoryBarrier2]);

    /// Begin a dynamic rendering scope. Equivalent of `vkCmdBeginRendering`.
    fn begin_rendering(&mut self, info: &RenderingInfo);

    /// End the current rendering scope. Equivalent of `vkCmdEndRendering`.
    fn end_rendering(&mut self);
}
