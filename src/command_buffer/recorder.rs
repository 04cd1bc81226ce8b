//! Records commands into a Vulkan command buffer.

use anyhow::Result;
use ash::vk;

use crate::command_buffer::state::RenderingInfo;
use crate::command_buffer::traits::BarrierRecorder;
use crate::Device;

/// A command buffer in the recording state. Created by [`CommandRecorder::begin()`], and finished with
/// [`CommandRecorder::finish()`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CommandRecorder {
    #[derivative(Debug = "ignore")]
    device: Device,
    handle: vk::CommandBuffer,
    in_rendering: bool,
}

impl CommandRecorder {
    /// Begin recording a one time submit command buffer. The command buffer must be in the initial state.
    /// # Errors
    /// Fails if `vkBeginCommandBuffer` fails.
    pub fn begin(device: Device, handle: vk::CommandBuffer) -> Result<Self> {
        let info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(handle, &info)? };
        Ok(Self {
            device,
            handle,
            in_rendering: false,
        })
    }

    /// End recording. Returns the command buffer handle, ready to be submitted.
    /// # Errors
    /// Fails if a rendering scope is still open, or if `vkEndCommandBuffer` fails.
    pub fn finish(self) -> Result<vk::CommandBuffer> {
        if self.in_rendering {
            return Err(crate::Error::Uncategorized("Command buffer finished inside a rendering scope").into());
        }
        unsafe { self.device.end_command_buffer(self.handle)? };
        Ok(self.handle)
    }

    /// Get unsafe access to the underlying `VkCommandBuffer`. Use this to record draw commands inside a pass.
    /// # Safety
    /// The command buffer must be left in the recording state, and no rendering scope may be begun or ended through it.
    pub unsafe fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// The device this command buffer was allocated from.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl BarrierRecorder for CommandRecorder {
    fn pipeline_barrier(&mut self, barriers: &[vk::ImageMemoryBarrier2]) {
        if barriers.is_empty() {
            return;
        }
        let dependency = vk::DependencyInfo::builder().image_memory_barriers(barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency);
        }
    }

    fn begin_rendering(&mut self, info: &RenderingInfo) {
        info.with_vulkan(|info| unsafe {
            self.device.cmd_begin_rendering(self.handle, info);
        });
        self.in_rendering = true;
    }

    fn end_rendering(&mut self) {
        unsafe {
            self.device.cmd_end_rendering(self.handle);
        }
        self.in_rendering = false;
    }
}
