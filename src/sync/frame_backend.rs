//! Per-frame synchronization and command recording resources.
//!
//! Each frame in flight owns a slot with a fence, two semaphores and a command pool. The renderer waits on a slot's
//! fence before it reuses the slot. This is the only point where the CPU blocks on the GPU during a frame.

use anyhow::Result;
use ash::vk;

use crate::command_buffer::command_pool::CommandPool;
use crate::command_buffer::recorder::CommandRecorder;
use crate::command_buffer::traits::BarrierRecorder;
use crate::sync::fence::Fence;
use crate::sync::semaphore::Semaphore;
use crate::{Device, Error};

/// Frame slot resources the renderer needs.
pub trait FrameBackend {
    /// Command recorder handed to passes.
    type Recorder: BarrierRecorder;

    /// Block until the GPU finished the last submission made from this slot.
    fn wait_for_frame(&mut self, slot: usize) -> Result<()>;

    /// Start recording the commands of a new frame in this slot.
    fn begin_frame(&mut self, slot: usize) -> Result<Self::Recorder>;

    /// Finish recording and submit. The submission waits on [`FrameBackend::image_ready()`] and signals
    /// [`FrameBackend::render_finished()`] and the slot's fence.
    fn submit_frame(&mut self, slot: usize, recorder: Self::Recorder) -> Result<()>;

    /// Semaphore signaled when the acquired swapchain image can be written to.
    fn image_ready(&self, slot: usize) -> vk::Semaphore;

    /// Semaphore signaled when the frame's commands completed. Presentation waits on it.
    fn render_finished(&self, slot: usize) -> vk::Semaphore;

    /// Bring every slot back to a clean state, after the swapchain was recreated.
    fn reset_frame_sync(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct PerFrame {
    fence: Fence,
    /// Signaled by the presentation engine when a swapchain image is ready.
    image_ready: Semaphore,
    /// Signaled by the GPU when all commands for a frame have been processed.
    /// We wait on this before presenting.
    render_finished: Semaphore,
    command_pool: CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl PerFrame {
    fn new(device: &Device, queue_family: u32) -> Result<Self> {
        let command_pool = CommandPool::new(device.clone(), queue_family, vk::CommandPoolCreateFlags::TRANSIENT)?;
        let command_buffer = command_pool.allocate_primary()?;
        Ok(Self {
            // Signaled, so the first wait on this slot returns immediately.
            fence: Fence::new(device.clone(), true)?,
            image_ready: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            command_pool,
            command_buffer,
        })
    }
}

/// [`FrameBackend`] submitting to a Vulkan queue.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanFrameBackend {
    #[derivative(Debug = "ignore")]
    device: Device,
    queue: vk::Queue,
    queue_family: u32,
    per_frame: Vec<PerFrame>,
}

impl VulkanFrameBackend {
    /// Create the resources for `frames_in_flight` frame slots.
    /// * `queue` - Graphics queue frames are submitted to.
    /// * `queue_family` - Family index of `queue`.
    pub fn new(device: Device, queue: vk::Queue, queue_family: u32, frames_in_flight: usize) -> Result<Self> {
        if !(2..=3).contains(&frames_in_flight) {
            return Err(Error::InvalidFramesInFlight(frames_in_flight).into());
        }
        let per_frame = (0..frames_in_flight)
            .map(|_| PerFrame::new(&device, queue_family))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            device,
            queue,
            queue_family,
            per_frame,
        })
    }

    fn slot(&self, slot: usize) -> Result<&PerFrame> {
        self.per_frame
            .get(slot)
            .ok_or_else(|| Error::Uncategorized("Frame slot out of range").into())
    }
}

impl FrameBackend for VulkanFrameBackend {
    type Recorder = CommandRecorder;

    fn wait_for_frame(&mut self, slot: usize) -> Result<()> {
        self.slot(slot)?.fence.wait()?;
        Ok(())
    }

    fn begin_frame(&mut self, slot: usize) -> Result<Self::Recorder> {
        let frame = self.slot(slot)?;
        frame.command_pool.reset()?;
        CommandRecorder::begin(self.device.clone(), frame.command_buffer)
    }

    fn submit_frame(&mut self, slot: usize, recorder: Self::Recorder) -> Result<()> {
        let frame = self.slot(slot)?;
        let command_buffer = recorder.finish()?;
        let wait = vk::SemaphoreSubmitInfo::builder()
            .semaphore(unsafe { frame.image_ready.handle() })
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build();
        let signal = vk::SemaphoreSubmitInfo::builder()
            .semaphore(unsafe { frame.render_finished.handle() })
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .build();
        let command_buffer_info = vk::CommandBufferSubmitInfo::builder()
            .command_buffer(command_buffer)
            .build();
        let submit = vk::SubmitInfo2::builder()
            .wait_semaphore_infos(std::slice::from_ref(&wait))
            .command_buffer_infos(std::slice::from_ref(&command_buffer_info))
            .signal_semaphore_infos(std::slice::from_ref(&signal))
            .build();
        // Only reset once we are certain something will signal the fence again.
        frame.fence.reset()?;
        unsafe {
            self.device
                .queue_submit2(self.queue, std::slice::from_ref(&submit), frame.fence.handle())?;
        }
        Ok(())
    }

    fn image_ready(&self, slot: usize) -> vk::Semaphore {
        self.per_frame
            .get(slot)
            .map(|frame| unsafe { frame.image_ready.handle() })
            .unwrap_or_default()
    }

    fn render_finished(&self, slot: usize) -> vk::Semaphore {
        self.per_frame
            .get(slot)
            .map(|frame| unsafe { frame.render_finished.handle() })
            .unwrap_or_default()
    }

    fn reset_frame_sync(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        // An abandoned frame can leave its image_ready semaphore signaled with nothing waiting on it.
        let device = self.device.clone();
        let family = self.queue_family;
        for frame in &mut self.per_frame {
            *frame = PerFrame::new(&device, family)?;
        }
        debug!("Reset synchronization of {} frames in flight", self.per_frame.len());
        Ok(())
    }
}
