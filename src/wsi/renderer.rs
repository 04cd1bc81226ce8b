//! The [`Renderer`] drives the frame loop: acquire a swapchain image, record every pass of a
//! [`RenderGraph`] with the barriers it needs, submit and present.
//!
//! Barriers are derived from the state each attachment was left in. Before a pass runs, every attachment it
//! declares is compared against the state the pass requires. If they differ a barrier is recorded, and the
//! stored state is updated. After presenting, every attachment touched this frame returns to the initial state.
//!
//! # Example
//! ```
//! # use deimos::*;
//! # fn example<B: AttachmentBackend, F: FrameBackend, S: SwapchainInterface, Surf: SurfaceInterface>(
//! #     frame_backend: F, mut resources: RenderResources<B>, mut swapchain: S, surface: Surf,
//! #     mut graph: RenderGraph<'_, F::Recorder>) -> anyhow::Result<()> {
//! let settings = RenderSettingsBuilder::new().build()?;
//! let mut renderer = Renderer::new(&settings, frame_backend)?;
//! loop {
//!     match renderer.render_frame(&mut graph, &mut resources, &mut swapchain)? {
//!         FrameStatus::Presented { .. } => {}
//!         FrameStatus::Abandoned => {
//!             // Recreate the swapchain, then
//!             resources.recreate(&swapchain, &surface)?;
//!             renderer.on_swapchain_recreated()?;
//!         }
//!     }
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::command_buffer::state::{RenderingAttachmentInfo, RenderingInfo};
use crate::command_buffer::traits::BarrierRecorder;
use crate::core::settings::RenderSettings;
use crate::graph::attachment::{AttachmentKind, BarrierState};
use crate::graph::backend::AttachmentBackend;
use crate::graph::pass::{Pass, PassContext};
use crate::graph::render_graph::RenderGraph;
use crate::graph::render_resources::{RenderResources, BACKBUFFER_INDEX};
use crate::graph::resource::ResourceUsage;
use crate::sync::frame_backend::FrameBackend;
use crate::wsi::swapchain::{SwapchainInterface, SwapchainStatus};
use crate::Error;

/// Outcome of [`Renderer::render_frame()`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    /// The frame was submitted and presented.
    Presented {
        /// Swapchain image the frame was rendered to
        image_index: u32,
        /// Frame in flight slot that was used
        frame_index: usize,
    },
    /// The swapchain is invalid. The frame was not presented, and no further frames will be until
    /// the swapchain is recreated.
    Abandoned,
}

/// An attachment slot touched during the current frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UsedAttachment {
    /// Container index
    pub container: usize,
    /// Swapchain image index the slot was selected with
    pub image_index: usize,
    /// Frame index the slot was selected with
    pub frame_index: usize,
    /// Whether this is the container's transient multisampled image
    pub transient: bool,
}

/// Records and presents frames. See the [module level documentation](crate::wsi::renderer).
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Renderer<F: FrameBackend> {
    #[derivative(Debug = "ignore")]
    backend: F,
    frames_in_flight: usize,
    frame_index: usize,
    used: Vec<UsedAttachment>,
}

impl<F: FrameBackend> Renderer<F> {
    /// Create a new renderer.
    /// # Errors
    /// Fails if the settings are invalid.
    pub fn new(settings: &RenderSettings, backend: F) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            backend,
            frames_in_flight: settings.frames_in_flight,
            frame_index: 0,
            used: vec![],
        })
    }

    /// Render and present a single frame.
    ///
    /// If the swapchain is invalid, or becomes invalid while acquiring or presenting, the frame is abandoned and
    /// [`FrameStatus::Abandoned`] is returned. This is not an error. The application should recreate the swapchain,
    /// call [`RenderResources::recreate()`] and [`Renderer::on_swapchain_recreated()`].
    /// # Errors
    /// * Fails if a pass uses a resource that was not bound, or an attachment slot that does not exist.
    /// * Fails if a pass executor fails.
    /// * Fails on any device error, including acquire and present errors other than out of date and suboptimal.
    pub fn render_frame<B: AttachmentBackend, S: SwapchainInterface>(
        &mut self,
        graph: &mut RenderGraph<'_, F::Recorder>,
        resources: &mut RenderResources<B>,
        swapchain: &mut S,
    ) -> Result<FrameStatus> {
        if swapchain.is_invalid() {
            return Ok(FrameStatus::Abandoned);
        }

        let frame_index = self.frame_index;
        self.backend.wait_for_frame(frame_index)?;
        let image_index = match swapchain.acquire_next_image(self.backend.image_ready(frame_index))? {
            SwapchainStatus::Ready(index) => index,
            status => {
                Self::invalidate(swapchain, status);
                return Ok(FrameStatus::Abandoned);
            }
        };

        let mut recorder = self.backend.begin_frame(frame_index)?;
        for pass in graph.passes.iter_mut() {
            self.record_pass(pass, resources, &mut recorder, image_index as usize, frame_index)?;
        }

        let backbuffer = resources.get_attachment(BACKBUFFER_INDEX, image_index as usize, frame_index)?;
        if let Some(barrier) = backbuffer.transition(BarrierState::PRESENT)? {
            trace!("Backbuffer {image_index}: {:?} -> {:?}", barrier.old_layout, barrier.new_layout);
            recorder.pipeline_barrier(std::slice::from_ref(&barrier));
        }
        self.backend.submit_frame(frame_index, recorder)?;

        let status = swapchain.present(image_index, self.backend.render_finished(frame_index))?;

        backbuffer_reset(resources, image_index as usize, frame_index)?;
        self.reset_used_attachments(resources)?;
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight;

        match status {
            SwapchainStatus::Ready(()) => Ok(FrameStatus::Presented {
                image_index,
                frame_index,
            }),
            status => {
                Self::invalidate(swapchain, status);
                Ok(FrameStatus::Abandoned)
            }
        }
    }

    /// Transition every resource a pass declares into the state the pass requires, and record the resulting barriers
    /// as a single batch. Transient multisampled images of attachments are transitioned along with them.
    /// Returns the number of barriers recorded, which is zero if every resource is already in the required state.
    /// # Errors
    /// * Fails with [`Error::NoResourceBound`] if the pass is not part of a built [`RenderGraph`].
    /// * Fails if an attachment slot does not exist, or a resource is required in an invalid state.
    pub fn apply_pass_barriers<B: AttachmentBackend, P, R: BarrierRecorder>(
        &mut self,
        pass: &Pass<'_, P>,
        resources: &mut RenderResources<B>,
        recorder: &mut R,
        image_index: usize,
        frame_index: usize,
    ) -> Result<usize> {
        let mut barriers = vec![];
        for resource in pass.resources() {
            let container = resource
                .container()
                .ok_or_else(|| Error::NoResourceBound(resource.name().to_owned()))?;
            let required = resource.usage().required_state();

            let attachment = resources.get_attachment(container, image_index, frame_index)?;
            barriers.extend(attachment.transition(required)?);
            self.mark_used(UsedAttachment {
                container,
                image_index,
                frame_index,
                transient: false,
            });

            if resource.usage().is_attachment() {
                if let Some(transient) = resources.transient_mut(container)? {
                    barriers.extend(transient.attachment.transition(required)?);
                    self.mark_used(UsedAttachment {
                        container,
                        image_index,
                        frame_index,
                        transient: true,
                    });
                }
            }
        }

        for barrier in &barriers {
            trace!(
                "Pass `{}`: image {:?} {:?} -> {:?}",
                pass.name(),
                barrier.image,
                barrier.old_layout,
                barrier.new_layout
            );
        }
        if !barriers.is_empty() {
            recorder.pipeline_barrier(&barriers);
        }
        Ok(barriers.len())
    }

    fn record_pass<B: AttachmentBackend>(
        &mut self,
        pass: &mut Pass<'_, F::Recorder>,
        resources: &mut RenderResources<B>,
        recorder: &mut F::Recorder,
        image_index: usize,
        frame_index: usize,
    ) -> Result<()> {
        self.apply_pass_barriers(pass, resources, recorder, image_index, frame_index)?;
        if pass.is_renderpass() {
            let info = rendering_info(pass, resources, image_index, frame_index)?;
            let ctx = PassContext {
                image_index,
                frame_index,
                render_area: info.render_area,
            };
            recorder.begin_rendering(&info);
            pass.execute.execute(recorder, &ctx)?;
            recorder.end_rendering();
        } else {
            let ctx = PassContext {
                image_index,
                frame_index,
                render_area: vk::Rect2D::default(),
            };
            pass.execute.execute(recorder, &ctx)?;
        }
        Ok(())
    }

    fn mark_used(&mut self, used: UsedAttachment) {
        if !self.used.contains(&used) {
            self.used.push(used);
        }
    }

    fn reset_used_attachments<B: AttachmentBackend>(&mut self, resources: &mut RenderResources<B>) -> Result<()> {
        for used in self.used.drain(..) {
            if used.transient {
                if let Some(transient) = resources.transient_mut(used.container)? {
                    transient.attachment.reset_state();
                }
            } else {
                resources
                    .get_attachment(used.container, used.image_index, used.frame_index)?
                    .reset_state();
            }
        }
        Ok(())
    }

    fn invalidate<S: SwapchainInterface, T>(swapchain: &mut S, status: SwapchainStatus<T>) {
        let reason = match status {
            SwapchainStatus::OutOfDate => "out of date",
            _ => "suboptimal",
        };
        info!("Swapchain is {reason}, abandoning frame until it is recreated");
        swapchain.invalidate();
    }

    /// Reset frame synchronization after the swapchain was recreated. Waits for the device to be idle.
    /// # Errors
    /// Fails if the frame backend fails to reset.
    pub fn on_swapchain_recreated(&mut self) -> Result<()> {
        self.backend.reset_frame_sync()?;
        self.frame_index = 0;
        self.used.clear();
        Ok(())
    }

    /// Attachment slots touched by the passes recorded so far this frame. Cleared after every presented frame.
    pub fn used_attachments(&self) -> &[UsedAttachment] {
        &self.used
    }

    /// Index of the frame in flight slot the next frame will use.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// The frame backend.
    pub fn backend(&self) -> &F {
        &self.backend
    }

    /// Mutable access to the frame backend.
    pub fn backend_mut(&mut self) -> &mut F {
        &mut self.backend
    }
}

fn backbuffer_reset<B: AttachmentBackend>(resources: &mut RenderResources<B>, image_index: usize, frame_index: usize) -> Result<()> {
    resources
        .get_attachment(BACKBUFFER_INDEX, image_index, frame_index)?
        .reset_state();
    Ok(())
}

/// Build the dynamic rendering info of a render pass. Multisampled attachments render into their transient image
/// and resolve into the attachment itself.
fn rendering_info<B: AttachmentBackend, P>(
    pass: &Pass<'_, P>,
    resources: &RenderResources<B>,
    image_index: usize,
    frame_index: usize,
) -> Result<RenderingInfo> {
    let mut info = RenderingInfo {
        flags: vk::RenderingFlags::empty(),
        render_area: vk::Rect2D::default(),
        layer_count: 1,
        view_mask: 0,
        color_attachments: vec![],
        depth_attachment: None,
        stencil_attachment: None,
    };

    for resource in pass.resources() {
        let load_op = match resource.usage() {
            ResourceUsage::ColorAttachment {
                load_op,
            }
            | ResourceUsage::DepthAttachment {
                load_op,
            } => load_op,
            _ => continue,
        };
        let index = resource
            .container()
            .ok_or_else(|| Error::NoResourceBound(resource.name().to_owned()))?;
        let container = resources.container(index).ok_or(Error::InvalidAttachmentIndex(index))?;
        let attachment = container.get(image_index, frame_index)?;
        let layout = resource.usage().layout();

        let mut attachment_info = RenderingAttachmentInfo {
            image_view: attachment.view(),
            image_layout: layout,
            resolve_mode: None,
            resolve_image_view: None,
            resolve_image_layout: None,
            load_op,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: resource.clear_value.unwrap_or_default(),
        };
        if let Some(transient) = container.transient() {
            attachment_info.image_view = transient.attachment.view();
            attachment_info.resolve_mode = Some(transient.resolve_mode);
            attachment_info.resolve_image_view = Some(attachment.view());
            attachment_info.resolve_image_layout = Some(layout);
            // Only the resolved result outlives the pass.
            attachment_info.store_op = vk::AttachmentStoreOp::DONT_CARE;
        }

        if info.render_area.extent.width == 0 {
            info.render_area.extent = container.extent();
        }
        match container.kind() {
            AttachmentKind::Color => info.color_attachments.push(attachment_info),
            AttachmentKind::Depth => {
                if attachment.aspect().contains(vk::ImageAspectFlags::STENCIL) {
                    info.stencil_attachment = Some(attachment_info);
                }
                info.depth_attachment = Some(attachment_info);
            }
        }
    }
    Ok(info)
}
