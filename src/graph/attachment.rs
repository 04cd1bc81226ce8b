//! Attachments are the images render passes draw into and read from.
//!
//! Every named resource in the render graph is backed by an [`AttachmentContainer`]. Depending on its
//! [`ResourceCardinality`], a container holds one [`Attachment`] per swapchain image, one per frame in flight, or a single one.
//! Each attachment remembers the [`BarrierState`] the last pass left it in, so the renderer knows which barrier to emit next.

use anyhow::Result;
use ash::vk;

use crate::graph::name::NameHash;
use crate::Error;

/// Synchronization state of an image: the stages and accesses of the last operation that touched it,
/// and the layout it left the image in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BarrierState {
    /// Pipeline stages of the last operation.
    pub stage: vk::PipelineStageFlags2,
    /// Memory accesses of the last operation.
    pub access: vk::AccessFlags2,
    /// Current image layout.
    pub layout: vk::ImageLayout,
}

impl BarrierState {
    /// State of an image that was not touched yet this frame. Transitioning from this state discards the contents.
    pub const INITIAL: BarrierState = BarrierState {
        stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
        access: vk::AccessFlags2::NONE,
        layout: vk::ImageLayout::UNDEFINED,
    };

    /// State the backbuffer must be in when it is presented.
    pub const PRESENT: BarrierState = BarrierState {
        stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        access: vk::AccessFlags2::NONE,
        layout: vk::ImageLayout::PRESENT_SRC_KHR,
    };

    /// Create a new barrier state.
    pub fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self {
            stage,
            access,
            layout,
        }
    }
}

impl Default for BarrierState {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// An image and view used as a render target or shader input, together with its current synchronization state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Attachment {
    image: vk::Image,
    view: vk::ImageView,
    aspect: vk::ImageAspectFlags,
    state: BarrierState,
}

impl Attachment {
    /// Create a new attachment record in the initial state.
    pub fn new(image: vk::Image, view: vk::ImageView, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            image,
            view,
            aspect,
            state: BarrierState::INITIAL,
        }
    }

    /// Raw image handle.
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Raw image view handle.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Image aspect covered by the view.
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// State left behind by the last operation that touched this attachment.
    pub fn state(&self) -> BarrierState {
        self.state
    }

    /// Overwrite the stored state without emitting a barrier.
    pub fn set_state(&mut self, state: BarrierState) {
        self.state = state;
    }

    /// Forget the stored state. The next transition will discard the image contents.
    pub fn reset_state(&mut self) {
        self.state = BarrierState::INITIAL;
    }

    /// Move this attachment into the `required` state. Returns the barrier that must be recorded to do so,
    /// or `None` if the attachment is already in that state.
    /// # Errors
    /// Fails with [`Error::InvalidTransition`] if the required layout is `UNDEFINED` or `PREINITIALIZED`,
    /// images can never be transitioned into those.
    pub fn transition(&mut self, required: BarrierState) -> Result<Option<vk::ImageMemoryBarrier2>> {
        if required.layout == vk::ImageLayout::UNDEFINED || required.layout == vk::ImageLayout::PREINITIALIZED {
            return Err(Error::InvalidTransition {
                from: self.state.layout,
                to: required.layout,
            }
            .into());
        }
        if self.state == required {
            return Ok(None);
        }

        let barrier = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            p_next: std::ptr::null(),
            src_stage_mask: self.state.stage,
            src_access_mask: self.state.access,
            dst_stage_mask: required.stage,
            dst_access_mask: required.access,
            old_layout: self.state.layout,
            new_layout: required.layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: self.image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
        };
        self.state = required;
        Ok(Some(barrier))
    }
}

/// How many attachments a container holds, and which one is used in a given frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceCardinality {
    /// One attachment per swapchain image, selected by the acquired image index. Reserved for the backbuffer.
    PerImage,
    /// One attachment per frame in flight, selected by the frame index.
    PerFrame,
    /// A single attachment shared by every frame.
    Single,
}

/// Whether an attachment holds color or depth data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Color attachment
    Color,
    /// Depth (and possibly stencil) attachment
    Depth,
}

/// Describes how the extent of an attachment is derived.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SizePolicy {
    /// The swapchain extent multiplied by a scale factor.
    SwapchainRelative(f32),
    /// The extent of another attachment multiplied by a scale factor.
    Relative {
        /// Attachment the size is relative to. It must be created before this one.
        to: NameHash,
        /// Scale factor
        scale: f32,
    },
    /// A fixed extent.
    Absolute {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

impl Default for SizePolicy {
    fn default() -> Self {
        SizePolicy::SwapchainRelative(1.0)
    }
}

fn scale_extent(extent: vk::Extent2D, scale: f32) -> vk::Extent2D {
    vk::Extent2D {
        width: ((extent.width as f32 * scale).floor() as u32).max(1),
        height: ((extent.height as f32 * scale).floor() as u32).max(1),
    }
}

impl SizePolicy {
    /// Compute the extent of an attachment.
    /// * `swapchain` - Current swapchain extent.
    /// * `lookup` - Resolves the extent of another attachment by name.
    /// # Errors
    /// * Fails with [`Error::NoResourceBound`] if a relative size refers to an unknown attachment.
    /// * Fails with [`Error::InvalidExtent`] for an empty absolute size or a non-positive scale.
    pub fn resolve(
        &self,
        swapchain: vk::Extent2D,
        lookup: impl FnOnce(NameHash) -> Option<vk::Extent2D>,
    ) -> Result<vk::Extent2D> {
        match *self {
            SizePolicy::SwapchainRelative(scale) => {
                if !(scale > 0.0) {
                    return Err(Error::InvalidExtent.into());
                }
                Ok(scale_extent(swapchain, scale))
            }
            SizePolicy::Relative {
                to,
                scale,
            } => {
                if !(scale > 0.0) {
                    return Err(Error::InvalidExtent.into());
                }
                let base = lookup(to).ok_or_else(|| Error::NoResourceBound(to.to_string()))?;
                Ok(scale_extent(base, scale))
            }
            SizePolicy::Absolute {
                width,
                height,
            } => {
                if width == 0 || height == 0 {
                    return Err(Error::InvalidExtent.into());
                }
                Ok(vk::Extent2D {
                    width,
                    height,
                })
            }
        }
    }
}

/// Describes a named attachment to create.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentSpec {
    /// Name of the resource. Passes refer to the attachment by this name.
    pub name: String,
    /// Image format. `None` uses the surface's color or depth format.
    pub format: Option<vk::Format>,
    /// How the extent of the attachment is derived.
    pub size: SizePolicy,
    /// Additional usage flags on top of the attachment usage.
    pub usage: vk::ImageUsageFlags,
}

impl AttachmentSpec {
    /// Create a new attachment spec with the surface format and the size of the swapchain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
            size: SizePolicy::default(),
            usage: vk::ImageUsageFlags::SAMPLED,
        }
    }

    /// Set the image format.
    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the size policy.
    pub fn size(mut self, size: SizePolicy) -> Self {
        self.size = size;
        self
    }

    /// Add image usage flags.
    pub fn usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage |= usage;
        self
    }
}

/// A multisampled attachment that only lives inside a render pass, resolved into its container's primary image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransientAttachment {
    /// The multisampled image and its state.
    pub attachment: Attachment,
    /// Sample count of the transient image.
    pub samples: vk::SampleCountFlags,
    /// How the samples are resolved into the primary image.
    pub resolve_mode: vk::ResolveModeFlags,
}

/// Owns the images backing one named render graph resource.
/// `I` is the owned image type of the [`AttachmentBackend`](crate::graph::backend::AttachmentBackend) that created them.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct AttachmentContainer<I> {
    pub(crate) name: String,
    pub(crate) kind: AttachmentKind,
    pub(crate) cardinality: ResourceCardinality,
    pub(crate) format: vk::Format,
    pub(crate) size: SizePolicy,
    pub(crate) extent: vk::Extent2D,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) transient: Option<TransientAttachment>,
    /// Images owned by this container. Empty for containers borrowing their images, like the backbuffer.
    #[derivative(Debug = "ignore")]
    pub(crate) owned: Vec<I>,
    pub(crate) spec: Option<AttachmentSpec>,
    pub(crate) requested_samples: vk::SampleCountFlags,
}

impl<I> AttachmentContainer<I> {
    /// Select the attachment used for the given swapchain image and frame in flight.
    /// # Errors
    /// Fails with [`Error::AttachmentSlotOutOfRange`] if the selected slot does not exist.
    pub fn get(&self, image_index: usize, frame_index: usize) -> Result<&Attachment> {
        let slot = self.slot(image_index, frame_index);
        self.attachments
            .get(slot)
            .ok_or_else(|| Error::AttachmentSlotOutOfRange(slot).into())
    }

    /// Mutable version of [`AttachmentContainer::get()`].
    pub fn get_mut(&mut self, image_index: usize, frame_index: usize) -> Result<&mut Attachment> {
        let slot = self.slot(image_index, frame_index);
        self.attachments
            .get_mut(slot)
            .ok_or_else(|| Error::AttachmentSlotOutOfRange(slot).into())
    }

    fn slot(&self, image_index: usize, frame_index: usize) -> usize {
        match self.cardinality {
            ResourceCardinality::PerImage => image_index,
            ResourceCardinality::PerFrame => frame_index,
            ResourceCardinality::Single => 0,
        }
    }

    /// Name the container was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color or depth.
    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// How attachments are selected per frame.
    pub fn cardinality(&self) -> ResourceCardinality {
        self.cardinality
    }

    /// Image format of the primary attachments.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size policy the extent was resolved from.
    pub fn size_policy(&self) -> SizePolicy {
        self.size
    }

    /// Resolved extent of the attachments.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// All attachment slots.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The multisampled companion, if this attachment renders with more than one sample.
    pub fn transient(&self) -> Option<&TransientAttachment> {
        self.transient.as_ref()
    }

    /// Mutable access to the multisampled companion.
    pub fn transient_mut(&mut self) -> Option<&mut TransientAttachment> {
        self.transient.as_mut()
    }

    /// Whether the images of this container are owned by it, or borrowed from somewhere else.
    pub fn is_owned(&self) -> bool {
        !self.owned.is_empty()
    }

    /// Reset the barrier state of every attachment, including the transient one.
    pub fn reset_states(&mut self) {
        self.attachments.iter_mut().for_each(Attachment::reset_state);
        if let Some(transient) = &mut self.transient {
            transient.attachment.reset_state();
        }
    }
}

/// Image aspect of a depth format.
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN: vk::Extent2D = vk::Extent2D {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn swapchain_relative_size() {
        let extent = SizePolicy::SwapchainRelative(0.5).resolve(SWAPCHAIN, |_| None).unwrap();
        assert_eq!((extent.width, extent.height), (960, 540));
    }

    #[test]
    fn relative_size_uses_referenced_extent() {
        let bloom = NameHash::of("bloom");
        let policy = SizePolicy::Relative {
            to: bloom,
            scale: 0.25,
        };
        let extent = policy
            .resolve(SWAPCHAIN, |name| {
                (name == bloom).then_some(vk::Extent2D {
                    width: 100,
                    height: 3,
                })
            })
            .unwrap();
        assert_eq!((extent.width, extent.height), (25, 1));
        assert!(policy.resolve(SWAPCHAIN, |_| None).is_err());
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        assert!(SizePolicy::SwapchainRelative(0.0).resolve(SWAPCHAIN, |_| None).is_err());
        assert!(SizePolicy::Absolute {
            width: 0,
            height: 16
        }
        .resolve(SWAPCHAIN, |_| None)
        .is_err());
    }

    #[test]
    fn transition_updates_state() {
        let mut attachment = Attachment::new(vk::Image::null(), vk::ImageView::null(), vk::ImageAspectFlags::COLOR);
        let required = BarrierState::new(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let barrier = attachment.transition(required).unwrap().unwrap();
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.src_stage_mask, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(attachment.state(), required);
        assert!(attachment.transition(required).unwrap().is_none());
        assert!(attachment.transition(BarrierState::INITIAL).is_err());
    }

    #[test]
    fn stencil_formats_have_stencil_aspect() {
        assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert!(depth_aspect(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
    }
}
