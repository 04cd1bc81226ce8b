//! [`RenderResources`] owns the attachments of a render graph and maps resource names to them.
//!
//! Container index 0 is always the backbuffer. Its images are borrowed from the swapchain, with one attachment
//! per swapchain image. Every other attachment is created through [`RenderResources::create_color_attachment()`] and
//! friends, and gets the next free index. Indices are stable until the resources are dropped, also across
//! [`RenderResources::recreate()`].
//!
//! # Example
//! ```
//! # use deimos::*;
//! # fn example<B: AttachmentBackend>(resources: &mut RenderResources<B>) -> anyhow::Result<()> {
//! let hdr = resources.create_color_attachment(
//!     AttachmentSpec::new("hdr").format(vk::Format::R16G16B16A16_SFLOAT),
//!     vk::SampleCountFlags::TYPE_4,
//! )?;
//! let _depth = resources.create_depth_attachment(AttachmentSpec::new("depth"), vk::SampleCountFlags::TYPE_1)?;
//! assert_eq!(resources.try_get_attachment_index("hdr"), Some(hdr));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::core::settings::RenderSettings;
use crate::graph::attachment::*;
use crate::graph::backend::{AttachmentBackend, AttachmentImageInfo};
use crate::graph::name::NameHash;
use crate::wsi::surface::SurfaceInterface;
use crate::wsi::swapchain::SwapchainInterface;
use crate::Error;

/// Container index of the backbuffer.
pub const BACKBUFFER_INDEX: usize = 0;
/// Name the backbuffer is always registered under.
pub const BACKBUFFER_NAME: &str = "backbuffer";

/// Owns every attachment of a render graph.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RenderResources<B: AttachmentBackend> {
    #[derivative(Debug = "ignore")]
    backend: B,
    containers: Vec<AttachmentContainer<B::Image>>,
    lookup: HashMap<NameHash, usize>,
    backbuffer_aliases: Vec<NameHash>,
    swapchain_extent: vk::Extent2D,
    color_format: vk::Format,
    depth_format: vk::Format,
    frames_in_flight: usize,
    depth_multisample: bool,
}

fn backbuffer_container<I>(swapchain: &impl SwapchainInterface) -> Result<AttachmentContainer<I>> {
    let images = swapchain.images();
    let views = swapchain.views();
    if images.is_empty() || images.len() != views.len() {
        return Err(Error::Uncategorized("Swapchain must have one view for each of its images").into());
    }
    let extent = swapchain.extent();
    if extent.width == 0 || extent.height == 0 {
        return Err(Error::InvalidExtent.into());
    }
    Ok(AttachmentContainer {
        name: BACKBUFFER_NAME.to_owned(),
        kind: AttachmentKind::Color,
        cardinality: ResourceCardinality::PerImage,
        format: swapchain.format(),
        size: SizePolicy::SwapchainRelative(1.0),
        extent,
        attachments: images
            .iter()
            .zip(views)
            .map(|(&image, &view)| Attachment::new(image, view, vk::ImageAspectFlags::COLOR))
            .collect(),
        transient: None,
        owned: vec![],
        spec: None,
        requested_samples: vk::SampleCountFlags::TYPE_1,
    })
}

impl<B: AttachmentBackend> RenderResources<B> {
    /// Create the resources of a new render graph. Only the backbuffer exists after this call.
    /// # Errors
    /// * Fails if the settings are invalid.
    /// * Fails if the swapchain has no images, or a different number of images and views.
    pub fn new(
        backend: B,
        swapchain: &impl SwapchainInterface,
        surface: &impl SurfaceInterface,
        settings: &RenderSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let backbuffer = backbuffer_container(swapchain)?;
        let mut lookup = HashMap::new();
        lookup.insert(NameHash::of(BACKBUFFER_NAME), BACKBUFFER_INDEX);
        Ok(Self {
            backend,
            containers: vec![backbuffer],
            lookup,
            backbuffer_aliases: vec![],
            swapchain_extent: swapchain.extent(),
            color_format: surface.color_format(),
            depth_format: surface.depth_format(),
            frames_in_flight: settings.frames_in_flight,
            depth_multisample: settings.depth_multisample,
        })
    }

    /// Create a color attachment shared by all frames. If `samples` is more than one, a transient multisampled
    /// image is created as well. Passes render into the transient image and resolve into the attachment.
    /// Returns the container index of the new attachment.
    /// # Errors
    /// * Fails with [`Error::DuplicateResource`] if the name is taken.
    /// * Fails if the size cannot be resolved, or if image creation fails.
    pub fn create_color_attachment(&mut self, spec: AttachmentSpec, samples: vk::SampleCountFlags) -> Result<usize> {
        self.create_attachment(spec, samples, AttachmentKind::Color, ResourceCardinality::Single)
    }

    /// Create a depth attachment shared by all frames.
    ///
    /// Unless depth multisampling is enabled in the [`RenderSettings`], a multisampled request is downgraded to a single sample.
    /// # Errors
    /// See [`RenderResources::create_color_attachment()`].
    pub fn create_depth_attachment(&mut self, spec: AttachmentSpec, samples: vk::SampleCountFlags) -> Result<usize> {
        self.create_attachment(spec, samples, AttachmentKind::Depth, ResourceCardinality::Single)
    }

    /// Create a color attachment with a separate image for each frame in flight. Use this for images that are
    /// written by one frame while the previous frame may still read them.
    /// # Errors
    /// See [`RenderResources::create_color_attachment()`].
    pub fn create_frame_attachment(&mut self, spec: AttachmentSpec, samples: vk::SampleCountFlags) -> Result<usize> {
        self.create_attachment(spec, samples, AttachmentKind::Color, ResourceCardinality::PerFrame)
    }

    fn create_attachment(
        &mut self,
        spec: AttachmentSpec,
        samples: vk::SampleCountFlags,
        kind: AttachmentKind,
        cardinality: ResourceCardinality,
    ) -> Result<usize> {
        let hash = NameHash::of(&spec.name);
        if self.lookup.contains_key(&hash) {
            return Err(Error::DuplicateResource(spec.name).into());
        }
        let container = self.build_container(spec, samples, kind, cardinality)?;
        let index = self.containers.len();
        debug!(
            "Created {:?} attachment `{}` ({:?}, {}x{}, {:?}) at index {index}",
            container.kind, container.name, container.format, container.extent.width, container.extent.height, container.cardinality
        );
        self.containers.push(container);
        self.lookup.insert(hash, index);
        Ok(index)
    }

    fn build_container(
        &mut self,
        spec: AttachmentSpec,
        requested_samples: vk::SampleCountFlags,
        kind: AttachmentKind,
        cardinality: ResourceCardinality,
    ) -> Result<AttachmentContainer<B::Image>> {
        let extent = spec.size.resolve(self.swapchain_extent, |name| {
            self.lookup
                .get(&name)
                .and_then(|&index| self.containers.get(index))
                .map(|container| container.extent)
        })?;
        let slots = match cardinality {
            ResourceCardinality::PerImage => {
                return Err(Error::Uncategorized("Only the backbuffer has one attachment per swapchain image").into())
            }
            ResourceCardinality::PerFrame => self.frames_in_flight,
            ResourceCardinality::Single => 1,
        };

        let (format, aspect, attachment_usage, resolve_mode) = match kind {
            AttachmentKind::Color => {
                let format = spec.format.unwrap_or(self.color_format);
                (format, vk::ImageAspectFlags::COLOR, vk::ImageUsageFlags::COLOR_ATTACHMENT, vk::ResolveModeFlags::AVERAGE)
            }
            AttachmentKind::Depth => {
                let format = spec.format.unwrap_or(self.depth_format);
                (
                    format,
                    depth_aspect(format),
                    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                    vk::ResolveModeFlags::SAMPLE_ZERO,
                )
            }
        };

        let mut samples = requested_samples;
        if kind == AttachmentKind::Depth && samples != vk::SampleCountFlags::TYPE_1 && !self.depth_multisample {
            warn!(
                "Depth attachment `{}` requested {:?} samples, but depth multisampling is disabled. Using a single sample.",
                spec.name, samples
            );
            samples = vk::SampleCountFlags::TYPE_1;
        }

        let info = AttachmentImageInfo {
            extent,
            format,
            usage: attachment_usage | spec.usage,
            samples: vk::SampleCountFlags::TYPE_1,
            aspect,
            transient: false,
        };
        let mut owned = Vec::with_capacity(slots + 1);
        let mut attachments = Vec::with_capacity(slots);
        for _ in 0..slots {
            let image = self.backend.create_image(&info)?;
            let (handle, view) = B::handles(&image);
            attachments.push(Attachment::new(handle, view, aspect));
            owned.push(image);
        }

        let transient = if samples != vk::SampleCountFlags::TYPE_1 {
            let image = self.backend.create_image(&AttachmentImageInfo {
                usage: attachment_usage | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
                samples,
                transient: true,
                ..info
            })?;
            let (handle, view) = B::handles(&image);
            owned.push(image);
            Some(TransientAttachment {
                attachment: Attachment::new(handle, view, aspect),
                samples,
                resolve_mode,
            })
        } else {
            None
        };

        Ok(AttachmentContainer {
            name: spec.name.clone(),
            kind,
            cardinality,
            format,
            size: spec.size,
            extent,
            attachments,
            transient,
            owned,
            spec: Some(spec),
            requested_samples,
        })
    }

    /// Get the attachment of a container used for the given swapchain image and frame in flight.
    /// Per-image containers select by `image_index`, per-frame containers by `frame_index`, and
    /// single containers ignore both.
    /// # Errors
    /// * Fails with [`Error::InvalidAttachmentIndex`] if there is no such container.
    /// * Fails with [`Error::AttachmentSlotOutOfRange`] if the selected slot does not exist.
    pub fn get_attachment(&mut self, container: usize, image_index: usize, frame_index: usize) -> Result<&mut Attachment> {
        self.containers
            .get_mut(container)
            .ok_or(Error::InvalidAttachmentIndex(container))?
            .get_mut(image_index, frame_index)
    }

    /// Immutable version of [`RenderResources::get_attachment()`].
    pub fn attachment(&self, container: usize, image_index: usize, frame_index: usize) -> Result<&Attachment> {
        self.container(container)
            .ok_or(Error::InvalidAttachmentIndex(container))?
            .get(image_index, frame_index)
    }

    /// Get the transient multisampled companion of a container, if it has one.
    /// # Errors
    /// Fails with [`Error::InvalidAttachmentIndex`] if there is no such container.
    pub fn transient_mut(&mut self, container: usize) -> Result<Option<&mut TransientAttachment>> {
        Ok(self
            .containers
            .get_mut(container)
            .ok_or(Error::InvalidAttachmentIndex(container))?
            .transient_mut())
    }

    /// Look up the container index of a named resource.
    pub fn try_get_attachment_index(&self, name: impl Into<NameHash>) -> Option<usize> {
        self.lookup.get(&name.into()).copied()
    }

    /// Look up the container index of a named resource.
    /// # Errors
    /// Fails with [`Error::NoResourceBound`] if nothing is registered under this name.
    pub fn attachment_index_or_err(&self, name: &str) -> Result<usize> {
        self.try_get_attachment_index(name)
            .ok_or_else(|| Error::NoResourceBound(name.to_owned()).into())
    }

    /// Register an additional name for the backbuffer.
    /// # Errors
    /// Fails with [`Error::DuplicateResource`] if the name already refers to a different resource.
    pub fn alias_backbuffer(&mut self, name: &str) -> Result<()> {
        let hash = NameHash::of(name);
        match self.lookup.get(&hash) {
            Some(&BACKBUFFER_INDEX) => Ok(()),
            Some(_) => Err(Error::DuplicateResource(name.to_owned()).into()),
            None => {
                self.lookup.insert(hash, BACKBUFFER_INDEX);
                self.backbuffer_aliases.push(hash);
                Ok(())
            }
        }
    }

    /// All names registered through [`RenderResources::alias_backbuffer()`].
    pub fn backbuffer_aliases(&self) -> &[NameHash] {
        &self.backbuffer_aliases
    }

    /// Rebuild every container for a new swapchain. Owned images are recreated at their new size, in creation order.
    /// Container indices stay the same and every attachment returns to the initial state.
    ///
    /// The GPU must not be using any of the old images anymore when this is called.
    /// # Errors
    /// Fails if the new swapchain is unusable, or if creating an image fails.
    pub fn recreate(&mut self, swapchain: &impl SwapchainInterface, surface: &impl SurfaceInterface) -> Result<()> {
        self.containers[BACKBUFFER_INDEX] = backbuffer_container(swapchain)?;
        self.swapchain_extent = swapchain.extent();
        self.color_format = surface.color_format();
        self.depth_format = surface.depth_format();

        for index in 1..self.containers.len() {
            let container = &mut self.containers[index];
            let Some(spec) = container.spec.clone() else {
                continue;
            };
            let (samples, kind, cardinality) = (container.requested_samples, container.kind, container.cardinality);
            // Release the old images before allocating their replacements.
            container.owned.clear();
            container.attachments.clear();
            container.transient = None;
            self.containers[index] = self.build_container(spec, samples, kind, cardinality)?;
        }

        debug!(
            "Recreated {} render attachments for a {}x{} swapchain",
            self.containers.len(),
            self.swapchain_extent.width,
            self.swapchain_extent.height
        );
        Ok(())
    }

    /// Reset the barrier state of every attachment, including transient ones.
    pub fn reset_states(&mut self) {
        self.containers.iter_mut().for_each(AttachmentContainer::reset_states);
    }

    /// Get a container by index.
    pub fn container(&self, index: usize) -> Option<&AttachmentContainer<B::Image>> {
        self.containers.get(index)
    }

    /// Number of containers, including the backbuffer.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Always false, the backbuffer container exists from the start.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Extent swapchain relative sizes are computed from.
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain_extent
    }

    /// Number of attachments in per-frame containers.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// The backend images are created with.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
