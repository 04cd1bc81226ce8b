//! This module mainly exposes the [`PassBuilder`] struct, used for defining passes in a
//! [`RenderGraph`](crate::graph::render_graph::RenderGraph).
//!
//! Each pass declares the named resources it uses and how it uses them, and can optionally specify a closure that is
//! called when the pass is recorded. Passes created through [`PassBuilder::render()`] open a dynamic rendering scope around
//! that closure, with their color and depth attachments bound.
//!
//! # Example
//!
//! One pass renders to an offscreen attachment, a second pass samples it while rendering to the backbuffer.
//! The renderer transitions `offscreen` from `COLOR_ATTACHMENT_OPTIMAL` to `SHADER_READ_ONLY_OPTIMAL` between the two.
//! ```
//! use deimos::*;
//!
//! # fn example<R: BarrierRecorder>() -> anyhow::Result<()> {
//! let offscreen_pass = PassBuilder::<R>::render("offscreen")
//!     .clear_color_attachment("offscreen", ClearColor::Float([1.0, 0.0, 0.0, 1.0]))?
//!     .build();
//!
//! let sample_pass = PassBuilder::<R>::render("sample")
//!     .clear_color_attachment("backbuffer", ClearColor::Float([0.0, 0.0, 0.0, 1.0]))?
//!     .sample_image("offscreen", vk::PipelineStageFlags2::FRAGMENT_SHADER)
//!     .execute_fn(|_cmd, _ctx| {
//!         // Record draw commands here
//!         Ok(())
//!     })
//!     .build();
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::graph::name::NameHash;
use crate::graph::resource::ResourceUsage;
use crate::util::to_vk::IntoVulkanType;
use crate::Error;

/// Information about the frame a pass is recorded in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PassContext {
    /// Index of the acquired swapchain image
    pub image_index: usize,
    /// Index of the frame in flight
    pub frame_index: usize,
    /// Area covered by the pass's attachments. Empty for passes without attachments.
    pub render_area: vk::Rect2D,
}

/// Defines a pass executor that can be called when the pass is recorded.
pub trait PassExecutor<R> {
    /// Record this pass.
    fn execute(&mut self, recorder: &mut R, ctx: &PassContext) -> Result<()>;
}

impl<R, F> PassExecutor<R> for F
where
    F: FnMut(&mut R, &PassContext) -> Result<()>,
{
    fn execute(&mut self, recorder: &mut R, ctx: &PassContext) -> Result<()> {
        self(recorder, ctx)
    }
}

pub(crate) type BoxedPassFn<'cb, R> = Box<dyn PassExecutor<R> + 'cb>;

/// An empty pass executor that does nothing
#[derive(Debug, Default)]
pub struct EmptyPassExecutor;

impl EmptyPassExecutor {
    /// Create a new empty pass executor in a [`Box`]
    pub fn new_boxed() -> Box<Self> {
        Box::new(Self)
    }
}

impl<R> PassExecutor<R> for EmptyPassExecutor {
    fn execute(&mut self, _recorder: &mut R, _ctx: &PassContext) -> Result<()> {
        Ok(())
    }
}

/// Clear value of a color attachment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearColor {
    /// Clear value for float and normalized formats
    Float([f32; 4]),
    /// Clear value for signed integer formats
    Int([i32; 4]),
    /// Clear value for unsigned integer formats
    Uint([u32; 4]),
}

/// Clear value of a depth attachment.
#[derive(Copy, Clone, Default, Debug, PartialEq)]
pub struct ClearDepthStencil {
    /// Depth clear value
    pub depth: f32,
    /// Stencil clear value
    pub stencil: u32,
}

impl IntoVulkanType for ClearColor {
    type Output = vk::ClearColorValue;

    fn into_vulkan(self) -> Self::Output {
        match self {
            ClearColor::Float(values) => vk::ClearColorValue {
                float32: values,
            },
            ClearColor::Int(values) => vk::ClearColorValue {
                int32: values,
            },
            ClearColor::Uint(values) => vk::ClearColorValue {
                uint32: values,
            },
        }
    }
}

impl IntoVulkanType for ClearDepthStencil {
    type Output = vk::ClearDepthStencilValue;

    fn into_vulkan(self) -> Self::Output {
        vk::ClearDepthStencilValue {
            depth: self.depth,
            stencil: self.stencil,
        }
    }
}

/// A named resource used by a pass.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct PassResource {
    pub(crate) name: String,
    pub(crate) hash: NameHash,
    pub(crate) usage: ResourceUsage,
    #[derivative(Debug = "ignore")]
    pub(crate) clear_value: Option<vk::ClearValue>,
    /// Container index, filled in when the graph is built.
    pub(crate) container: Option<usize>,
}

impl PassResource {
    fn new(name: &str, usage: ResourceUsage, clear_value: Option<vk::ClearValue>) -> Self {
        Self {
            name: name.to_owned(),
            hash: NameHash::of(name),
            usage,
            clear_value,
            container: None,
        }
    }

    /// Name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the pass uses the resource.
    pub fn usage(&self) -> ResourceUsage {
        self.usage
    }

    /// Index of the attachment container this resource was bound to, once the graph is built.
    pub fn container(&self) -> Option<usize> {
        self.container
    }
}

/// Represents one pass in a render graph. You can obtain one using a [`PassBuilder`].
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Pass<'cb, R> {
    pub(crate) name: String,
    pub(crate) resources: Vec<PassResource>,
    #[derivative(Debug = "ignore")]
    pub(crate) execute: BoxedPassFn<'cb, R>,
    pub(crate) is_renderpass: bool,
}

impl<'cb, R> Pass<'cb, R> {
    /// Get the pass name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All resources this pass uses, in declaration order.
    pub fn resources(&self) -> &[PassResource] {
        &self.resources
    }

    /// Whether this pass opens a rendering scope around its executor.
    pub fn is_renderpass(&self) -> bool {
        self.is_renderpass
    }
}

/// Used to create [`Pass`] objects correctly.
/// # Example
/// See the [`pass`](crate::graph::pass) module level documentation.
pub struct PassBuilder<'cb, R> {
    inner: Pass<'cb, R>,
}

impl<'cb, R> PassBuilder<'cb, R> {
    fn with_kind(name: impl Into<String>, is_renderpass: bool) -> Self {
        PassBuilder {
            inner: Pass {
                name: name.into(),
                resources: vec![],
                execute: EmptyPassExecutor::new_boxed(),
                is_renderpass,
            },
        }
    }

    /// Create a new pass for generic commands, such as compute dispatches. It cannot have attachments.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, false)
    }

    /// Create a new render pass. This constructor is required for passes that render to any attachments.
    pub fn render(name: impl Into<String>) -> Self {
        Self::with_kind(name, true)
    }

    /// Create a pass that transitions a resource for presentation. Note that this doesn't actually present,
    /// the renderer presents the backbuffer after the last pass in any case.
    pub fn present(name: impl Into<String>, resource: &str) -> Pass<'cb, R> {
        Pass {
            name: name.into(),
            resources: vec![PassResource::new(resource, ResourceUsage::Present, None)],
            execute: EmptyPassExecutor::new_boxed(),
            is_renderpass: false,
        }
    }

    /// Adds a color attachment to this pass. If [`vk::AttachmentLoadOp::CLEAR`] was specified, `clear` must not be None.
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    /// * Fails if `op` was [`vk::AttachmentLoadOp::CLEAR`], but `clear` was [`None`].
    pub fn color_attachment(
        mut self,
        resource: &str,
        op: vk::AttachmentLoadOp,
        clear: Option<vk::ClearColorValue>,
    ) -> Result<Self> {
        if !self.inner.is_renderpass {
            return Err(Error::Uncategorized("Cannot attach color attachment to a pass that is not a renderpass").into());
        }
        if op == vk::AttachmentLoadOp::CLEAR && clear.is_none() {
            return Err(anyhow::Error::from(Error::NoClearValue));
        }
        self.inner.resources.push(PassResource::new(
            resource,
            ResourceUsage::ColorAttachment {
                load_op: op,
            },
            clear.map(|color| vk::ClearValue {
                color,
            }),
        ));
        Ok(self)
    }

    /// Clear a color attachment with the specified clear color
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    pub fn clear_color_attachment(self, resource: &str, color: ClearColor) -> Result<Self> {
        self.color_attachment(resource, vk::AttachmentLoadOp::CLEAR, Some(color.into_vulkan()))
    }

    /// Load a color attachment
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    pub fn load_color_attachment(self, resource: &str) -> Result<Self> {
        self.color_attachment(resource, vk::AttachmentLoadOp::LOAD, None)
    }

    /// Sets the depth attachment of this pass. If [`vk::AttachmentLoadOp::CLEAR`] was specified, `clear` must not be None.
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    /// * Fails if `op` was [`vk::AttachmentLoadOp::CLEAR`], but `clear` was [`None`].
    /// * Fails if the pass already has a depth attachment.
    pub fn depth_attachment(
        mut self,
        resource: &str,
        op: vk::AttachmentLoadOp,
        clear: Option<vk::ClearDepthStencilValue>,
    ) -> Result<Self> {
        if !self.inner.is_renderpass {
            return Err(Error::Uncategorized("Cannot attach depth attachment to a pass that is not a renderpass").into());
        }
        if op == vk::AttachmentLoadOp::CLEAR && clear.is_none() {
            return Err(anyhow::Error::from(Error::NoClearValue));
        }
        let has_depth = self.inner.resources.iter().any(|resource| {
            matches!(
                resource.usage,
                ResourceUsage::DepthAttachment {
                    ..
                }
            )
        });
        if has_depth {
            return Err(Error::Uncategorized("A pass can only have one depth attachment").into());
        }
        self.inner.resources.push(PassResource::new(
            resource,
            ResourceUsage::DepthAttachment {
                load_op: op,
            },
            clear.map(|depth_stencil| vk::ClearValue {
                depth_stencil,
            }),
        ));
        Ok(self)
    }

    /// Clear the depth attachment with the specified clear values
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    pub fn clear_depth_attachment(self, resource: &str, clear: ClearDepthStencil) -> Result<Self> {
        self.depth_attachment(resource, vk::AttachmentLoadOp::CLEAR, Some(clear.into_vulkan()))
    }

    /// Load a depth attachment
    /// # Errors
    /// * Fails if this pass was not created using [`PassBuilder::render()`]
    pub fn load_depth_attachment(self, resource: &str) -> Result<Self> {
        self.depth_attachment(resource, vk::AttachmentLoadOp::LOAD, None)
    }

    /// Declare that a resource will be used as a sampled image in the given pipeline stages.
    pub fn sample_image(mut self, resource: &str, stage: vk::PipelineStageFlags2) -> Self {
        self.inner.resources.push(PassResource::new(
            resource,
            ResourceUsage::ShaderRead {
                stage,
            },
            None,
        ));
        self
    }

    /// Declare that a resource will be used as a storage image that is written to in the given pipeline stages.
    pub fn storage_image(mut self, resource: &str, stage: vk::PipelineStageFlags2) -> Self {
        self.inner.resources.push(PassResource::new(
            resource,
            ResourceUsage::ShaderWrite {
                stage,
            },
            None,
        ));
        self
    }

    /// Set the function to be called when recording this pass.
    pub fn execute_fn<F>(mut self, exec: F) -> Self
    where
        F: FnMut(&mut R, &PassContext) -> Result<()> + 'cb, {
        self.inner.execute = Box::new(exec);
        self
    }

    /// Set the executor to be called when recording this pass.
    pub fn executor(mut self, exec: impl PassExecutor<R> + 'cb) -> Self {
        self.inner.execute = Box::new(exec);
        self
    }

    /// Obtain a built [`Pass`] object.
    pub fn build(self) -> Pass<'cb, R> {
        self.inner
    }
}
