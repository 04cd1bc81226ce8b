//! The render graph is the ordered list of passes the renderer records each frame.
//!
//! Passes are declared through [`RenderGraphBuilder::add_pass()`] and bound to the attachments in [`RenderResources`]
//! when the graph is built. Passes are recorded in declaration order, and barriers are emitted in that same order.

use std::collections::HashSet;

use anyhow::Result;

use crate::graph::attachment::AttachmentKind;
use crate::graph::backend::AttachmentBackend;
use crate::graph::pass::Pass;
use crate::graph::render_resources::RenderResources;
use crate::graph::resource::ResourceUsage;
use crate::Error;

/// Collects passes for a [`RenderGraph`].
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub struct RenderGraphBuilder<'cb, R> {
    passes: Vec<Pass<'cb, R>>,
    names: HashSet<String>,
}

impl<'cb, R> RenderGraphBuilder<'cb, R> {
    /// Create an empty render graph builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pass to the graph. It will be recorded after every pass added before it.
    /// # Errors
    /// Fails with [`Error::DuplicateResource`] if a pass with the same name was already added.
    pub fn add_pass(mut self, pass: Pass<'cb, R>) -> Result<Self> {
        if !self.names.insert(pass.name.clone()) {
            return Err(Error::DuplicateResource(pass.name.clone()).into());
        }
        self.passes.push(pass);
        Ok(self)
    }

    /// Bind every resource used by the passes to its attachment container.
    /// # Errors
    /// * Fails with [`Error::NoResourceBound`] if a pass uses a name that is not registered in `resources`.
    /// * Fails if a depth attachment is used as a color attachment or the other way around.
    pub fn build<B: AttachmentBackend>(mut self, resources: &RenderResources<B>) -> Result<RenderGraph<'cb, R>> {
        for pass in &mut self.passes {
            for resource in &mut pass.resources {
                let index = resources
                    .try_get_attachment_index(resource.hash)
                    .ok_or_else(|| Error::NoResourceBound(resource.name.clone()))?;
                let kind = resources
                    .container(index)
                    .ok_or(Error::InvalidAttachmentIndex(index))?
                    .kind();
                let compatible = match resource.usage {
                    ResourceUsage::ColorAttachment {
                        ..
                    } => kind == AttachmentKind::Color,
                    ResourceUsage::DepthAttachment {
                        ..
                    } => kind == AttachmentKind::Depth,
                    _ => true,
                };
                if !compatible {
                    return Err(Error::Uncategorized("Attachment bound with a usage that does not match its kind").into());
                }
                resource.container = Some(index);
            }
        }
        Ok(RenderGraph {
            passes: self.passes,
        })
    }
}

/// A render graph with all of its resources bound, ready to be recorded by the
/// [`Renderer`](crate::wsi::renderer::Renderer).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RenderGraph<'cb, R> {
    pub(crate) passes: Vec<Pass<'cb, R>>,
}

impl<'cb, R> RenderGraph<'cb, R> {
    /// All passes in recording order.
    pub fn passes(&self) -> &[Pass<'cb, R>] {
        &self.passes
    }

    /// Number of passes in the graph.
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }
}
