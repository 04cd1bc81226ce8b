//! The render graph declares which passes run each frame and which named attachments they use.
//!
//! - [`render_resources`] owns the images behind every named attachment, and tracks the synchronization state
//! each of them was left in. See [`RenderResources`](render_resources::RenderResources).
//! - [`pass`] exposes the [`PassBuilder`](pass::PassBuilder) used to declare passes.
//! - [`render_graph`] binds declared passes to their attachments.
//!
//! Recording a built graph is the job of the [`Renderer`](crate::wsi::renderer::Renderer).
//!
//! # Example
//!
//! ```
//! use deimos::*;
//!
//! # fn example<B: AttachmentBackend, R: BarrierRecorder>(resources: &mut RenderResources<B>) -> anyhow::Result<()> {
//! resources.create_color_attachment(AttachmentSpec::new("scene"), vk::SampleCountFlags::TYPE_4)?;
//! resources.create_depth_attachment(AttachmentSpec::new("depth"), vk::SampleCountFlags::TYPE_1)?;
//!
//! let scene = PassBuilder::<R>::render("scene")
//!     .clear_color_attachment("scene", ClearColor::Float([0.0, 0.0, 0.0, 1.0]))?
//!     .clear_depth_attachment("depth", ClearDepthStencil { depth: 1.0, stencil: 0 })?
//!     .build();
//! let tonemap = PassBuilder::<R>::render("tonemap")
//!     .load_color_attachment("backbuffer")?
//!     .sample_image("scene", vk::PipelineStageFlags2::FRAGMENT_SHADER)
//!     .build();
//! let graph = RenderGraphBuilder::new()
//!     .add_pass(scene)?
//!     .add_pass(tonemap)?
//!     .build(resources)?;
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod backend;
pub mod name;
pub mod pass;
pub mod render_graph;
pub mod render_resources;
pub mod resource;
