use ash::vk;

use crate::graph::attachment::BarrierState;

/// How a pass uses one of its resources.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceUsage {
    /// The resource is presented after this pass.
    Present,
    /// Rendered to as a color attachment.
    ColorAttachment {
        /// Load operation at the start of the pass
        load_op: vk::AttachmentLoadOp,
    },
    /// Used as the depth attachment.
    DepthAttachment {
        /// Load operation at the start of the pass
        load_op: vk::AttachmentLoadOp,
    },
    /// Sampled in shaders.
    ShaderRead {
        /// Shader stages that sample the image
        stage: vk::PipelineStageFlags2,
    },
    /// Written to as a storage image.
    ShaderWrite {
        /// Shader stages that write to the image
        stage: vk::PipelineStageFlags2,
    },
}

impl ResourceUsage {
    /// Get the pipeline stages for this resource usage.
    pub fn stage(&self) -> vk::PipelineStageFlags2 {
        match *self {
            ResourceUsage::Present => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            // Loads, clears and stores of color attachments all happen in COLOR_ATTACHMENT_OUTPUT.
            ResourceUsage::ColorAttachment {
                ..
            } => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            // Loads happen in EARLY_FRAGMENT_TESTS, stores in LATE_FRAGMENT_TESTS.
            ResourceUsage::DepthAttachment {
                ..
            } => vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            ResourceUsage::ShaderRead {
                stage,
            } => stage,
            ResourceUsage::ShaderWrite {
                stage,
            } => stage,
        }
    }

    /// Get the access flags for this resource usage.
    pub fn access(&self) -> vk::AccessFlags2 {
        match *self {
            ResourceUsage::Present => vk::AccessFlags2::NONE,
            ResourceUsage::ColorAttachment {
                load_op,
            } => {
                if load_op == vk::AttachmentLoadOp::LOAD {
                    vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                } else {
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                }
            }
            // The depth test reads the attachment regardless of the load op.
            ResourceUsage::DepthAttachment {
                ..
            } => vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ResourceUsage::ShaderRead {
                ..
            } => vk::AccessFlags2::SHADER_SAMPLED_READ,
            ResourceUsage::ShaderWrite {
                ..
            } => vk::AccessFlags2::SHADER_STORAGE_WRITE,
        }
    }

    /// Get the image layout a resource must be in for this usage.
    pub fn layout(&self) -> vk::ImageLayout {
        match self {
            ResourceUsage::Present => vk::ImageLayout::PRESENT_SRC_KHR,
            ResourceUsage::ColorAttachment {
                ..
            } => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ResourceUsage::DepthAttachment {
                ..
            } => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ResourceUsage::ShaderRead {
                ..
            } => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ResourceUsage::ShaderWrite {
                ..
            } => vk::ImageLayout::GENERAL,
        }
    }

    /// The state an attachment must be in before a pass can use it like this.
    pub fn required_state(&self) -> BarrierState {
        BarrierState::new(self.stage(), self.access(), self.layout())
    }

    /// Whether this usage binds the resource as a render target.
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            ResourceUsage::ColorAttachment {
                ..
            } | ResourceUsage::DepthAttachment {
                ..
            }
        )
    }
}
