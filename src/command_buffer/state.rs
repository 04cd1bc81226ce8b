use ash::vk;

/// One attachment of a dynamic rendering scope.
#[derive(Derivative, Copy, Clone)]
#[derivative(Debug)]
pub struct RenderingAttachmentInfo {
    /// View rendered to. For a multisampled attachment, this is the transient view.
    pub image_view: vk::ImageView,
    /// Layout of `image_view` during rendering.
    pub image_layout: vk::ImageLayout,
    /// How samples are resolved into `resolve_image_view`.
    pub resolve_mode: Option<vk::ResolveModeFlags>,
    /// Single sampled view that receives the resolved result.
    pub resolve_image_view: Option<vk::ImageView>,
    /// Layout of `resolve_image_view` during rendering.
    pub resolve_image_layout: Option<vk::ImageLayout>,
    /// Load operation at the start of rendering
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation at the end of rendering
    pub store_op: vk::AttachmentStoreOp,
    /// Clear value, used with [`vk::AttachmentLoadOp::CLEAR`].
    #[derivative(Debug = "ignore")]
    pub clear_value: vk::ClearValue,
}

/// Describes a dynamic rendering scope, the equivalent of `VkRenderingInfo`.
#[derive(Debug, Clone)]
pub struct RenderingInfo {
    /// Rendering flags
    pub flags: vk::RenderingFlags,
    /// Area that is rendered to
    pub render_area: vk::Rect2D,
    /// Number of layers rendered to
    pub layer_count: u32,
    /// Multiview mask
    pub view_mask: u32,
    /// Color attachments in attachment index order
    pub color_attachments: Vec<RenderingAttachmentInfo>,
    /// Depth attachment
    pub depth_attachment: Option<RenderingAttachmentInfo>,
    /// Stencil attachment
    pub stencil_attachment: Option<RenderingAttachmentInfo>,
}

fn map_attachment(attachment: &RenderingAttachmentInfo) -> vk::RenderingAttachmentInfo {
    vk::RenderingAttachmentInfo {
        s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
        p_next: std::ptr::null(),
        image_view: attachment.image_view,
        image_layout: attachment.image_layout,
        resolve_mode: attachment.resolve_mode.unwrap_or(vk::ResolveModeFlags::NONE),
        resolve_image_view: attachment.resolve_image_view.unwrap_or_default(),
        resolve_image_layout: attachment.resolve_image_layout.unwrap_or(vk::ImageLayout::UNDEFINED),
        load_op: attachment.load_op,
        store_op: attachment.store_op,
        clear_value: attachment.clear_value,
    }
}

impl RenderingInfo {
    /// Call `f` with the Vulkan version of this struct. The pointers inside it are only valid during the call.
    pub fn with_vulkan<R>(&self, f: impl FnOnce(&vk::RenderingInfo) -> R) -> R {
        let color_attachments = self.color_attachments.iter().map(map_attachment).collect::<Vec<_>>();
        let depth_attachment = self.depth_attachment.as_ref().map(map_attachment);
        let stencil_attachment = self.stencil_attachment.as_ref().map(map_attachment);
        let info = vk::RenderingInfo {
            s_type: vk::StructureType::RENDERING_INFO,
            p_next: std::ptr::null(),
            flags: self.flags,
            render_area: self.render_area,
            layer_count: self.layer_count,
            view_mask: self.view_mask,
            color_attachment_count: color_attachments.len() as u32,
            p_color_attachments: color_attachments.as_ptr(),
            p_depth_attachment: match &depth_attachment {
                Some(attachment) => attachment,
                None => std::ptr::null(),
            },
            p_stencil_attachment: match &stencil_attachment {
                Some(attachment) => attachment,
                None => std::ptr::null(),
            },
        };
        f(&info)
    }
}
