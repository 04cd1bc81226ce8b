//! Exposes the Vulkan image resources backing render graph attachments.

pub mod image;
