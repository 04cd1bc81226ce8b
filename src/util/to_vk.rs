//! Conversion of deimos value types, like clear values, into their raw Vulkan counterparts.

/// Convert a value into the Vulkan type it stands for.
pub trait IntoVulkanType {
    /// The raw Vulkan type
    type Output;

    /// Consume self and return the Vulkan value
    fn into_vulkan(self) -> Self::Output;
}
