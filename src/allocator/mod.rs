//! Memory allocation for attachment images.
//!
//! # Allocator traits
//! These are defined in [`traits`], and can be implemented to supply a custom allocator to the
//! [`VulkanAttachmentBackend`](crate::graph::backend::VulkanAttachmentBackend).
//! # Default allocator
//! A default allocator based on the `gpu_allocator` crate is implemented in [`default_allocator`].

pub mod default_allocator;
pub mod memory_type;
pub mod traits;
