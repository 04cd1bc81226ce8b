//! Exposes settings that control allocation policies and frame pacing.

use anyhow::Result;

use crate::Error;

/// Settings for a [`DescriptorAllocator`](crate::DescriptorAllocator).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DescriptorAllocatorSettings {
    /// Number of descriptors of each common descriptor type a single pool can hold.
    pub descriptors_per_type: u32,
    /// Maximum number of descriptor sets that can be allocated from a single pool.
    pub max_sets_per_pool: u32,
    /// Number of pools created at once when the free list runs dry.
    pub pools_per_batch: u32,
    /// Number of [`DescriptorAllocator::next_frame()`](crate::DescriptorAllocator::next_frame) calls a destroyed
    /// pool is kept alive for, because the GPU may still be reading from it.
    pub pool_deletion_delay: u32,
}

impl Default for DescriptorAllocatorSettings {
    fn default() -> Self {
        Self {
            descriptors_per_type: 1024,
            max_sets_per_pool: 1024,
            pools_per_batch: 3,
            pool_deletion_delay: 2,
        }
    }
}

impl DescriptorAllocatorSettings {
    /// Check whether all values are in their allowed range.
    /// # Errors
    /// * Fails if `pools_per_batch` is not 2 or 3.
    /// * Fails if a pool could not hold a single descriptor or set.
    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.pools_per_batch) {
            return Err(Error::Uncategorized("pools_per_batch must be 2 or 3").into());
        }
        if self.descriptors_per_type == 0 || self.max_sets_per_pool == 0 {
            return Err(Error::Uncategorized("Descriptor pools must be able to hold at least one set").into());
        }
        Ok(())
    }
}

/// Settings used to initialize the deimos render loop and its allocators.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderSettings {
    /// Number of frames in flight. A frame in-flight is a frame that is rendering on the GPU or scheduled to do so.
    /// Either 2 or 3.
    pub frames_in_flight: usize,
    /// Number of descriptors of each common descriptor type a single descriptor pool can hold.
    pub descriptors_per_type: u32,
    /// Maximum number of descriptor sets in a single descriptor pool.
    pub max_sets_per_pool: u32,
    /// Number of descriptor pools created at once. Either 2 or 3.
    pub pools_per_batch: u32,
    /// Frames an emptied and exhausted descriptor pool lives on before it is destroyed.
    /// Set to `None` to use the number of frames in flight.
    pub pool_deletion_delay: Option<u32>,
    /// Allow multisampled depth attachments with a transient resolve. Off by default, since the resolve
    /// semantics of depth are not settled. When off, multisampled depth requests fall back to a single sample.
    pub depth_multisample: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let descriptors = DescriptorAllocatorSettings::default();
        Self {
            frames_in_flight: 2,
            descriptors_per_type: descriptors.descriptors_per_type,
            max_sets_per_pool: descriptors.max_sets_per_pool,
            pools_per_batch: descriptors.pools_per_batch,
            pool_deletion_delay: None,
            depth_multisample: false,
        }
    }
}

impl RenderSettings {
    /// Check whether all values are in their allowed range.
    /// # Errors
    /// * Fails if `frames_in_flight` is not 2 or 3.
    /// * Fails if `pools_per_batch` is not 2 or 3.
    /// * Fails if a pool could not hold a single descriptor or set.
    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.frames_in_flight) {
            return Err(Error::InvalidFramesInFlight(self.frames_in_flight).into());
        }
        self.descriptor_allocator().validate()
    }

    /// Derive the settings for a descriptor allocator.
    pub fn descriptor_allocator(&self) -> DescriptorAllocatorSettings {
        DescriptorAllocatorSettings {
            descriptors_per_type: self.descriptors_per_type,
            max_sets_per_pool: self.max_sets_per_pool,
            pools_per_batch: self.pools_per_batch,
            pool_deletion_delay: self
                .pool_deletion_delay
                .unwrap_or(self.frames_in_flight as u32),
        }
    }
}

/// The settings builder is a convenience struct to easily create [`RenderSettings`].
///
/// For information about each of the fields, see [`RenderSettings`]
/// # Example
/// ```
/// # use deimos::*;
/// let settings = RenderSettingsBuilder::new()
///     .frames_in_flight(3)
///     .descriptors_per_type(4096)
///     .build()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct RenderSettingsBuilder {
    inner: RenderSettings,
}

impl RenderSettingsBuilder {
    /// Create a new settings builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of frames in flight.
    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.inner.frames_in_flight = count;
        self
    }

    /// Sets the per-type descriptor capacity of each descriptor pool.
    pub fn descriptors_per_type(mut self, count: u32) -> Self {
        self.inner.descriptors_per_type = count;
        self
    }

    /// Sets the maximum number of sets of each descriptor pool.
    pub fn max_sets_per_pool(mut self, count: u32) -> Self {
        self.inner.max_sets_per_pool = count;
        self
    }

    /// Sets how many descriptor pools are created at once.
    pub fn pools_per_batch(mut self, count: u32) -> Self {
        self.inner.pools_per_batch = count;
        self
    }

    /// Sets how many frames a dead descriptor pool is kept alive for.
    pub fn pool_deletion_delay(mut self, frames: u32) -> Self {
        self.inner.pool_deletion_delay = Some(frames);
        self
    }

    /// Enable or disable multisampled depth attachments.
    pub fn depth_multisample(mut self, enabled: bool) -> Self {
        self.inner.depth_multisample = enabled;
        self
    }

    /// Build the resulting settings.
    /// # Errors
    /// Fails if any of the values is out of range, see [`RenderSettings::validate()`].
    pub fn build(self) -> Result<RenderSettings> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
