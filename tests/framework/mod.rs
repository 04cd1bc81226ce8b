#![allow(dead_code)]

use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use anyhow::Result;
use ash::vk::Handle;

use deimos::*;

pub const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D {
        width,
        height,
    }
}

/* Descriptor pools */

#[derive(Debug, Default)]
pub struct DescriptorBackendState {
    pub sets_per_pool: u32,
    pub pools: HashMap<vk::DescriptorPool, u32>,
    pub created: usize,
    pub destroyed: Vec<vk::DescriptorPool>,
    pub fragment_next: bool,
    pub device_lost: bool,
    pub acceleration_structures: bool,
    next_handle: u64,
}

/// Descriptor backend handing out fake handles. Every pool holds at most `sets_per_pool` sets.
#[derive(Debug, Clone)]
pub struct FakeDescriptorBackend {
    state: Rc<RefCell<DescriptorBackendState>>,
}

impl FakeDescriptorBackend {
    pub fn new(sets_per_pool: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(DescriptorBackendState {
                sets_per_pool,
                ..Default::default()
            })),
        }
    }

    pub fn with_acceleration_structures(self) -> Self {
        self.state.borrow_mut().acceleration_structures = true;
        self
    }

    pub fn state(&self) -> Ref<'_, DescriptorBackendState> {
        self.state.borrow()
    }

    pub fn created_pools(&self) -> usize {
        self.state.borrow().created
    }

    pub fn destroyed_pools(&self) -> usize {
        self.state.borrow().destroyed.len()
    }

    pub fn live_pools(&self) -> usize {
        self.state.borrow().pools.len()
    }

    /// The next allocation fails with `ERROR_FRAGMENTED_POOL`, no matter how full the pool is.
    pub fn fragment_next_allocation(&self) {
        self.state.borrow_mut().fragment_next = true;
    }

    pub fn lose_device(&self) {
        self.state.borrow_mut().device_lost = true;
    }
}

impl DescriptorBackend for FakeDescriptorBackend {
    fn create_pool(&self, _size: &DescriptorPoolSize) -> Result<vk::DescriptorPool> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = vk::DescriptorPool::from_raw(0x1000 + state.next_handle);
        state.pools.insert(handle, 0);
        state.created += 1;
        Ok(handle)
    }

    fn allocate_set(&self, pool: vk::DescriptorPool, _layout: vk::DescriptorSetLayout) -> ash::prelude::VkResult<vk::DescriptorSet> {
        let mut state = self.state.borrow_mut();
        if state.device_lost {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        if state.fragment_next {
            state.fragment_next = false;
            return Err(vk::Result::ERROR_FRAGMENTED_POOL);
        }
        let capacity = state.sets_per_pool;
        let count = state.pools.get_mut(&pool).ok_or(vk::Result::ERROR_UNKNOWN)?;
        if *count >= capacity {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        *count += 1;
        state.next_handle += 1;
        Ok(vk::DescriptorSet::from_raw(0x10_0000 + state.next_handle))
    }

    fn destroy_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state.borrow_mut();
        state.pools.remove(&pool);
        state.destroyed.push(pool);
    }

    fn acceleration_structures_enabled(&self) -> bool {
        self.state.borrow().acceleration_structures
    }
}

/* Attachment images */

#[derive(Debug)]
pub struct FakeImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub info: AttachmentImageInfo,
    alive: Rc<Cell<usize>>,
}

impl Drop for FakeImage {
    fn drop(&mut self) {
        self.alive.set(self.alive.get() - 1);
    }
}

/// Attachment backend that records every image it was asked to create.
#[derive(Debug, Default)]
pub struct FakeAttachmentBackend {
    pub created: Vec<AttachmentImageInfo>,
    alive: Rc<Cell<usize>>,
}

impl FakeAttachmentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts images created by this backend that were not dropped yet.
    pub fn alive_counter(&self) -> Rc<Cell<usize>> {
        self.alive.clone()
    }
}

impl AttachmentBackend for FakeAttachmentBackend {
    type Image = FakeImage;

    fn create_image(&mut self, info: &AttachmentImageInfo) -> Result<FakeImage> {
        self.created.push(*info);
        self.alive.set(self.alive.get() + 1);
        let id = self.created.len() as u64;
        Ok(FakeImage {
            image: vk::Image::from_raw(0x20_0000 + id),
            view: vk::ImageView::from_raw(0x30_0000 + id),
            info: *info,
            alive: self.alive.clone(),
        })
    }

    fn handles(image: &FakeImage) -> (vk::Image, vk::ImageView) {
        (image.image, image.view)
    }
}

/* Swapchain */

/// Swapchain with fake images. Acquire hands out images round robin unless a status was scripted.
#[derive(Debug)]
pub struct FakeSwapchain {
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
    pub acquire_script: VecDeque<SwapchainStatus<u32>>,
    pub present_script: VecDeque<SwapchainStatus<()>>,
    pub acquired: Vec<u32>,
    pub presented: Vec<u32>,
    next_image: u32,
    generation: u64,
    invalid: bool,
}

impl FakeSwapchain {
    pub fn new(image_count: usize, extent: vk::Extent2D) -> Self {
        let mut swapchain = Self {
            images: vec![],
            views: vec![],
            extent,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            acquired: vec![],
            presented: vec![],
            next_image: 0,
            generation: 0,
            invalid: false,
        };
        swapchain.make_images(image_count);
        swapchain
    }

    fn make_images(&mut self, count: usize) {
        self.generation += 1;
        let base = self.generation * 0x100;
        self.images = (0..count as u64).map(|i| vk::Image::from_raw(base + i + 1)).collect();
        self.views = (0..count as u64)
            .map(|i| vk::ImageView::from_raw(0x1_0000 + base + i + 1))
            .collect();
    }

    /// Simulate recreating the swapchain at a new size. This gives it new images and makes it valid again.
    pub fn resize(&mut self, extent: vk::Extent2D) {
        let count = self.images.len();
        self.extent = extent;
        self.make_images(count);
        self.next_image = 0;
        self.invalid = false;
    }
}

impl SwapchainInterface for FakeSwapchain {
    fn images(&self) -> &[vk::Image] {
        &self.images
    }

    fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    fn format(&self) -> vk::Format {
        SWAPCHAIN_FORMAT
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire_next_image(&mut self, _signal: vk::Semaphore) -> Result<SwapchainStatus<u32>> {
        if let Some(status) = self.acquire_script.pop_front() {
            return Ok(status);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        self.acquired.push(index);
        Ok(SwapchainStatus::Ready(index))
    }

    fn present(&mut self, image_index: u32, _wait: vk::Semaphore) -> Result<SwapchainStatus<()>> {
        self.presented.push(image_index);
        Ok(self.present_script.pop_front().unwrap_or(SwapchainStatus::Ready(())))
    }

    fn is_invalid(&self) -> bool {
        self.invalid
    }

    fn invalidate(&mut self) {
        self.invalid = true;
    }
}

pub fn surface_for(swapchain: &FakeSwapchain) -> SurfaceDetails {
    SurfaceDetails {
        extent: swapchain.extent,
        color_format: SWAPCHAIN_FORMAT,
        depth_format: DEPTH_FORMAT,
    }
}

/* Command recording */

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordedBarrier {
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

impl From<&vk::ImageMemoryBarrier2> for RecordedBarrier {
    fn from(barrier: &vk::ImageMemoryBarrier2) -> Self {
        Self {
            image: barrier.image,
            aspect: barrier.subresource_range.aspect_mask,
            src_stage: barrier.src_stage_mask,
            src_access: barrier.src_access_mask,
            dst_stage: barrier.dst_stage_mask,
            dst_access: barrier.dst_access_mask,
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Barrier(Vec<RecordedBarrier>),
    BeginRendering(RenderingInfo),
    EndRendering,
    Draw(String),
}

/// Recorder that stores every command instead of sending it to a device.
#[derive(Debug, Default)]
pub struct RecordingCommands {
    pub commands: Vec<Command>,
}

impl RecordingCommands {
    pub fn draw(&mut self, label: &str) {
        self.commands.push(Command::Draw(label.to_owned()));
    }

    pub fn barrier_batches(&self) -> Vec<&[RecordedBarrier]> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Barrier(barriers) => Some(barriers.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn rendering_infos(&self) -> Vec<&RenderingInfo> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginRendering(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    /// Compact summary of the command stream, for comparing the recording order.
    pub fn summary(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| match command {
                Command::Barrier(barriers) => format!("barrier x{}", barriers.len()),
                Command::BeginRendering(_) => "begin".to_owned(),
                Command::EndRendering => "end".to_owned(),
                Command::Draw(label) => format!("draw {label}"),
            })
            .collect()
    }
}

impl BarrierRecorder for RecordingCommands {
    fn pipeline_barrier(&mut self, barriers: &[vk::ImageMemoryBarrier2]) {
        self.commands
            .push(Command::Barrier(barriers.iter().map(RecordedBarrier::from).collect()));
    }

    fn begin_rendering(&mut self, info: &RenderingInfo) {
        self.commands.push(Command::BeginRendering(info.clone()));
    }

    fn end_rendering(&mut self) {
        self.commands.push(Command::EndRendering);
    }
}

/* Frame slots */

#[derive(Debug, Default)]
pub struct FakeFrameBackend {
    pub waited: Vec<usize>,
    pub begun: Vec<usize>,
    pub submitted: Vec<(usize, RecordingCommands)>,
    pub resets: usize,
}

impl FakeFrameBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_submission(&self) -> Option<&RecordingCommands> {
        self.submitted.last().map(|(_, commands)| commands)
    }
}

impl FrameBackend for FakeFrameBackend {
    type Recorder = RecordingCommands;

    fn wait_for_frame(&mut self, slot: usize) -> Result<()> {
        self.waited.push(slot);
        Ok(())
    }

    fn begin_frame(&mut self, slot: usize) -> Result<RecordingCommands> {
        self.begun.push(slot);
        Ok(RecordingCommands::default())
    }

    fn submit_frame(&mut self, slot: usize, recorder: RecordingCommands) -> Result<()> {
        self.submitted.push((slot, recorder));
        Ok(())
    }

    fn image_ready(&self, slot: usize) -> vk::Semaphore {
        vk::Semaphore::from_raw(0x100 + slot as u64)
    }

    fn render_finished(&self, slot: usize) -> vk::Semaphore {
        vk::Semaphore::from_raw(0x200 + slot as u64)
    }

    fn reset_frame_sync(&mut self) -> Result<()> {
        self.resets += 1;
        Ok(())
    }
}

/* Setup helpers */

pub struct Context {
    pub resources: RenderResources<FakeAttachmentBackend>,
    pub swapchain: FakeSwapchain,
    pub surface: SurfaceDetails,
    pub settings: RenderSettings,
}

/// Creates render resources for a fake 1280x720 swapchain with three images.
pub fn make_context() -> Result<Context> {
    make_context_with(RenderSettingsBuilder::new().build()?)
}

pub fn make_context_with(settings: RenderSettings) -> Result<Context> {
    init_logger();
    let swapchain = FakeSwapchain::new(3, extent(1280, 720));
    let surface = surface_for(&swapchain);
    let resources = RenderResources::new(FakeAttachmentBackend::new(), &swapchain, &surface, &settings)?;
    Ok(Context {
        resources,
        swapchain,
        surface,
        settings,
    })
}

/// Check whether an error chain contains a deimos error matching `pred`.
pub fn is_error(err: &anyhow::Error, pred: impl Fn(&Error) -> bool) -> bool {
    err.downcast_ref::<Error>().map(pred).unwrap_or(false)
}
