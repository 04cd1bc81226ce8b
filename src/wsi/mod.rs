//! The wsi module provides utilities for presenting rendered frames.
//!
//! Window, surface and swapchain creation are left to the application. Deimos consumes them through the
//! [`SwapchainInterface`](swapchain::SwapchainInterface) and [`SurfaceInterface`](surface::SurfaceInterface) traits,
//! and drives the frame loop in the [`Renderer`](renderer::Renderer).

pub mod renderer;
pub mod surface;
pub mod swapchain;
