//! wgpu backend for the shadekit pipeline manager.
//!
//! [`WgpuDevice`] implements [`shadekit_render::GraphicsDevice`] by keeping
//! D3D-style slot tables and resolving them into a cached render pipeline and
//! four bind groups on [`WgpuDevice::apply`]. [`embedded_shaders`] supplies WGSL
//! versions of all five programs.
//!
//! # Invariants
//! - Bind group `n` binding `s` is slot `s` of the table for group `n`.
//! - A pipeline is rebuilt only when the bound programs, layout or the set of
//!   occupied slots changes.

mod gpu;
mod shaders;

pub use gpu::{
    GROUP_PIXEL_BUFFERS, GROUP_SAMPLERS, GROUP_TEXTURES, GROUP_VERTEX_BUFFERS, WgpuBuffer,
    WgpuDevice, WgpuInputLayout, WgpuProgram, WgpuSampler, WgpuTexture,
};
pub use shaders::{PIXEL_2D, PIXEL_3D, PIXEL_FIELD, VERTEX_2D, VERTEX_3D, embedded_shaders};

pub fn crate_info() -> &'static str {
    "shadekit-render-wgpu v0.1.0"
}
