//! GPU-side constant buffer payloads.
//!
//! Every struct here is `#[repr(C)]` and `Pod`: the bytes uploaded are exactly
//! the struct's memory. Sizes are multiples of 16 so each payload fills whole
//! shader constant registers.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use shadekit_common::rgba;
use std::mem::size_of;

/// Point-light capacity of the lighting buffer.
pub const MAX_POINT_LIGHTS: usize = 4;

/// A 4x4 matrix as uploaded: the transpose of the authored matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MatrixPayload {
    pub m: [[f32; 4]; 4],
}

impl MatrixPayload {
    /// Transposes `matrix` for upload. Every matrix setter goes through here.
    pub fn transposed(matrix: Mat4) -> Self {
        Self {
            m: matrix.transpose().to_cols_array_2d(),
        }
    }

    /// The matrix as the GPU sees it, i.e. the transpose of what was authored.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.m)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorPayload {
    pub rgba: [f32; 4],
}

impl ColorPayload {
    pub fn new(color: Vec4) -> Self {
        Self { rgba: rgba(color) }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalLight {
    /// World-space direction the light travels; `w` is unused.
    pub direction: [f32; 4],
    pub color: [f32; 4],
}

impl DirectionalLight {
    pub fn new(direction: Vec4, color: Vec4) -> Self {
        Self {
            direction: direction.to_array(),
            color: rgba(color),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpecularLight {
    pub camera_position: [f32; 3],
    pub power: f32,
    pub color: [f32; 4],
}

impl SpecularLight {
    pub fn new(camera_position: Vec3, power: f32, color: Vec4) -> Self {
        Self {
            camera_position: camera_position.to_array(),
            power,
            color: rgba(color),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub position: [f32; 3],
    pub range: f32,
    /// RGB plus an intensity multiplier in `w`.
    pub color: [f32; 4],
}

impl PointLight {
    pub fn new(position: Vec3, range: f32, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            range,
            color: rgba(color),
        }
    }
}

/// The point-light array plus the count the pixel program treats as active.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightBuffer {
    pub lights: [PointLight; MAX_POINT_LIGHTS],
    pub count: u32,
    pub _pad: [u32; 3],
}

impl Default for PointLightBuffer {
    fn default() -> Self {
        Self::zeroed()
    }
}

const _: () = assert!(size_of::<MatrixPayload>() == 64);
const _: () = assert!(size_of::<ColorPayload>() == 16);
const _: () = assert!(size_of::<DirectionalLight>() == 32);
const _: () = assert!(size_of::<SpecularLight>() == 32);
const _: () = assert!(size_of::<PointLight>() == 32);
const _: () = assert!(size_of::<PointLightBuffer>() == 144);
