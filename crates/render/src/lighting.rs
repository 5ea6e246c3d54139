use crate::payload::{
    ColorPayload, DirectionalLight, MAX_POINT_LIGHTS, PointLight, PointLightBuffer, SpecularLight,
};
use bytemuck::Zeroable;
use glam::{Vec3, Vec4};

/// CPU-side copy of the current lighting parameters.
///
/// Ambient, directional and specular values mirror what was last uploaded.
/// The point-light array lives only here until the next 3D bind copies it to
/// the GPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingState {
    pub ambient: ColorPayload,
    pub directional: DirectionalLight,
    pub specular: SpecularLight,
    point_lights: PointLightBuffer,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            ambient: ColorPayload::zeroed(),
            directional: DirectionalLight::zeroed(),
            specular: SpecularLight::zeroed(),
            point_lights: PointLightBuffer::default(),
        }
    }
}

impl LightingState {
    /// Overwrites entry `index`. Returns `false` and leaves the array untouched
    /// when `index` is outside the point-light capacity.
    pub fn set_point_light(
        &mut self,
        index: usize,
        position: Vec3,
        range: f32,
        color: Vec4,
    ) -> bool {
        match self.point_lights.lights.get_mut(index) {
            Some(slot) => {
                *slot = PointLight::new(position, range, color);
                true
            }
            None => false,
        }
    }

    /// Stored as given. Values above the capacity are not rejected.
    pub fn set_point_light_count(&mut self, count: u32) {
        self.point_lights.count = count;
    }

    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.point_lights.lights.get(index)
    }

    pub fn point_light_count(&self) -> u32 {
        self.point_lights.count
    }

    /// The exact bytes the next 3D bind uploads.
    pub fn point_lights(&self) -> &PointLightBuffer {
        &self.point_lights
    }

    pub fn capacity(&self) -> usize {
        MAX_POINT_LIGHTS
    }
}
