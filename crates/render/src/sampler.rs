use crate::device::{GraphicsDevice, SamplerDesc};
use crate::error::DeviceError;
use shadekit_common::FilterMode;

/// One pre-created sampler per [`FilterMode`], looked up by the filter tag.
pub struct SamplerTable<S> {
    samplers: [S; 3],
}

impl<S> SamplerTable<S> {
    pub fn create<D>(device: &mut D) -> Result<Self, DeviceError>
    where
        D: GraphicsDevice<Sampler = S>,
    {
        let point = device.create_sampler(&SamplerDesc::wrap(FilterMode::Point))?;
        let linear = device.create_sampler(&SamplerDesc::wrap(FilterMode::Linear))?;
        let anisotropic = device.create_sampler(&SamplerDesc::wrap(FilterMode::Anisotropic))?;
        Ok(Self {
            samplers: [point, linear, anisotropic],
        })
    }

    pub fn resolve(&self, filter: FilterMode) -> &S {
        &self.samplers[filter.index()]
    }
}
