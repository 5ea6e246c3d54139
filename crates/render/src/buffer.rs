use crate::device::{BufferDesc, BufferUsage, GraphicsDevice};
use crate::error::DeviceError;
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem::size_of;

/// A device constant buffer dedicated to one payload type.
///
/// The buffer is created with exactly `size_of::<T>()` bytes and only ever
/// receives a whole `T`, so size and payload cannot drift apart.
pub struct ConstantBuffer<T, B> {
    raw: B,
    label: &'static str,
    usage: BufferUsage,
    _payload: PhantomData<T>,
}

impl<T: Pod, B> ConstantBuffer<T, B> {
    pub fn create<D>(
        device: &mut D,
        label: &'static str,
        usage: BufferUsage,
    ) -> Result<Self, DeviceError>
    where
        D: GraphicsDevice<Buffer = B>,
    {
        const { assert!(size_of::<T>() > 0 && size_of::<T>() % 16 == 0) };
        let desc = BufferDesc {
            label,
            size: size_of::<T>() as u64,
            usage,
        };
        let raw = device.create_buffer(&desc)?;
        tracing::debug!(label, size = desc.size, ?usage, "created constant buffer");
        Ok(Self {
            raw,
            label,
            usage,
            _payload: PhantomData,
        })
    }

    pub fn raw(&self) -> &B {
        &self.raw
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Whole-resource replace. Only valid for default-usage buffers.
    pub fn replace<D>(&self, device: &mut D, value: &T)
    where
        D: GraphicsDevice<Buffer = B>,
    {
        debug_assert_eq!(
            self.usage,
            BufferUsage::Default,
            "{} is not a default-usage buffer",
            self.label
        );
        device.replace_buffer(&self.raw, bytemuck::bytes_of(value));
    }

    /// Map with discard, copy, unmap. Only valid for dynamic buffers.
    pub fn write_mapped<D>(&self, device: &mut D, value: &T) -> Result<(), DeviceError>
    where
        D: GraphicsDevice<Buffer = B>,
    {
        debug_assert_eq!(
            self.usage,
            BufferUsage::Dynamic,
            "{} is not a dynamic buffer",
            self.label
        );
        device.write_mapped(&self.raw, bytemuck::bytes_of(value))
    }
}
