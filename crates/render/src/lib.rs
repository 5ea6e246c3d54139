//! Pipeline-state management for the game renderer.
//!
//! [`PipelineManager`] owns every shader program, input layout, constant
//! buffer and sampler, and exposes one entry point per drawing pass
//! (`begin_2d`, `begin_3d`, `begin_3d_field`) plus immediate-mode setters for
//! matrices, material color, lights and textures.
//!
//! Backends implement [`GraphicsDevice`]. [`RecordingDevice`] is an in-memory
//! backend that records every call for inspection.
//!
//! # Invariants
//! - Every constant buffer is exactly the size of the one payload it carries.
//! - Matrices are transposed before upload.
//! - The point-light buffer is only written through map/copy/unmap, once per
//!   `begin_3d`; every other buffer is replaced whole by its setter.
//! - The field pass never binds the diffuse or point-light slots.

pub mod bindings;
mod buffer;
mod config;
mod device;
mod error;
mod lighting;
mod manager;
pub mod payload;
mod recording;
mod sampler;
mod source;

pub use buffer::ConstantBuffer;
pub use config::ShaderConfig;
pub use device::{
    AddressMode, BufferDesc, BufferUsage, GraphicsDevice, InputElement, SamplerDesc, VertexFormat,
    element_offsets, fingerprint, layout_stride,
};
pub use error::{DeviceError, PipelineError};
pub use lighting::LightingState;
pub use manager::{PipelineManager, PipelineMode};
pub use recording::{
    BindingState, BufferRecord, Command, DrawRecord, ObjectId, ObjectKind, RecordedObject,
    RecordingDevice,
};
pub use sampler::SamplerTable;
pub use source::{InMemoryShaders, ShaderDirectory, ShaderProgram, ShaderSource};

/// Stub byte-code for every program, accepted by [`RecordingDevice`].
pub fn stub_shaders() -> InMemoryShaders {
    let mut shaders = InMemoryShaders::new();
    for program in ShaderProgram::ALL {
        let stub = format!("stub:{}", program.label());
        shaders.insert(program, stub.into_bytes());
    }
    shaders
}

pub fn crate_info() -> &'static str {
    "shadekit-render v0.1.0"
}
