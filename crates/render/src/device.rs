use crate::error::DeviceError;
use sha2::{Digest, Sha256};
use shadekit_common::{FilterMode, ShaderStage};

/// Per-vertex attribute format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One field of a vertex, matched to the program input by semantic name.
///
/// Elements are append-aligned: each starts where the previous one ends and
/// the shader input location is the element's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: &'static str,
    pub format: VertexFormat,
}

/// Byte offset of every element in an append-aligned layout.
pub fn element_offsets(elements: &[InputElement]) -> Vec<u32> {
    elements
        .iter()
        .scan(0u32, |offset, e| {
            let start = *offset;
            *offset += e.format.size();
            Some(start)
        })
        .collect()
}

/// Vertex stride of an append-aligned layout.
pub fn layout_stride(elements: &[InputElement]) -> u32 {
    elements.iter().map(|e| e.format.size()).sum()
}

/// How a constant buffer's contents get replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// GPU-resident; updated by whole-resource replace.
    Default,
    /// CPU-writable; updated by map, copy, unmap.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub label: &'static str,
    pub filter: FilterMode,
    pub address: AddressMode,
    /// Only honored by anisotropic filtering.
    pub max_anisotropy: u16,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerDesc {
    /// Wrap addressing on U, V and W with the full mip chain available.
    pub fn wrap(filter: FilterMode) -> Self {
        let label = match filter {
            FilterMode::Point => "sampler_point",
            FilterMode::Linear => "sampler_linear",
            FilterMode::Anisotropic => "sampler_anisotropic",
        };
        Self {
            label,
            filter,
            address: AddressMode::Wrap,
            max_anisotropy: 16,
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

/// Identity of a shader byte-code blob.
///
/// Input layouts record the fingerprint of the vertex program they were built
/// from so a mismatched pairing can be detected.
pub fn fingerprint(bytecode: &[u8]) -> u64 {
    let digest = Sha256::digest(bytecode);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Native graphics device plus its immediate context.
///
/// Creation calls return owned handles. Binding calls follow the slot model:
/// each stage has numbered constant buffer, sampler and texture slots that
/// keep their contents until rebound.
pub trait GraphicsDevice {
    type VertexProgram;
    type PixelProgram;
    type InputLayout;
    type Buffer;
    type Sampler;
    type TextureView;

    fn create_vertex_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<Self::VertexProgram, DeviceError>;

    fn create_pixel_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<Self::PixelProgram, DeviceError>;

    /// Builds a layout against the input signature found in `bytecode`, which
    /// must be the exact byte-code of the vertex program it will accompany.
    fn create_input_layout(
        &mut self,
        label: &str,
        elements: &[InputElement],
        bytecode: &[u8],
    ) -> Result<Self::InputLayout, DeviceError>;

    /// Creates a zero-filled constant buffer of `desc.size` bytes.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Self::Buffer, DeviceError>;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<Self::Sampler, DeviceError>;

    fn set_vertex_program(&mut self, program: &Self::VertexProgram);

    fn set_pixel_program(&mut self, program: &Self::PixelProgram);

    fn set_input_layout(&mut self, layout: &Self::InputLayout);

    /// Binds `buffers` to consecutive slots starting at `start_slot`.
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[&Self::Buffer],
    );

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[&Self::Sampler]);

    fn set_textures(&mut self, stage: ShaderStage, start_slot: u32, views: &[&Self::TextureView]);

    /// Replaces the whole contents of a default-usage buffer.
    fn replace_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]);

    /// Maps a dynamic buffer discarding its contents, copies `bytes`, unmaps.
    fn write_mapped(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<(), DeviceError>;
}
