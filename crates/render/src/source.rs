use crate::config::ShaderConfig;
use crate::error::PipelineError;
use shadekit_common::ShaderStage;
use std::collections::BTreeMap;

/// The five programs the pipeline manager loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderProgram {
    Vertex2d,
    Pixel2d,
    Vertex3d,
    Pixel3d,
    PixelField,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 5] = [
        ShaderProgram::Vertex2d,
        ShaderProgram::Pixel2d,
        ShaderProgram::Vertex3d,
        ShaderProgram::Pixel3d,
        ShaderProgram::PixelField,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ShaderProgram::Vertex2d => "vertex_2d",
            ShaderProgram::Pixel2d => "pixel_2d",
            ShaderProgram::Vertex3d => "vertex_3d",
            ShaderProgram::Pixel3d => "pixel_3d",
            ShaderProgram::PixelField => "pixel_field",
        }
    }

    pub const fn stage(self) -> ShaderStage {
        match self {
            ShaderProgram::Vertex2d | ShaderProgram::Vertex3d => ShaderStage::Vertex,
            _ => ShaderStage::Pixel,
        }
    }
}

/// Supplies compiled program byte-code by program name.
pub trait ShaderSource {
    fn load(&self, program: ShaderProgram) -> Result<Vec<u8>, PipelineError>;
}

/// Reads each program whole from a file named by a [`ShaderConfig`].
#[derive(Debug, Clone, Default)]
pub struct ShaderDirectory {
    config: ShaderConfig,
}

impl ShaderDirectory {
    pub fn new(config: ShaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShaderConfig {
        &self.config
    }
}

impl ShaderSource for ShaderDirectory {
    fn load(&self, program: ShaderProgram) -> Result<Vec<u8>, PipelineError> {
        let path = self.config.path_for(program);
        std::fs::read(&path).map_err(|source| {
            tracing::error!("failed to open shader file: {}", path.display());
            PipelineError::Io { path, source }
        })
    }
}

/// Byte-code held in memory, e.g. shaders embedded in the binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShaders {
    blobs: BTreeMap<ShaderProgram, Vec<u8>>,
}

impl InMemoryShaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: ShaderProgram, bytecode: impl Into<Vec<u8>>) {
        self.blobs.insert(program, bytecode.into());
    }

    pub fn with(mut self, program: ShaderProgram, bytecode: impl Into<Vec<u8>>) -> Self {
        self.insert(program, bytecode);
        self
    }

    pub fn remove(&mut self, program: ShaderProgram) -> Option<Vec<u8>> {
        self.blobs.remove(&program)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ShaderSource for InMemoryShaders {
    fn load(&self, program: ShaderProgram) -> Result<Vec<u8>, PipelineError> {
        self.blobs
            .get(&program)
            .cloned()
            .ok_or_else(|| PipelineError::MissingResource(program.label().to_string()))
    }
}
