use crate::error::PipelineError;
use crate::source::ShaderProgram;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the compiled shader programs live on disk.
///
/// Missing fields fall back to the defaults, so a config file only needs to
/// name what differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory containing the program files.
    pub root: PathBuf,
    pub vertex_2d: String,
    pub pixel_2d: String,
    pub vertex_3d: String,
    pub pixel_3d: String,
    pub pixel_field: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Resource/Shader"),
            vertex_2d: "shader_vertex_2d.cso".into(),
            pixel_2d: "shader_pixel_2d.cso".into(),
            vertex_3d: "shader_vertex_3d.cso".into(),
            pixel_3d: "shader_pixel_3d.cso".into(),
            pixel_field: "shader_pixel_field.cso".into(),
        }
    }
}

impl ShaderConfig {
    /// Default file names under a different root directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn file_name(&self, program: ShaderProgram) -> &str {
        match program {
            ShaderProgram::Vertex2d => &self.vertex_2d,
            ShaderProgram::Pixel2d => &self.pixel_2d,
            ShaderProgram::Vertex3d => &self.vertex_3d,
            ShaderProgram::Pixel3d => &self.pixel_3d,
            ShaderProgram::PixelField => &self.pixel_field,
        }
    }

    pub fn path_for(&self, program: ShaderProgram) -> PathBuf {
        self.root.join(self.file_name(program))
    }

    /// Load a config from YAML, or JSON when the extension is `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| PipelineError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }
}
