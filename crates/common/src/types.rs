use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Texture filtering used by the pixel-stage sampler at slot 0.
///
/// Every `begin_*` pass takes one of these; each maps to a sampler object
/// created once at pipeline initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest-neighbor on min, mag and mip.
    #[default]
    Point,
    /// Bilinear on min and mag, linear between mips.
    Linear,
    /// Anisotropic filtering, max anisotropy 16.
    Anisotropic,
}

impl FilterMode {
    pub const ALL: [FilterMode; 3] = [
        FilterMode::Point,
        FilterMode::Linear,
        FilterMode::Anisotropic,
    ];

    /// Dense index into a per-filter lookup table.
    pub const fn index(self) -> usize {
        match self {
            FilterMode::Point => 0,
            FilterMode::Linear => 1,
            FilterMode::Anisotropic => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FilterMode::Point => "point",
            FilterMode::Linear => "linear",
            FilterMode::Anisotropic => "anisotropic",
        }
    }
}

/// Programmable pipeline stage that owns a slot numbering space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// Named RGBA colors used by game code. Components are linear, alpha last.
pub mod palette {
    use glam::Vec4;

    pub const WHITE: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
    pub const ORANGE: Vec4 = Vec4::new(1.0, 0.5, 0.0, 1.0);
}

/// Converts a color to the `[r, g, b, a]` layout used by GPU payloads.
pub fn rgba(color: Vec4) -> [f32; 4] {
    color.to_array()
}
