//! Binding contract between the pipeline manager and the shader programs.
//!
//! Slot numbers must match the register indices the programs were compiled
//! against. The 2D and 3D pipelines number their slots independently.

use crate::device::{InputElement, VertexFormat};

/// Vertex-stage constant buffer slots of the 2D pipeline.
pub mod vertex_2d {
    pub const PROJECTION: u32 = 0;
    pub const WORLD: u32 = 1;
}

/// Vertex-stage constant buffer slots shared by the lit and field pipelines.
pub mod vertex_3d {
    pub const WORLD: u32 = 0;
    pub const VIEW: u32 = 1;
    pub const PROJECTION: u32 = 2;
}

/// Pixel-stage constant buffer slots of the lit 3D pipeline.
pub mod pixel_3d {
    pub const DIFFUSE: u32 = 0;
    pub const AMBIENT: u32 = 1;
    pub const DIRECTIONAL: u32 = 2;
    pub const SPECULAR: u32 = 3;
    pub const POINT_LIGHTS: u32 = 4;
}

/// Pixel-stage constant buffer slots of the field pipeline. Diffuse color and
/// point lights are not consumed here.
pub mod pixel_field {
    pub const AMBIENT: u32 = 3;
    pub const DIRECTIONAL: u32 = 4;
    pub const SPECULAR: u32 = 5;
}

/// Pixel-stage sampler slot used by every pipeline.
pub const SAMPLER: u32 = 0;

/// First pixel-stage texture slot. The field pipeline also reads `TEXTURE + 1`.
pub const TEXTURE: u32 = 0;

// Slots are bound as contiguous runs.
const _: () = assert!(vertex_2d::WORLD == vertex_2d::PROJECTION + 1);
const _: () = assert!(
    vertex_3d::VIEW == vertex_3d::WORLD + 1 && vertex_3d::PROJECTION == vertex_3d::VIEW + 1
);
const _: () = assert!(
    pixel_3d::AMBIENT == pixel_3d::DIFFUSE + 1
        && pixel_3d::DIRECTIONAL == pixel_3d::AMBIENT + 1
        && pixel_3d::SPECULAR == pixel_3d::DIRECTIONAL + 1
        && pixel_3d::POINT_LIGHTS == pixel_3d::SPECULAR + 1
);
const _: () = assert!(
    pixel_field::DIRECTIONAL == pixel_field::AMBIENT + 1
        && pixel_field::SPECULAR == pixel_field::DIRECTIONAL + 1
);

/// Device labels of the constant buffers, one per payload.
pub mod label {
    pub const PROJECTION_2D: &str = "projection_2d";
    pub const WORLD_2D: &str = "world_2d";
    pub const WORLD_3D: &str = "world_3d";
    pub const VIEW_3D: &str = "view_3d";
    pub const PROJECTION_3D: &str = "projection_3d";
    pub const DIFFUSE: &str = "diffuse_color";
    pub const AMBIENT: &str = "light_ambient";
    pub const DIRECTIONAL: &str = "light_directional";
    pub const SPECULAR: &str = "light_specular";
    pub const POINT_LIGHTS: &str = "point_lights";
}

/// Position, color, texcoord.
pub const LAYOUT_2D: [InputElement; 3] = [
    InputElement {
        semantic: "POSITION",
        format: VertexFormat::Float32x3,
    },
    InputElement {
        semantic: "COLOR",
        format: VertexFormat::Float32x4,
    },
    InputElement {
        semantic: "TEXCOORD",
        format: VertexFormat::Float32x2,
    },
];

/// Position, normal, color, texcoord.
pub const LAYOUT_3D: [InputElement; 4] = [
    InputElement {
        semantic: "POSITION",
        format: VertexFormat::Float32x3,
    },
    InputElement {
        semantic: "NORMAL",
        format: VertexFormat::Float32x3,
    },
    InputElement {
        semantic: "COLOR",
        format: VertexFormat::Float32x4,
    },
    InputElement {
        semantic: "TEXCOORD",
        format: VertexFormat::Float32x2,
    },
];
