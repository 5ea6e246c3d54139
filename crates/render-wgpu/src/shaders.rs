//! WGSL programs for the five pipeline programs.
//!
//! Bind group convention (see `gpu.rs`): group 0 holds vertex-stage constant
//! buffers, group 1 pixel-stage constant buffers, group 2 samplers, group 3
//! textures, each with binding index equal to the slot number.
//!
//! Matrices arrive transposed, so vectors multiply from the left.

use shadekit_render::{InMemoryShaders, ShaderProgram};

pub const VERTEX_2D: &str = r#"
struct Matrix {
    m: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> projection: Matrix;
@group(0) @binding(1) var<uniform> world: Matrix;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(v.position, 1.0) * world.m * projection.m;
    out.color = v.color;
    out.uv = v.uv;
    return out;
}
"#;

pub const PIXEL_2D: &str = r#"
@group(2) @binding(0) var samp: sampler;
@group(3) @binding(0) var tex: texture_2d<f32>;

struct PixelInput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

@fragment
fn fs_main(in: PixelInput) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, in.uv) * in.color;
}
"#;

pub const VERTEX_3D: &str = r#"
struct Matrix {
    m: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> world: Matrix;
@group(0) @binding(1) var<uniform> view: Matrix;
@group(0) @binding(2) var<uniform> projection: Matrix;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    let world_position = vec4<f32>(v.position, 1.0) * world.m;

    var out: VertexOutput;
    out.clip_position = world_position * view.m * projection.m;
    out.world_position = world_position.xyz;
    out.world_normal = normalize((vec4<f32>(v.normal, 0.0) * world.m).xyz);
    out.color = v.color;
    out.uv = v.uv;
    return out;
}
"#;

pub const PIXEL_3D: &str = r#"
struct Color {
    rgba: vec4<f32>,
};

struct Directional {
    direction: vec4<f32>,
    color: vec4<f32>,
};

struct Specular {
    camera_position: vec3<f32>,
    power: f32,
    color: vec4<f32>,
};

struct PointLight {
    position: vec3<f32>,
    range: f32,
    color: vec4<f32>,
};

struct PointLights {
    lights: array<PointLight, 4>,
    count: u32,
};

@group(1) @binding(0) var<uniform> diffuse: Color;
@group(1) @binding(1) var<uniform> ambient: Color;
@group(1) @binding(2) var<uniform> directional: Directional;
@group(1) @binding(3) var<uniform> specular: Specular;
@group(1) @binding(4) var<uniform> point_lights: PointLights;

@group(2) @binding(0) var samp: sampler;
@group(3) @binding(0) var tex: texture_2d<f32>;

struct PixelInput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

@fragment
fn fs_main(in: PixelInput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let to_light = -normalize(directional.direction.xyz);
    var light = ambient.rgba.rgb + directional.color.rgb * max(dot(n, to_light), 0.0);

    let to_eye = normalize(specular.camera_position - in.world_position);
    let half_dir = normalize(to_light + to_eye);
    let highlight = pow(max(dot(n, half_dir), 0.0), max(specular.power, 1.0)) * specular.color.rgb;

    let count = min(point_lights.count, 4u);
    for (var i = 0u; i < count; i = i + 1u) {
        let pl = point_lights.lights[i];
        let d = pl.position - in.world_position;
        let falloff = clamp(1.0 - length(d) / max(pl.range, 0.0001), 0.0, 1.0);
        light = light + pl.color.rgb * pl.color.a * falloff * falloff;
    }

    let base = textureSample(tex, samp, in.uv) * in.color * diffuse.rgba;
    return vec4<f32>(base.rgb * light + highlight, base.a);
}
"#;

pub const PIXEL_FIELD: &str = r#"
struct Color {
    rgba: vec4<f32>,
};

struct Directional {
    direction: vec4<f32>,
    color: vec4<f32>,
};

struct Specular {
    camera_position: vec3<f32>,
    power: f32,
    color: vec4<f32>,
};

@group(1) @binding(3) var<uniform> ambient: Color;
@group(1) @binding(4) var<uniform> directional: Directional;
@group(1) @binding(5) var<uniform> specular: Specular;

@group(2) @binding(0) var samp: sampler;
@group(3) @binding(0) var ground_a: texture_2d<f32>;
@group(3) @binding(1) var ground_b: texture_2d<f32>;

struct PixelInput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

@fragment
fn fs_main(in: PixelInput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let to_light = -normalize(directional.direction.xyz);
    let light = ambient.rgba.rgb + directional.color.rgb * max(dot(n, to_light), 0.0);

    let to_eye = normalize(specular.camera_position - in.world_position);
    let half_dir = normalize(to_light + to_eye);
    let highlight = pow(max(dot(n, half_dir), 0.0), max(specular.power, 1.0)) * specular.color.rgb;

    // Vertex alpha selects between the two ground textures.
    let a = textureSample(ground_a, samp, in.uv);
    let b = textureSample(ground_b, samp, in.uv);
    let base = mix(a, b, in.color.a);
    return vec4<f32>(base.rgb * in.color.rgb * light + highlight, 1.0);
}
"#;

/// All five programs, ready for `PipelineManager::new` on a `WgpuDevice`.
pub fn embedded_shaders() -> InMemoryShaders {
    InMemoryShaders::new()
        .with(ShaderProgram::Vertex2d, VERTEX_2D.as_bytes())
        .with(ShaderProgram::Pixel2d, PIXEL_2D.as_bytes())
        .with(ShaderProgram::Vertex3d, VERTEX_3D.as_bytes())
        .with(ShaderProgram::Pixel3d, PIXEL_3D.as_bytes())
        .with(ShaderProgram::PixelField, PIXEL_FIELD.as_bytes())
}
