use crate::bindings::{
    self, LAYOUT_2D, LAYOUT_3D, label, pixel_3d, pixel_field, vertex_2d, vertex_3d,
};
use crate::buffer::ConstantBuffer;
use crate::device::{BufferUsage, GraphicsDevice, InputElement};
use crate::error::{DeviceError, PipelineError};
use crate::lighting::LightingState;
use crate::payload::{
    ColorPayload, DirectionalLight, MatrixPayload, PointLightBuffer, SpecularLight,
};
use crate::sampler::SamplerTable;
use crate::source::{ShaderProgram, ShaderSource};
use glam::{Mat4, Vec3, Vec4};
use shadekit_common::{FilterMode, ShaderStage, palette};

/// The pipeline configuration selected by the last `begin_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineMode {
    /// Textured 2D UI.
    Ui2d,
    /// Lit 3D objects: diffuse, ambient, directional, specular, point lights.
    Lit3d,
    /// Terrain: two blended textures, no diffuse color, no point lights.
    Field3d,
}

struct Programs<D: GraphicsDevice> {
    vertex_2d: D::VertexProgram,
    pixel_2d: D::PixelProgram,
    layout_2d: D::InputLayout,
    vertex_3d: D::VertexProgram,
    pixel_3d: D::PixelProgram,
    pixel_field: D::PixelProgram,
    layout_3d: D::InputLayout,
}

struct ConstantBuffers<B> {
    projection_2d: ConstantBuffer<MatrixPayload, B>,
    world_2d: ConstantBuffer<MatrixPayload, B>,
    world_3d: ConstantBuffer<MatrixPayload, B>,
    view_3d: ConstantBuffer<MatrixPayload, B>,
    projection_3d: ConstantBuffer<MatrixPayload, B>,
    diffuse: ConstantBuffer<ColorPayload, B>,
    ambient: ConstantBuffer<ColorPayload, B>,
    directional: ConstantBuffer<DirectionalLight, B>,
    specular: ConstantBuffer<SpecularLight, B>,
    point_lights: ConstantBuffer<PointLightBuffer, B>,
}

/// Owner of every shader program, input layout, constant buffer and sampler.
///
/// A frame is a sequence of passes. Each pass starts with one `begin_*` call,
/// which binds a complete program/layout/buffer/sampler set, followed by
/// setters and draws. Setters write through to the device immediately and
/// stay visible to every later draw until overwritten.
///
/// Nothing checks that a `begin_*` call preceded a draw.
pub struct PipelineManager<D: GraphicsDevice> {
    device: D,
    programs: Programs<D>,
    buffers: ConstantBuffers<D::Buffer>,
    samplers: SamplerTable<D::Sampler>,
    lighting: LightingState,
    diffuse: Vec4,
    mode: Option<PipelineMode>,
}

impl<D: GraphicsDevice> PipelineManager<D> {
    /// Loads all five programs, derives both input layouts, creates every
    /// constant buffer and sampler, and sets the diffuse color to white.
    ///
    /// Any missing resource or failed device call aborts initialization; no
    /// partially built manager is returned.
    pub fn new<S>(mut device: D, source: &S) -> Result<Self, PipelineError>
    where
        S: ShaderSource + ?Sized,
    {
        let _span = tracing::info_span!("pipeline_init").entered();

        let created = Self::create_objects(&mut device, source);
        let (programs, buffers, samplers) = match created {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!("pipeline initialization failed: {e}");
                return Err(e);
            }
        };

        let mut manager = Self {
            device,
            programs,
            buffers,
            samplers,
            lighting: LightingState::default(),
            diffuse: Vec4::ZERO,
            mode: None,
        };
        manager.set_diffuse_color(palette::WHITE);

        tracing::info!(
            "pipeline initialized: 5 programs, 2 layouts, 10 constant buffers, 3 samplers"
        );
        Ok(manager)
    }

    fn create_objects<S>(
        device: &mut D,
        source: &S,
    ) -> Result<(Programs<D>, ConstantBuffers<D::Buffer>, SamplerTable<D::Sampler>), PipelineError>
    where
        S: ShaderSource + ?Sized,
    {
        let (vertex_2d, layout_2d) =
            load_vertex_program(device, source, ShaderProgram::Vertex2d, &LAYOUT_2D)?;
        let pixel_2d = load_pixel_program(device, source, ShaderProgram::Pixel2d)?;
        let (vertex_3d, layout_3d) =
            load_vertex_program(device, source, ShaderProgram::Vertex3d, &LAYOUT_3D)?;
        let pixel_3d = load_pixel_program(device, source, ShaderProgram::Pixel3d)?;
        let pixel_field = load_pixel_program(device, source, ShaderProgram::PixelField)?;

        let programs = Programs {
            vertex_2d,
            pixel_2d,
            layout_2d,
            vertex_3d,
            pixel_3d,
            pixel_field,
            layout_3d,
        };
        let buffers = ConstantBuffers::create(device)
            .map_err(|e| PipelineError::device("constant buffers", e))?;
        let samplers = SamplerTable::create(device)
            .map_err(|e| PipelineError::device("sampler states", e))?;
        Ok((programs, buffers, samplers))
    }

    // --- Pass entry points ---

    /// 2D programs and layout, projection and world at vertex slots 0 and 1,
    /// sampler at pixel slot 0. Lighting and 3D state are left alone.
    pub fn begin_2d(&mut self, filter: FilterMode) {
        let p = &self.programs;
        let b = &self.buffers;
        let device = &mut self.device;

        device.set_vertex_program(&p.vertex_2d);
        device.set_pixel_program(&p.pixel_2d);
        device.set_input_layout(&p.layout_2d);
        device.set_constant_buffers(
            ShaderStage::Vertex,
            vertex_2d::PROJECTION,
            &[b.projection_2d.raw(), b.world_2d.raw()],
        );
        device.set_samplers(
            ShaderStage::Pixel,
            bindings::SAMPLER,
            &[self.samplers.resolve(filter)],
        );

        self.mode = Some(PipelineMode::Ui2d);
        tracing::trace!(filter = filter.name(), "begin 2d");
    }

    /// Lit 3D pass. Uploads the point-light array through the mapped path,
    /// then binds world/view/projection at vertex slots 0-2, the five
    /// lighting buffers at pixel slots 0-4 and the sampler at pixel slot 0.
    pub fn begin_3d(&mut self, filter: FilterMode) {
        let p = &self.programs;
        let b = &self.buffers;
        let device = &mut self.device;

        device.set_vertex_program(&p.vertex_3d);
        device.set_pixel_program(&p.pixel_3d);
        device.set_input_layout(&p.layout_3d);
        bind_vertex_3d(device, b);

        if let Err(e) = b.point_lights.write_mapped(device, self.lighting.point_lights()) {
            tracing::warn!("point lights not uploaded this pass: {e}");
        }
        device.set_constant_buffers(
            ShaderStage::Pixel,
            pixel_3d::DIFFUSE,
            &[
                b.diffuse.raw(),
                b.ambient.raw(),
                b.directional.raw(),
                b.specular.raw(),
                b.point_lights.raw(),
            ],
        );
        device.set_samplers(
            ShaderStage::Pixel,
            bindings::SAMPLER,
            &[self.samplers.resolve(filter)],
        );

        self.mode = Some(PipelineMode::Lit3d);
        tracing::trace!(filter = filter.name(), "begin 3d");
    }

    /// Terrain pass: the 3D vertex program with the field pixel program.
    /// Ambient, directional and specular go to pixel slots 3-5; the diffuse
    /// and point-light slots are not touched.
    pub fn begin_3d_field(&mut self, filter: FilterMode) {
        let p = &self.programs;
        let b = &self.buffers;
        let device = &mut self.device;

        device.set_vertex_program(&p.vertex_3d);
        device.set_pixel_program(&p.pixel_field);
        device.set_input_layout(&p.layout_3d);
        bind_vertex_3d(device, b);
        device.set_constant_buffers(
            ShaderStage::Pixel,
            pixel_field::AMBIENT,
            &[b.ambient.raw(), b.directional.raw(), b.specular.raw()],
        );
        device.set_samplers(
            ShaderStage::Pixel,
            bindings::SAMPLER,
            &[self.samplers.resolve(filter)],
        );

        self.mode = Some(PipelineMode::Field3d);
        tracing::trace!(filter = filter.name(), "begin 3d field");
    }

    // --- Matrices. Each is transposed before upload. ---

    pub fn set_projection_matrix_2d(&mut self, matrix: Mat4) {
        self.buffers
            .projection_2d
            .replace(&mut self.device, &MatrixPayload::transposed(matrix));
    }

    pub fn set_world_matrix_2d(&mut self, matrix: Mat4) {
        self.buffers
            .world_2d
            .replace(&mut self.device, &MatrixPayload::transposed(matrix));
    }

    pub fn set_world_matrix_3d(&mut self, matrix: Mat4) {
        self.buffers
            .world_3d
            .replace(&mut self.device, &MatrixPayload::transposed(matrix));
    }

    pub fn set_view_matrix_3d(&mut self, matrix: Mat4) {
        self.buffers
            .view_3d
            .replace(&mut self.device, &MatrixPayload::transposed(matrix));
    }

    pub fn set_projection_matrix_3d(&mut self, matrix: Mat4) {
        self.buffers
            .projection_3d
            .replace(&mut self.device, &MatrixPayload::transposed(matrix));
    }

    // --- Textures ---

    pub fn set_texture_2d(&mut self, view: &D::TextureView) {
        self.device.set_textures(ShaderStage::Pixel, bindings::TEXTURE, &[view]);
    }

    pub fn set_texture_3d(&mut self, view: &D::TextureView) {
        self.device.set_textures(ShaderStage::Pixel, bindings::TEXTURE, &[view]);
    }

    /// Binds the two ground textures the field program blends.
    pub fn set_field_textures(&mut self, first: &D::TextureView, second: &D::TextureView) {
        self.device
            .set_textures(ShaderStage::Pixel, bindings::TEXTURE, &[first, second]);
    }

    // --- Material and lights ---

    pub fn set_diffuse_color(&mut self, color: Vec4) {
        self.diffuse = color;
        self.buffers.diffuse.replace(&mut self.device, &ColorPayload::new(color));
    }

    pub fn set_light_ambient(&mut self, color: Vec4) {
        self.lighting.ambient = ColorPayload::new(color);
        self.buffers.ambient.replace(&mut self.device, &self.lighting.ambient);
    }

    pub fn set_light_directional(&mut self, direction: Vec4, color: Vec4) {
        self.lighting.directional = DirectionalLight::new(direction, color);
        self.buffers
            .directional
            .replace(&mut self.device, &self.lighting.directional);
    }

    pub fn set_light_specular(&mut self, camera_position: Vec3, power: f32, color: Vec4) {
        self.lighting.specular = SpecularLight::new(camera_position, power, color);
        self.buffers.specular.replace(&mut self.device, &self.lighting.specular);
    }

    /// Updates point light `index` in memory; it reaches the GPU on the next
    /// [`begin_3d`](Self::begin_3d). An index outside `0..4` does nothing.
    pub fn set_point_light(&mut self, index: usize, position: Vec3, range: f32, color: Vec4) {
        if !self.lighting.set_point_light(index, position, range, color) {
            tracing::trace!(index, "point light index out of range, ignored");
        }
    }

    /// How many point-light entries the lit program treats as active. The
    /// value is stored as given.
    pub fn set_point_light_count(&mut self, count: u32) {
        if count as usize > self.lighting.capacity() {
            tracing::warn!(
                count,
                capacity = self.lighting.capacity(),
                "point light count exceeds capacity"
            );
        }
        self.lighting.set_point_light_count(count);
    }

    // --- Inspection ---

    pub fn mode(&self) -> Option<PipelineMode> {
        self.mode
    }

    pub fn lighting(&self) -> &LightingState {
        &self.lighting
    }

    pub fn diffuse_color(&self) -> Vec4 {
        self.diffuse
    }

    /// The device, for draw submission. Binding or mutating pipeline objects
    /// through it bypasses the manager's bookkeeping.
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

impl<B> ConstantBuffers<B> {
    fn create<D>(device: &mut D) -> Result<Self, DeviceError>
    where
        D: GraphicsDevice<Buffer = B>,
    {
        let fixed = BufferUsage::Default;
        Ok(Self {
            projection_2d: ConstantBuffer::create(device, label::PROJECTION_2D, fixed)?,
            world_2d: ConstantBuffer::create(device, label::WORLD_2D, fixed)?,
            world_3d: ConstantBuffer::create(device, label::WORLD_3D, fixed)?,
            view_3d: ConstantBuffer::create(device, label::VIEW_3D, fixed)?,
            projection_3d: ConstantBuffer::create(device, label::PROJECTION_3D, fixed)?,
            diffuse: ConstantBuffer::create(device, label::DIFFUSE, fixed)?,
            ambient: ConstantBuffer::create(device, label::AMBIENT, fixed)?,
            directional: ConstantBuffer::create(device, label::DIRECTIONAL, fixed)?,
            specular: ConstantBuffer::create(device, label::SPECULAR, fixed)?,
            // Rewritten every lit pass through map/copy/unmap.
            point_lights: ConstantBuffer::create(
                device,
                label::POINT_LIGHTS,
                BufferUsage::Dynamic,
            )?,
        })
    }
}

fn bind_vertex_3d<D: GraphicsDevice>(device: &mut D, b: &ConstantBuffers<D::Buffer>) {
    device.set_constant_buffers(
        ShaderStage::Vertex,
        vertex_3d::WORLD,
        &[b.world_3d.raw(), b.view_3d.raw(), b.projection_3d.raw()],
    );
}

fn load_vertex_program<D, S>(
    device: &mut D,
    source: &S,
    program: ShaderProgram,
    elements: &[InputElement],
) -> Result<(D::VertexProgram, D::InputLayout), PipelineError>
where
    D: GraphicsDevice,
    S: ShaderSource + ?Sized,
{
    let label = program.label();
    let bytecode = source.load(program)?;
    let vs = device
        .create_vertex_program(label, &bytecode)
        .map_err(|e| PipelineError::device(format!("vertex program '{label}'"), e))?;
    let layout = device
        .create_input_layout(label, elements, &bytecode)
        .map_err(|e| PipelineError::device(format!("input layout for '{label}'"), e))?;
    tracing::debug!(
        program = label,
        bytes = bytecode.len(),
        "loaded vertex program"
    );
    Ok((vs, layout))
}

fn load_pixel_program<D, S>(
    device: &mut D,
    source: &S,
    program: ShaderProgram,
) -> Result<D::PixelProgram, PipelineError>
where
    D: GraphicsDevice,
    S: ShaderSource + ?Sized,
{
    let label = program.label();
    let bytecode = source.load(program)?;
    let ps = device
        .create_pixel_program(label, &bytecode)
        .map_err(|e| PipelineError::device(format!("pixel program '{label}'"), e))?;
    tracing::debug!(
        program = label,
        bytes = bytecode.len(),
        "loaded pixel program"
    );
    Ok(ps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::label;
    use crate::recording::{Command, ObjectId, RecordingDevice};
    use crate::stub_shaders;
    use shadekit_common::palette;

    fn manager() -> PipelineManager<RecordingDevice> {
        PipelineManager::new(RecordingDevice::new(), &stub_shaders()).unwrap()
    }

    fn id(m: &PipelineManager<RecordingDevice>, label: &str) -> ObjectId {
        m.device().find(label).unwrap()
    }

    fn read<T: bytemuck::Pod>(m: &PipelineManager<RecordingDevice>, label: &str) -> T {
        m.device().read_buffer(label).unwrap()
    }

    /// One warm light over the scene and three colored lights over the cubes.
    fn sample_lights() -> [(Vec3, f32, Vec4); 4] {
        [
            (Vec3::new(0.0, 6.0, -5.0), 3.0, Vec4::ONE),
            (Vec3::new(0.0, 1.0, 0.0), 1.0, Vec4::new(1.0, 0.0, 0.0, 5.0)),
            (Vec3::new(1.5, 1.0, 0.0), 1.0, Vec4::new(0.0, 1.0, 0.0, 5.0)),
            (Vec3::new(3.0, 1.0, 0.0), 1.0, Vec4::new(0.0, 0.0, 1.0, 5.0)),
        ]
    }

    fn bound_slots(commands: &[Command], stage: ShaderStage) -> Vec<(u32, ObjectId)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::SetConstantBuffers {
                    stage: s,
                    start_slot,
                    buffers,
                } if *s == stage => Some(
                    (*start_slot..)
                        .zip(buffers.iter().copied())
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn init_creates_every_object_and_white_diffuse() {
        let m = manager();
        // 5 programs, 2 layouts, 10 buffers, 3 samplers
        assert_eq!(m.device().object_count(), 20);
        assert_eq!(m.mode(), None);
        assert_eq!(read::<ColorPayload>(&m, label::DIFFUSE).rgba, [1.0; 4]);
        assert_eq!(m.diffuse_color(), palette::WHITE);
    }

    #[test]
    fn buffer_sizes_match_payloads() {
        let m = manager();
        let size = |label| m.device().buffer(id(&m, label)).unwrap().desc.size;
        assert_eq!(size(label::WORLD_3D), 64);
        assert_eq!(size(label::DIFFUSE), 16);
        assert_eq!(size(label::DIRECTIONAL), 32);
        assert_eq!(size(label::SPECULAR), 32);
        assert_eq!(size(label::POINT_LIGHTS), 144);
    }

    #[test]
    fn begin_2d_binds_exactly_the_2d_set() {
        let mut m = manager();
        m.device_mut().take_commands();
        m.begin_2d(FilterMode::Linear);

        let commands = m.device_mut().take_commands();
        assert_eq!(
            commands,
            vec![
                Command::SetVertexProgram(id(&m, "vertex_2d")),
                Command::SetPixelProgram(id(&m, "pixel_2d")),
                Command::SetInputLayout(id(&m, "vertex_2d_layout")),
                Command::SetConstantBuffers {
                    stage: ShaderStage::Vertex,
                    start_slot: 0,
                    buffers: vec![id(&m, label::PROJECTION_2D), id(&m, label::WORLD_2D)],
                },
                Command::SetSamplers {
                    stage: ShaderStage::Pixel,
                    start_slot: 0,
                    samplers: vec![id(&m, "sampler_linear")],
                },
            ]
        );
        assert!(bound_slots(&commands, ShaderStage::Pixel).is_empty());
        assert_eq!(m.mode(), Some(PipelineMode::Ui2d));
        m.device().validate_bindings().unwrap();
    }

    #[test]
    fn begin_3d_binds_exactly_the_lit_set() {
        let mut m = manager();
        m.device_mut().take_commands();
        m.begin_3d(FilterMode::Point);

        let commands = m.device_mut().take_commands();
        assert_eq!(
            bound_slots(&commands, ShaderStage::Vertex),
            vec![
                (0, id(&m, label::WORLD_3D)),
                (1, id(&m, label::VIEW_3D)),
                (2, id(&m, label::PROJECTION_3D)),
            ]
        );
        assert_eq!(
            bound_slots(&commands, ShaderStage::Pixel),
            vec![
                (0, id(&m, label::DIFFUSE)),
                (1, id(&m, label::AMBIENT)),
                (2, id(&m, label::DIRECTIONAL)),
                (3, id(&m, label::SPECULAR)),
                (4, id(&m, label::POINT_LIGHTS)),
            ]
        );
        let (vs, ps, layout) = (
            id(&m, "vertex_3d"),
            id(&m, "pixel_3d"),
            id(&m, "vertex_3d_layout"),
        );
        assert!(commands.contains(&Command::SetVertexProgram(vs)));
        assert!(commands.contains(&Command::SetPixelProgram(ps)));
        assert!(commands.contains(&Command::SetInputLayout(layout)));
        assert!(commands.contains(&Command::SetSamplers {
            stage: ShaderStage::Pixel,
            start_slot: 0,
            samplers: vec![id(&m, "sampler_point")],
        }));
        assert_eq!(commands.len(), 7);
        m.device().validate_bindings().unwrap();
    }

    #[test]
    fn point_lights_upload_before_pixel_binding() {
        let mut m = manager();
        m.device_mut().take_commands();
        m.begin_3d(FilterMode::Point);

        let commands = m.device().commands();
        let lights = id(&m, label::POINT_LIGHTS);
        let mapped = commands
            .iter()
            .position(|c| *c == Command::WriteMapped(lights))
            .unwrap();
        let bound = commands
            .iter()
            .position(|c| {
                matches!(
                    c,
                    Command::SetConstantBuffers {
                        stage: ShaderStage::Pixel,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(mapped < bound);
    }

    #[test]
    fn begin_3d_field_leaves_diffuse_and_point_light_slots_alone() {
        let mut m = manager();
        m.begin_2d(FilterMode::Point);
        m.device_mut().take_commands();
        m.begin_3d_field(FilterMode::Anisotropic);

        let commands = m.device_mut().take_commands();
        assert_eq!(commands.len(), 6);
        assert_eq!(commands[0], Command::SetVertexProgram(id(&m, "vertex_3d")));
        assert_eq!(commands[1], Command::SetPixelProgram(id(&m, "pixel_field")));
        assert_eq!(
            commands[2],
            Command::SetInputLayout(id(&m, "vertex_3d_layout"))
        );
        assert_eq!(
            commands[3],
            Command::SetConstantBuffers {
                stage: ShaderStage::Vertex,
                start_slot: 0,
                buffers: vec![
                    id(&m, label::WORLD_3D),
                    id(&m, label::VIEW_3D),
                    id(&m, label::PROJECTION_3D),
                ],
            }
        );
        assert_eq!(
            bound_slots(&commands, ShaderStage::Pixel),
            vec![
                (3, id(&m, label::AMBIENT)),
                (4, id(&m, label::DIRECTIONAL)),
                (5, id(&m, label::SPECULAR)),
            ]
        );
        let lights = id(&m, label::POINT_LIGHTS);
        assert!(!commands.contains(&Command::WriteMapped(lights)));
        assert_eq!(m.device().bound_buffer(ShaderStage::Pixel, 0), None);
        assert_eq!(
            m.device().bound_sampler(ShaderStage::Pixel, 0),
            Some(id(&m, "sampler_anisotropic"))
        );
        assert_eq!(m.mode(), Some(PipelineMode::Field3d));
        m.device().validate_bindings().unwrap();
    }

    #[test]
    fn light_specular_reaches_lit_and_field_slots() {
        let mut m = manager();
        let eye = Vec3::new(0.0, 6.0, -10.0);
        let color = Vec4::new(1.0, 0.9, 0.8, 1.0);
        m.set_light_specular(eye, 32.0, color);

        let expected = SpecularLight {
            camera_position: eye.to_array(),
            power: 32.0,
            color: color.to_array(),
        };
        assert_eq!(read::<SpecularLight>(&m, label::SPECULAR), expected);

        m.begin_3d(FilterMode::Point);
        m.device_mut().draw("lit");
        m.begin_3d_field(FilterMode::Point);
        m.device_mut().draw("field");

        let draws = m.device().draws();
        let specular_at = |draw: usize, slot: u32| -> SpecularLight {
            bytemuck::pod_read_unaligned(&draws[draw].buffers[&(ShaderStage::Pixel, slot)])
        };
        let lit = specular_at(0, 3);
        let field = specular_at(1, 5);
        assert_eq!(lit, expected);
        assert_eq!(field, expected);
        assert_eq!(m.lighting().specular, expected);
    }

    #[test]
    fn field_after_lit_keeps_stale_low_slots() {
        let mut m = manager();
        m.begin_3d(FilterMode::Point);
        m.begin_3d_field(FilterMode::Point);

        let bound = |slot| m.device().bound_buffer(ShaderStage::Pixel, slot);
        assert_eq!(bound(0), Some(id(&m, label::DIFFUSE)));
        assert_eq!(bound(3), Some(id(&m, label::AMBIENT)));
        assert_eq!(bound(5), Some(id(&m, label::SPECULAR)));
    }

    #[test]
    fn every_filter_resolves_its_own_sampler() {
        let mut m = manager();
        for (filter, sampler) in [
            (FilterMode::Point, "sampler_point"),
            (FilterMode::Linear, "sampler_linear"),
            (FilterMode::Anisotropic, "sampler_anisotropic"),
        ] {
            let expected = Some(id(&m, sampler));
            m.begin_2d(filter);
            assert_eq!(m.device().bound_sampler(ShaderStage::Pixel, 0), expected);
            m.begin_3d(filter);
            assert_eq!(m.device().bound_sampler(ShaderStage::Pixel, 0), expected);
            m.begin_3d_field(filter);
            assert_eq!(m.device().bound_sampler(ShaderStage::Pixel, 0), expected);
        }
    }

    #[test]
    fn matrices_are_uploaded_transposed() {
        let mut m = manager();
        let world = Mat4::from_translation(Vec3::new(1.5, 0.0, -2.0)) * Mat4::from_rotation_y(0.7);
        let view = Mat4::look_at_lh(Vec3::new(0.0, 5.0, -5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_lh(1.0, 16.0 / 9.0, 0.1, 100.0);
        let ortho = Mat4::orthographic_lh(0.0, 1920.0, 1080.0, 0.0, 0.0, 1.0);

        m.set_world_matrix_3d(world);
        m.set_view_matrix_3d(view);
        m.set_projection_matrix_3d(projection);
        m.set_projection_matrix_2d(ortho);
        m.set_world_matrix_2d(Mat4::IDENTITY);
        m.begin_3d(FilterMode::Point);

        let gpu = |label| read::<MatrixPayload>(&m, label).to_mat4();
        assert_eq!(gpu(label::WORLD_3D), world.transpose());
        assert_eq!(gpu(label::VIEW_3D), view.transpose());
        assert_eq!(gpu(label::PROJECTION_3D), projection.transpose());
        assert_eq!(gpu(label::PROJECTION_2D), ortho.transpose());
        assert_eq!(gpu(label::WORLD_2D), Mat4::IDENTITY);
    }

    #[test]
    fn setters_use_replace_and_point_lights_use_map() {
        let mut m = manager();
        m.set_light_ambient(Vec4::splat(0.2));
        m.set_point_light(0, Vec3::ONE, 2.0, Vec4::ONE);
        m.begin_3d(FilterMode::Point);
        m.begin_3d(FilterMode::Point);

        let device = m.device();
        let ambient = device.buffer(id(&m, label::AMBIENT)).unwrap();
        assert_eq!((ambient.replace_count, ambient.map_count), (1, 0));
        let lights = device.buffer(id(&m, label::POINT_LIGHTS)).unwrap();
        assert_eq!((lights.replace_count, lights.map_count), (0, 2));
    }

    #[test]
    fn point_light_reaches_gpu_only_on_begin_3d() {
        let mut m = manager();
        let uploaded = |m: &PipelineManager<RecordingDevice>| {
            read::<PointLightBuffer>(m, label::POINT_LIGHTS)
        };
        m.set_point_light(1, Vec3::Y, 1.0, Vec4::new(1.0, 0.0, 0.0, 5.0));
        assert_eq!(uploaded(&m), PointLightBuffer::default());

        m.begin_3d_field(FilterMode::Point);
        m.begin_2d(FilterMode::Point);
        assert_eq!(uploaded(&m), PointLightBuffer::default());

        m.begin_3d(FilterMode::Point);
        assert_eq!(uploaded(&m), *m.lighting().point_lights());
    }

    #[test]
    fn point_light_upload_is_bit_exact() {
        let mut m = manager();
        m.set_point_light_count(4);
        for (i, (position, range, color)) in sample_lights().into_iter().enumerate() {
            m.set_point_light(i, position, range, color);
        }
        m.begin_3d(FilterMode::Linear);

        let record = m.device().buffer(id(&m, label::POINT_LIGHTS)).unwrap();
        let uploaded = &record.contents;
        let expected = bytemuck::bytes_of(m.lighting().point_lights());
        assert_eq!(uploaded.as_slice(), expected);
    }

    #[test]
    fn out_of_range_point_light_changes_nothing() {
        let mut m = manager();
        m.set_point_light(0, Vec3::X, 1.0, Vec4::ONE);
        let before = *m.lighting();
        m.set_point_light(4, Vec3::Y, 9.0, Vec4::ZERO);
        m.set_point_light(100, Vec3::Y, 9.0, Vec4::ZERO);
        assert_eq!(*m.lighting(), before);
    }

    #[test]
    fn failed_map_is_not_fatal() {
        let mut m = manager();
        m.device_mut().set_fail_maps(true);
        m.set_point_light(0, Vec3::X, 1.0, Vec4::ONE);
        m.begin_3d(FilterMode::Point);

        assert_eq!(m.mode(), Some(PipelineMode::Lit3d));
        assert_eq!(
            m.device().bound_buffer(ShaderStage::Pixel, 4),
            Some(id(&m, label::POINT_LIGHTS))
        );
        assert_eq!(
            read::<PointLightBuffer>(&m, label::POINT_LIGHTS),
            PointLightBuffer::default()
        );
    }

    #[test]
    fn textures_bind_to_pixel_slots() {
        let mut m = manager();
        let grass = m.device_mut().create_texture("grass");
        let rock = m.device_mut().create_texture("rock");
        let crate_tex = m.device_mut().create_texture("crate");

        m.begin_3d_field(FilterMode::Linear);
        m.set_field_textures(&grass, &rock);
        assert_eq!(m.device().bound_texture(ShaderStage::Pixel, 0), Some(grass));
        assert_eq!(m.device().bound_texture(ShaderStage::Pixel, 1), Some(rock));

        m.begin_3d(FilterMode::Linear);
        m.set_texture_3d(&crate_tex);
        assert_eq!(
            m.device().bound_texture(ShaderStage::Pixel, 0),
            Some(crate_tex)
        );
        assert_eq!(m.device().bound_texture(ShaderStage::Pixel, 1), Some(rock));
    }

    #[test]
    fn missing_shader_fails_initialization() {
        let mut shaders = stub_shaders();
        shaders.remove(ShaderProgram::PixelField);

        let result = PipelineManager::new(RecordingDevice::new(), &shaders);
        assert!(
            matches!(result, Err(PipelineError::MissingResource(ref name)) if name == "pixel_field")
        );
    }

    #[test]
    fn missing_shader_file_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::ShaderConfig::with_root(dir.path());
        for program in [
            ShaderProgram::Vertex2d,
            ShaderProgram::Pixel2d,
            ShaderProgram::Vertex3d,
        ] {
            let path = config.path_for(program);
            std::fs::write(path, b"compiled").unwrap();
        }

        let source = crate::source::ShaderDirectory::new(config);
        let err = PipelineManager::new(RecordingDevice::new(), &source)
            .err()
            .unwrap();
        match err {
            PipelineError::Io { path, .. } => assert!(path.ends_with("shader_pixel_3d.cso")),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn device_creation_failure_names_the_object() {
        let device = RecordingDevice::new().fail_creation_of("vertex_3d_layout");
        let err = PipelineManager::new(device, &stub_shaders()).err().unwrap();
        match err {
            PipelineError::Device { what, source } => {
                assert!(what.contains("vertex_3d"));
                assert!(matches!(source, DeviceError::Creation { object: "input layout", .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_bytecode_fails_initialization() {
        let shaders = stub_shaders().with(ShaderProgram::Pixel2d, Vec::new());
        let err = PipelineManager::new(RecordingDevice::new(), &shaders)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::Device {
                source: DeviceError::MalformedBytecode { .. },
                ..
            }
        ));
    }

    #[test]
    fn end_to_end_lit_frame() {
        let mut m = manager();
        let world = Mat4::from_translation(Vec3::new(3.0, 1.0, 0.0));
        let lights = sample_lights();
        let view = Mat4::look_at_lh(Vec3::new(0.0, 5.0, -5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_lh(1.0, 16.0 / 9.0, 0.1, 100.0);

        m.set_light_ambient(Vec4::new(0.1, 0.1, 0.1, 1.0));
        m.set_light_directional(
            Vec4::new(0.0, -1.0, 0.0, 0.0),
            Vec4::new(0.8, 0.8, 0.8, 1.0),
        );
        m.set_diffuse_color(palette::WHITE);
        m.set_point_light_count(4);
        for (i, (pos, range, color)) in lights.iter().enumerate() {
            m.set_point_light(i, *pos, *range, *color);
        }
        m.set_view_matrix_3d(view);
        m.set_projection_matrix_3d(projection);
        m.begin_3d(FilterMode::Anisotropic);
        m.set_world_matrix_3d(world);
        m.device_mut().draw("cube");

        let draw = &m.device().draws()[0];
        assert_eq!(draw.buffers.len(), 8);
        let slot = |stage: ShaderStage, index: u32| draw.buffers[&(stage, index)].as_slice();

        let matrix = |bytes: &[u8]| bytemuck::pod_read_unaligned::<MatrixPayload>(bytes).to_mat4();
        assert_eq!(matrix(slot(ShaderStage::Vertex, 0)), world.transpose());
        assert_eq!(matrix(slot(ShaderStage::Vertex, 1)), view.transpose());
        assert_eq!(matrix(slot(ShaderStage::Vertex, 2)), projection.transpose());

        let diffuse: ColorPayload = bytemuck::pod_read_unaligned(slot(ShaderStage::Pixel, 0));
        assert_eq!(diffuse.rgba, [1.0; 4]);
        let ambient: ColorPayload = bytemuck::pod_read_unaligned(slot(ShaderStage::Pixel, 1));
        assert_eq!(ambient.rgba, [0.1, 0.1, 0.1, 1.0]);
        let directional: DirectionalLight =
            bytemuck::pod_read_unaligned(slot(ShaderStage::Pixel, 2));
        assert_eq!(directional.direction, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(directional.color, [0.8, 0.8, 0.8, 1.0]);
        let specular: SpecularLight = bytemuck::pod_read_unaligned(slot(ShaderStage::Pixel, 3));
        assert_eq!(specular, <SpecularLight as bytemuck::Zeroable>::zeroed());
        let point: PointLightBuffer = bytemuck::pod_read_unaligned(slot(ShaderStage::Pixel, 4));
        assert_eq!(point.count, 4);
        for (i, (pos, range, color)) in lights.iter().enumerate() {
            assert_eq!(point.lights[i].position, pos.to_array());
            assert_eq!(point.lights[i].range, *range);
            assert_eq!(point.lights[i].color, color.to_array());
        }

        assert_eq!(
            draw.state.samplers.get(&(ShaderStage::Pixel, 0)),
            Some(&id(&m, "sampler_anisotropic"))
        );
    }
}
