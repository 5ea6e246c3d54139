use shadekit_common::{FilterMode, ShaderStage};
use shadekit_render::{
    AddressMode, BufferDesc, BufferUsage, DeviceError, GraphicsDevice, InputElement, SamplerDesc,
    VertexFormat, element_offsets, fingerprint, layout_stride,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Bind group holding vertex-stage constant buffers.
pub const GROUP_VERTEX_BUFFERS: u32 = 0;
/// Bind group holding pixel-stage constant buffers.
pub const GROUP_PIXEL_BUFFERS: u32 = 1;
/// Bind group holding pixel-stage samplers.
pub const GROUP_SAMPLERS: u32 = 2;
/// Bind group holding pixel-stage textures.
pub const GROUP_TEXTURES: u32 = 3;

const VERTEX_ENTRY: &str = "vs_main";
const PIXEL_ENTRY: &str = "fs_main";

/// A compiled WGSL module.
#[derive(Debug, Clone)]
pub struct WgpuProgram {
    id: u64,
    module: Arc<wgpu::ShaderModule>,
    fingerprint: u64,
}

impl WgpuProgram {
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Vertex buffer layout derived from an append-aligned element list.
#[derive(Debug, Clone)]
pub struct WgpuInputLayout {
    id: u64,
    stride: u64,
    attributes: Arc<[wgpu::VertexAttribute]>,
    fingerprint: u64,
}

impl WgpuInputLayout {
    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn attributes(&self) -> &[wgpu::VertexAttribute] {
        &self.attributes
    }
}

/// Handle to a constant buffer. Contents live on the device as a CPU copy
/// and are uploaded per [`WgpuDevice::apply`].
#[derive(Debug, Clone)]
pub struct WgpuBuffer {
    id: u64,
    label: &'static str,
    usage: BufferUsage,
    size: u64,
}

impl WgpuBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug, Clone)]
pub struct WgpuSampler {
    id: u64,
    sampler: Arc<wgpu::Sampler>,
}

impl WgpuSampler {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct WgpuTexture {
    id: u64,
    view: Arc<wgpu::TextureView>,
}

impl WgpuTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

pub(crate) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

/// Shader location equals the element index.
pub(crate) fn vertex_attributes(elements: &[InputElement]) -> Vec<wgpu::VertexAttribute> {
    elements
        .iter()
        .zip(element_offsets(elements))
        .enumerate()
        .map(|(location, (element, offset))| wgpu::VertexAttribute {
            format: vertex_format(element.format),
            offset: offset as u64,
            shader_location: location as u32,
        })
        .collect()
}

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
    }
}

/// wgpu rejects anisotropy unless every filter is linear, and caps the LOD
/// range at 32.
pub(crate) fn sampler_descriptor(desc: &SamplerDesc) -> wgpu::SamplerDescriptor<'_> {
    let (filter, anisotropy_clamp) = match desc.filter {
        FilterMode::Point => (wgpu::FilterMode::Nearest, 1),
        FilterMode::Linear => (wgpu::FilterMode::Linear, 1),
        FilterMode::Anisotropic => (wgpu::FilterMode::Linear, desc.max_anisotropy.clamp(1, 16)),
    };
    let address = address_mode(desc.address);
    wgpu::SamplerDescriptor {
        label: Some(desc.label),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        lod_min_clamp: desc.min_lod.max(0.0),
        lod_max_clamp: desc.max_lod.min(32.0),
        compare: None,
        anisotropy_clamp,
        border_color: None,
    }
}

/// Identity of a render pipeline: the bound programs and layout plus the
/// occupied slots of each bind group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex: u64,
    pixel: u64,
    layout: u64,
    groups: [Vec<u32>; 4],
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    group_layouts: [wgpu::BindGroupLayout; 4],
}

/// CPU copy of a constant buffer. `uploaded` is the GPU buffer holding
/// `bytes` as of `revision`; a newer revision gets a fresh buffer so earlier
/// draws keep the data they were recorded with.
struct UniformContents {
    label: &'static str,
    bytes: Vec<u8>,
    revision: u64,
    uploaded: Option<(u64, wgpu::Buffer)>,
}

impl UniformContents {
    fn is_current(&self) -> bool {
        self.uploaded
            .as_ref()
            .is_some_and(|(revision, _)| *revision == self.revision)
    }
}

/// [`GraphicsDevice`] over a wgpu device and queue.
///
/// wgpu has no bind-by-slot context, so slot tables are kept here and
/// resolved into a pipeline and four bind groups by [`WgpuDevice::apply`].
/// Only pixel-stage samplers and textures are supported.
///
/// Constant buffer writes update a CPU copy. `apply` uploads every bound
/// buffer that changed since its last upload into a new GPU buffer, so each
/// draw sees the constants set before it even within one render pass.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    next_id: u64,
    vertex_program: Option<WgpuProgram>,
    pixel_program: Option<WgpuProgram>,
    input_layout: Option<WgpuInputLayout>,
    vertex_buffers: BTreeMap<u32, WgpuBuffer>,
    pixel_buffers: BTreeMap<u32, WgpuBuffer>,
    samplers: BTreeMap<u32, WgpuSampler>,
    textures: BTreeMap<u32, WgpuTexture>,
    uniforms: HashMap<u64, UniformContents>,
    uniform_uploads: u64,
    pipelines: HashMap<PipelineKey, Arc<CachedPipeline>>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            color_format,
            depth_format: None,
            next_id: 0,
            vertex_program: None,
            pixel_program: None,
            input_layout: None,
            vertex_buffers: BTreeMap::new(),
            pixel_buffers: BTreeMap::new(),
            samplers: BTreeMap::new(),
            textures: BTreeMap::new(),
            uniforms: HashMap::new(),
            uniform_uploads: 0,
            pipelines: HashMap::new(),
        }
    }

    /// Pipelines built after this call test and write depth.
    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(format);
        self.pipelines.clear();
        self
    }

    /// Opens the default adapter without a surface.
    pub fn request_headless(color_format: wgpu::TextureFormat) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| DeviceError::Creation {
            object: "adapter",
            label: "headless".to_string(),
            reason: "no compatible adapter found".to_string(),
        })?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shadekit_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::Creation {
            object: "device",
            label: "shadekit_device".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(device, queue, color_format))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Number of distinct pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Wraps an existing view so it can be bound to a texture slot.
    pub fn register_texture(&mut self, view: wgpu::TextureView) -> WgpuTexture {
        WgpuTexture {
            id: self.next_id(),
            view: Arc::new(view),
        }
    }

    /// Uploads a single-mip RGBA8 texture.
    pub fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> WgpuTexture {
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.register_texture(view)
    }

    /// Sets the pipeline and bind groups for the current slot state on `pass`.
    ///
    /// Fails if a program or the input layout is unbound, or if the layout
    /// was built from a different vertex program than the one bound.
    pub fn apply(&mut self, pass: &mut wgpu::RenderPass<'_>) -> Result<(), DeviceError> {
        let (vertex, pixel, layout) = match (
            &self.vertex_program,
            &self.pixel_program,
            &self.input_layout,
        ) {
            (Some(v), Some(p), Some(l)) => (v, p, l),
            _ => {
                return Err(DeviceError::Incomplete(
                    "programs and input layout must be bound before drawing".to_string(),
                ));
            }
        };
        if layout.fingerprint != vertex.fingerprint {
            return Err(DeviceError::Incomplete(
                "input layout was built from a different vertex program".to_string(),
            ));
        }

        let key = PipelineKey {
            vertex: vertex.id,
            pixel: pixel.id,
            layout: layout.id,
            groups: [
                self.vertex_buffers.keys().copied().collect(),
                self.pixel_buffers.keys().copied().collect(),
                self.samplers.keys().copied().collect(),
                self.textures.keys().copied().collect(),
            ],
        };

        let cached = match self.pipelines.get(&key).cloned() {
            Some(cached) => cached,
            None => {
                let built = Arc::new(self.build_pipeline(&key, vertex, pixel, layout)?);
                self.pipelines.insert(key, Arc::clone(&built));
                tracing::debug!(pipelines = self.pipelines.len(), "render pipeline built");
                built
            }
        };

        self.upload_bound_buffers();
        pass.set_pipeline(&cached.pipeline);
        let groups = [
            GROUP_VERTEX_BUFFERS,
            GROUP_PIXEL_BUFFERS,
            GROUP_SAMPLERS,
            GROUP_TEXTURES,
        ];
        let bind_groups = self.bind_groups(&cached);
        for (group, bind_group) in groups.into_iter().zip(&bind_groups) {
            pass.set_bind_group(group, bind_group, &[]);
        }
        Ok(())
    }

    /// Number of GPU uniform buffers created by `apply` so far.
    pub fn uniform_upload_count(&self) -> u64 {
        self.uniform_uploads
    }

    fn upload_bound_buffers(&mut self) {
        let bound: Vec<u64> = self
            .vertex_buffers
            .values()
            .chain(self.pixel_buffers.values())
            .map(|b| b.id)
            .collect();
        for id in bound {
            let Some(contents) = self.uniforms.get_mut(&id) else {
                continue;
            };
            if contents.is_current() {
                continue;
            }
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(contents.label),
                contents: &contents.bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            contents.uploaded = Some((contents.revision, buffer));
            self.uniform_uploads += 1;
        }
    }

    /// Copies `bytes` into the CPU side of `buffer`; the caller checked the size.
    fn store_contents(&mut self, buffer: &WgpuBuffer, bytes: &[u8]) {
        let contents = self.uniforms.entry(buffer.id).or_insert_with(|| UniformContents {
            label: buffer.label,
            bytes: vec![0; bytes.len()],
            revision: 0,
            uploaded: None,
        });
        contents.bytes.copy_from_slice(bytes);
        contents.revision += 1;
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Runs `create` inside a validation error scope.
    fn scoped<T>(
        &self,
        object: &'static str,
        label: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Ok(value),
            Some(e) => Err(DeviceError::Creation {
                object,
                label: label.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn create_program(
        &mut self,
        object: &'static str,
        label: &str,
        bytecode: &[u8],
    ) -> Result<WgpuProgram, DeviceError> {
        let source = std::str::from_utf8(bytecode).map_err(|e| DeviceError::MalformedBytecode {
            label: label.to_string(),
            reason: format!("not WGSL text: {e}"),
        })?;
        if source.trim().is_empty() {
            return Err(DeviceError::MalformedBytecode {
                label: label.to_string(),
                reason: "empty byte-code".to_string(),
            });
        }

        let module = self.scoped(object, label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;
        Ok(WgpuProgram {
            id: self.next_id(),
            module: Arc::new(module),
            fingerprint: fingerprint(bytecode),
        })
    }

    fn build_pipeline(
        &self,
        key: &PipelineKey,
        vertex: &WgpuProgram,
        pixel: &WgpuProgram,
        layout: &WgpuInputLayout,
    ) -> Result<CachedPipeline, DeviceError> {
        let buffer_entry =
            |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let entries: [Vec<wgpu::BindGroupLayoutEntry>; 4] = [
            key.groups[0].iter().map(|&s| buffer_entry(s, wgpu::ShaderStages::VERTEX)).collect(),
            key.groups[1].iter().map(|&s| buffer_entry(s, wgpu::ShaderStages::FRAGMENT)).collect(),
            key.groups[2].iter().map(|&s| sampler_entry(s)).collect(),
            key.groups[3].iter().map(|&s| texture_entry(s)).collect(),
        ];

        self.scoped("render pipeline", "slot_pipeline", |device| {
            let group_layouts = entries.map(|entries| {
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("slot_group_layout"),
                    entries: &entries,
                })
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("slot_pipeline_layout"),
                bind_group_layouts: &[
                    &group_layouts[0],
                    &group_layouts[1],
                    &group_layouts[2],
                    &group_layouts[3],
                ],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("slot_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: layout.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &layout.attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &pixel.module,
                    entry_point: Some(PIXEL_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: self.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });

            CachedPipeline {
                pipeline,
                group_layouts,
            }
        })
    }

    fn bind_groups(&self, cached: &CachedPipeline) -> [wgpu::BindGroup; 4] {
        fn buffers<'a>(
            table: &BTreeMap<u32, WgpuBuffer>,
            uniforms: &'a HashMap<u64, UniformContents>,
        ) -> Vec<wgpu::BindGroupEntry<'a>> {
            table
                .iter()
                .filter_map(|(&binding, b)| {
                    let (_, uploaded) = uniforms.get(&b.id)?.uploaded.as_ref()?;
                    Some(wgpu::BindGroupEntry {
                        binding,
                        resource: uploaded.as_entire_binding(),
                    })
                })
                .collect()
        }
        let samplers: Vec<wgpu::BindGroupEntry<'_>> = self
            .samplers
            .iter()
            .map(|(&binding, s)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&s.sampler),
            })
            .collect();
        let textures: Vec<wgpu::BindGroupEntry<'_>> = self
            .textures
            .iter()
            .map(|(&binding, t)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&t.view),
            })
            .collect();

        let entries = [buffers(&self.vertex_buffers, &self.uniforms),
            buffers(&self.pixel_buffers, &self.uniforms), samplers, textures];
        let mut index = 0;
        entries.map(|entries| {
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("slot_group"),
                layout: &cached.group_layouts[index],
                entries: &entries,
            });
            index += 1;
            group
        })
    }

    fn buffer_table(&mut self, stage: ShaderStage) -> &mut BTreeMap<u32, WgpuBuffer> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex_buffers,
            ShaderStage::Pixel => &mut self.pixel_buffers,
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    type VertexProgram = WgpuProgram;
    type PixelProgram = WgpuProgram;
    type InputLayout = WgpuInputLayout;
    type Buffer = WgpuBuffer;
    type Sampler = WgpuSampler;
    type TextureView = WgpuTexture;

    fn create_vertex_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<WgpuProgram, DeviceError> {
        self.create_program("vertex program", label, bytecode)
    }

    fn create_pixel_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<WgpuProgram, DeviceError> {
        self.create_program("pixel program", label, bytecode)
    }

    fn create_input_layout(
        &mut self,
        label: &str,
        elements: &[InputElement],
        bytecode: &[u8],
    ) -> Result<WgpuInputLayout, DeviceError> {
        if elements.is_empty() {
            return Err(DeviceError::Creation {
                object: "input layout",
                label: label.to_string(),
                reason: "no elements".to_string(),
            });
        }
        if bytecode.is_empty() {
            return Err(DeviceError::MalformedBytecode {
                label: label.to_string(),
                reason: "empty byte-code".to_string(),
            });
        }
        Ok(WgpuInputLayout {
            id: self.next_id(),
            stride: layout_stride(elements) as u64,
            attributes: vertex_attributes(elements).into(),
            fingerprint: fingerprint(bytecode),
        })
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<WgpuBuffer, DeviceError> {
        let max = u64::from(self.device.limits().max_uniform_buffer_binding_size);
        if desc.size == 0 || desc.size > max {
            return Err(DeviceError::Creation {
                object: "constant buffer",
                label: desc.label.to_string(),
                reason: format!("size {} outside 1..={max}", desc.size),
            });
        }
        let buffer = WgpuBuffer {
            id: self.next_id(),
            label: desc.label,
            usage: desc.usage,
            size: desc.size,
        };
        self.store_contents(&buffer, &vec![0; desc.size as usize]);
        Ok(buffer)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<WgpuSampler, DeviceError> {
        let sampler = self.scoped("sampler", desc.label, |device| {
            device.create_sampler(&sampler_descriptor(desc))
        })?;
        Ok(WgpuSampler {
            id: self.next_id(),
            sampler: Arc::new(sampler),
        })
    }

    fn set_vertex_program(&mut self, program: &WgpuProgram) {
        self.vertex_program = Some(program.clone());
    }

    fn set_pixel_program(&mut self, program: &WgpuProgram) {
        self.pixel_program = Some(program.clone());
    }

    fn set_input_layout(&mut self, layout: &WgpuInputLayout) {
        self.input_layout = Some(layout.clone());
    }

    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[&WgpuBuffer],
    ) {
        let table = self.buffer_table(stage);
        for (slot, buffer) in (start_slot..).zip(buffers) {
            table.insert(slot, (*buffer).clone());
        }
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[&WgpuSampler]) {
        if stage == ShaderStage::Vertex {
            tracing::trace!("vertex-stage samplers are ignored");
            return;
        }
        for (slot, sampler) in (start_slot..).zip(samplers) {
            self.samplers.insert(slot, (*sampler).clone());
        }
    }

    fn set_textures(&mut self, stage: ShaderStage, start_slot: u32, views: &[&WgpuTexture]) {
        if stage == ShaderStage::Vertex {
            tracing::trace!("vertex-stage textures are ignored");
            return;
        }
        for (slot, view) in (start_slot..).zip(views) {
            self.textures.insert(slot, (*view).clone());
        }
    }

    fn replace_buffer(&mut self, buffer: &WgpuBuffer, bytes: &[u8]) {
        if bytes.len() as u64 != buffer.size {
            tracing::warn!(
                label = buffer.label,
                expected = buffer.size,
                got = bytes.len(),
                "constant buffer update size mismatch"
            );
            return;
        }
        self.store_contents(buffer, bytes);
    }

    fn write_mapped(&mut self, buffer: &WgpuBuffer, bytes: &[u8]) -> Result<(), DeviceError> {
        let map_error = |reason: String| DeviceError::Map {
            label: buffer.label.to_string(),
            reason,
        };
        if buffer.usage != BufferUsage::Dynamic {
            return Err(map_error("buffer is not dynamic".to_string()));
        }
        if bytes.len() as u64 != buffer.size {
            return Err(map_error(format!(
                "expected {} bytes, got {}",
                buffer.size,
                bytes.len()
            )));
        }
        self.store_contents(buffer, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::embedded_shaders;
    use glam::{Mat4, Vec3};
    use shadekit_render::PipelineManager;
    use shadekit_render::bindings::{LAYOUT_2D, LAYOUT_3D};

    fn headless() -> Option<WgpuDevice> {
        match WgpuDevice::request_headless(wgpu::TextureFormat::Rgba8UnormSrgb) {
            Ok(device) => Some(device),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    #[test]
    fn sampler_filters() {
        let point = SamplerDesc::wrap(FilterMode::Point);
        let d = sampler_descriptor(&point);
        assert_eq!(d.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(d.anisotropy_clamp, 1);
        assert_eq!(d.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(d.address_mode_w, wgpu::AddressMode::Repeat);

        let linear = SamplerDesc::wrap(FilterMode::Linear);
        let d = sampler_descriptor(&linear);
        assert_eq!(d.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(d.anisotropy_clamp, 1);

        let aniso = SamplerDesc::wrap(FilterMode::Anisotropic);
        let d = sampler_descriptor(&aniso);
        assert_eq!(d.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(d.anisotropy_clamp, 16);
        assert_eq!(d.lod_max_clamp, 32.0);
    }

    #[test]
    fn attributes_follow_element_order() {
        let attrs = vertex_attributes(&LAYOUT_3D);
        let offsets: Vec<u64> = attrs.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = attrs.iter().map(|a| a.shader_location).collect();
        assert_eq!(offsets, vec![0, 12, 24, 40]);
        assert_eq!(locations, vec![0, 1, 2, 3]);
        assert_eq!(attrs[2].format, wgpu::VertexFormat::Float32x4);

        assert_eq!(vertex_attributes(&LAYOUT_2D)[2].offset, 28);
    }

    #[test]
    fn manager_initializes_on_gpu() {
        let Some(device) = headless() else { return };
        let mut manager = PipelineManager::new(device, &embedded_shaders()).unwrap();
        manager.begin_3d(FilterMode::Anisotropic);
        manager.set_point_light_count(1);
        manager.begin_3d(FilterMode::Linear);
        manager.begin_2d(FilterMode::Point);
    }

    #[test]
    fn invalid_wgsl_is_a_creation_error() {
        let Some(mut device) = headless() else { return };
        let err = device
            .create_vertex_program("broken", b"fn vs_main( {")
            .unwrap_err();
        assert!(matches!(err, DeviceError::Creation { object: "vertex program", .. }));
    }

    #[test]
    fn non_utf8_is_malformed() {
        let Some(mut device) = headless() else { return };
        let err = device
            .create_pixel_program("binary", &[0xff, 0xfe, 0x00])
            .unwrap_err();
        assert!(matches!(err, DeviceError::MalformedBytecode { .. }));
    }

    #[test]
    fn mapping_default_buffer_fails() {
        let Some(mut device) = headless() else { return };
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "fixed",
                size: 16,
                usage: BufferUsage::Default,
            })
            .unwrap();
        let result = device.write_mapped(&buffer, &[0u8; 16]);
        assert!(matches!(result, Err(DeviceError::Map { .. })));
    }

    #[test]
    fn apply_builds_and_reuses_pipelines() {
        let Some(device) = headless() else { return };
        let mut manager = PipelineManager::new(device, &embedded_shaders()).unwrap();

        let white = [255u8; 4];
        let texture = manager
            .device_mut()
            .create_texture_rgba8("white", 1, 1, &white);
        let target = manager.device().device().create_texture(&wgpu::TextureDescriptor {
            label: Some("target"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = manager
            .device()
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("test_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });

            manager.begin_3d(FilterMode::Point);
            manager.set_texture_3d(&texture);
            manager.device_mut().apply(&mut pass).unwrap();
            manager.device_mut().apply(&mut pass).unwrap();
            assert_eq!(manager.device().pipeline_count(), 1);

            manager.begin_3d_field(FilterMode::Linear);
            manager.set_field_textures(&texture, &texture);
            manager.device_mut().apply(&mut pass).unwrap();

            manager.begin_2d(FilterMode::Point);
            manager.set_texture_2d(&texture);
            manager.device_mut().apply(&mut pass).unwrap();
            assert_eq!(manager.device().pipeline_count(), 3);
        }
        let queue = manager.device().queue();
        queue.submit(std::iter::once(encoder.finish()));
    }

    fn render_target(device: &WgpuDevice, width: u32, height: u32) -> wgpu::Texture {
        device.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: device.color_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Tightly packed RGBA8 rows of `target`.
    fn read_back(device: &WgpuDevice, target: &wgpu::Texture) -> Vec<Vec<[u8; 4]>> {
        let (width, height) = (target.width(), target.height());
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = (width * 4).div_ceil(align) * align;
        let staging = device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("read_back"),
            size: u64::from(padded_row * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            target.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            target.size(),
        );
        device.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.device().poll(wgpu::Maintain::Wait);
        rx.recv().unwrap().unwrap();

        let data = slice.get_mapped_range();
        (0..height as usize)
            .map(|row| {
                let start = row * padded_row as usize;
                (0..width as usize)
                    .map(|x| {
                        let px = start + x * 4;
                        [data[px], data[px + 1], data[px + 2], data[px + 3]]
                    })
                    .collect()
            })
            .collect()
    }

    /// Two triangles over x in [-0.5, 0], y in [-0.5, 0.5], opaque red.
    fn half_quad_2d() -> Vec<u8> {
        let corners: [[f32; 2]; 6] = [
            [-0.5, -0.5],
            [0.0, -0.5],
            [0.0, 0.5],
            [-0.5, -0.5],
            [0.0, 0.5],
            [-0.5, 0.5],
        ];
        corners
            .iter()
            .flat_map(|[x, y]| [*x, *y, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5, 0.5])
            .flat_map(f32::to_ne_bytes)
            .collect()
    }

    #[test]
    fn constants_set_between_draws_apply_to_later_draws_only() {
        let Ok(device) = WgpuDevice::request_headless(wgpu::TextureFormat::Rgba8Unorm) else {
            return;
        };
        let mut manager = PipelineManager::new(device, &embedded_shaders()).unwrap();
        let white = manager
            .device_mut()
            .create_texture_rgba8("white", 1, 1, &[255u8; 4]);
        let target = render_target(manager.device(), 4, 2);
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let vertices = manager
            .device()
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("half_quad"),
                contents: &half_quad_2d(),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let mut encoder = manager
            .device()
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("two_draws"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_vertex_buffer(0, vertices.slice(..));

            manager.begin_2d(FilterMode::Point);
            manager.set_texture_2d(&white);
            manager.set_projection_matrix_2d(Mat4::IDENTITY);

            let left = Mat4::from_scale(Vec3::splat(2.0));
            manager.set_world_matrix_2d(left);
            manager.device_mut().apply(&mut pass).unwrap();
            pass.draw(0..6, 0..1);

            let right = Mat4::from_translation(Vec3::X) * left;
            manager.set_world_matrix_2d(right);
            manager.device_mut().apply(&mut pass).unwrap();
            pass.draw(0..6, 0..1);
        }
        manager
            .device()
            .queue()
            .submit(std::iter::once(encoder.finish()));

        let rows = read_back(manager.device(), &target);
        for row in &rows {
            let red: Vec<u8> = row.iter().map(|px| px[0]).collect();
            assert_eq!(red, vec![255, 255, 255, 255], "row {rows:?}");
        }
    }

    #[test]
    fn apply_uploads_only_changed_buffers() {
        let Some(device) = headless() else { return };
        let mut manager = PipelineManager::new(device, &embedded_shaders()).unwrap();
        let white = manager
            .device_mut()
            .create_texture_rgba8("white", 1, 1, &[255u8; 4]);
        let target = render_target(manager.device(), 1, 1);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = manager
            .device()
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                ..Default::default()
            });

            manager.begin_2d(FilterMode::Point);
            manager.set_texture_2d(&white);
            manager.device_mut().apply(&mut pass).unwrap();
            assert_eq!(manager.device().uniform_upload_count(), 2);

            manager.device_mut().apply(&mut pass).unwrap();
            assert_eq!(manager.device().uniform_upload_count(), 2);

            manager.set_world_matrix_2d(Mat4::from_scale(Vec3::splat(3.0)));
            manager.device_mut().apply(&mut pass).unwrap();
            assert_eq!(manager.device().uniform_upload_count(), 3);
        }
        manager
            .device()
            .queue()
            .submit(std::iter::once(encoder.finish()));
    }

    #[test]
    fn buffer_writes_check_size() {
        let Some(mut device) = headless() else { return };
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "dynamic",
                size: 16,
                usage: BufferUsage::Dynamic,
            })
            .unwrap();
        assert!(device.write_mapped(&buffer, &[1u8; 16]).is_ok());
        let short = device.write_mapped(&buffer, &[1u8; 8]);
        assert!(matches!(short, Err(DeviceError::Map { .. })));

        device.replace_buffer(&buffer, &[2u8; 4]);
        assert_eq!(device.uniforms[&buffer.id()].bytes, vec![1u8; 16]);
        device.replace_buffer(&buffer, &[2u8; 16]);
        assert_eq!(device.uniforms[&buffer.id()].bytes, vec![2u8; 16]);
    }

    #[test]
    fn apply_without_programs_is_incomplete() {
        let Some(mut device) = headless() else { return };
        let target = device.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("target"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: None,
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                },
            })],
            ..Default::default()
        });
        let result = device.apply(&mut pass);
        assert!(matches!(result, Err(DeviceError::Incomplete(_))));
    }
}
