//! In-memory device that records every creation and binding call.
//!
//! Used for tests and for printing a binding trace without a GPU. Buffer
//! contents, slot tables and the full command log can be inspected after the
//! fact.

use crate::device::{
    BufferDesc, BufferUsage, GraphicsDevice, InputElement, SamplerDesc, fingerprint, layout_stride,
};
use crate::error::DeviceError;
use bytemuck::Pod;
use shadekit_common::ShaderStage;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Handle to any object created on a [`RecordingDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    VertexProgram { fingerprint: u64 },
    PixelProgram { fingerprint: u64 },
    InputLayout { fingerprint: u64, stride: u32 },
    Buffer(BufferRecord),
    Sampler(SamplerDesc),
    Texture,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferRecord {
    pub desc: BufferDesc,
    pub contents: Vec<u8>,
    pub replace_count: u32,
    pub map_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedObject {
    pub label: String,
    pub kind: ObjectKind,
}

/// One call issued against the device context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetVertexProgram(ObjectId),
    SetPixelProgram(ObjectId),
    SetInputLayout(ObjectId),
    SetConstantBuffers {
        stage: ShaderStage,
        start_slot: u32,
        buffers: Vec<ObjectId>,
    },
    SetSamplers {
        stage: ShaderStage,
        start_slot: u32,
        samplers: Vec<ObjectId>,
    },
    SetTextures {
        stage: ShaderStage,
        start_slot: u32,
        views: Vec<ObjectId>,
    },
    ReplaceBuffer(ObjectId),
    WriteMapped(ObjectId),
    Draw(String),
}

/// What is currently bound to the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingState {
    pub vertex_program: Option<ObjectId>,
    pub pixel_program: Option<ObjectId>,
    pub input_layout: Option<ObjectId>,
    pub constant_buffers: BTreeMap<(ShaderStage, u32), ObjectId>,
    pub samplers: BTreeMap<(ShaderStage, u32), ObjectId>,
    pub textures: BTreeMap<(ShaderStage, u32), ObjectId>,
}

/// A draw submission together with the state it saw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub label: String,
    pub state: BindingState,
    /// Contents of every bound constant buffer at draw time.
    pub buffers: BTreeMap<(ShaderStage, u32), Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    objects: BTreeMap<ObjectId, RecordedObject>,
    next_id: u32,
    state: BindingState,
    commands: Vec<Command>,
    draws: Vec<DrawRecord>,
    failing_labels: BTreeSet<String>,
    fail_maps: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any later creation call with this label fails.
    pub fn fail_creation_of(mut self, label: impl Into<String>) -> Self {
        self.failing_labels.insert(label.into());
        self
    }

    /// Every later `write_mapped` fails.
    pub fn set_fail_maps(&mut self, fail: bool) {
        self.fail_maps = fail;
    }

    /// Registers a texture view handle, standing in for an asset loader.
    pub fn create_texture(&mut self, label: &str) -> ObjectId {
        self.insert(label, ObjectKind::Texture)
    }

    /// Records a draw against the current bindings.
    pub fn draw(&mut self, label: impl Into<String>) {
        let label = label.into();
        let buffers = self
            .state
            .constant_buffers
            .iter()
            .filter_map(|(slot, id)| self.buffer(*id).map(|b| (*slot, b.contents.clone())))
            .collect();
        self.draws.push(DrawRecord {
            label: label.clone(),
            state: self.state.clone(),
            buffers,
        });
        self.commands.push(Command::Draw(label));
    }

    pub fn state(&self) -> &BindingState {
        &self.state
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn object(&self, id: ObjectId) -> Option<&RecordedObject> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn label(&self, id: ObjectId) -> &str {
        self.objects
            .get(&id)
            .map_or("<unknown>", |o| o.label.as_str())
    }

    /// First object created with `label`.
    pub fn find(&self, label: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.label == label)
            .map(|(id, _)| *id)
    }

    pub fn buffer(&self, id: ObjectId) -> Option<&BufferRecord> {
        match self.objects.get(&id).map(|o| &o.kind) {
            Some(ObjectKind::Buffer(record)) => Some(record),
            _ => None,
        }
    }

    /// Decodes the current contents of the buffer labelled `label`.
    pub fn read_buffer<T: Pod>(&self, label: &str) -> Option<T> {
        let record = self.buffer(self.find(label)?)?;
        (record.contents.len() == std::mem::size_of::<T>())
            .then(|| bytemuck::pod_read_unaligned(&record.contents))
    }

    pub fn bound_buffer(&self, stage: ShaderStage, slot: u32) -> Option<ObjectId> {
        self.state.constant_buffers.get(&(stage, slot)).copied()
    }

    pub fn bound_sampler(&self, stage: ShaderStage, slot: u32) -> Option<ObjectId> {
        self.state.samplers.get(&(stage, slot)).copied()
    }

    pub fn bound_texture(&self, stage: ShaderStage, slot: u32) -> Option<ObjectId> {
        self.state.textures.get(&(stage, slot)).copied()
    }

    /// Checks that both programs and a layout are bound and that the layout
    /// was built from the bound vertex program's byte-code.
    pub fn validate_bindings(&self) -> Result<(), DeviceError> {
        let vs = self
            .state
            .vertex_program
            .ok_or_else(|| DeviceError::Incomplete("no vertex program bound".into()))?;
        self.state
            .pixel_program
            .ok_or_else(|| DeviceError::Incomplete("no pixel program bound".into()))?;
        let layout = self
            .state
            .input_layout
            .ok_or_else(|| DeviceError::Incomplete("no input layout bound".into()))?;

        let vs_print = match self.objects.get(&vs).map(|o| &o.kind) {
            Some(ObjectKind::VertexProgram { fingerprint }) => *fingerprint,
            _ => return Err(DeviceError::Incomplete("vertex slot not a program".into())),
        };
        match self.objects.get(&layout).map(|o| &o.kind) {
            Some(ObjectKind::InputLayout { fingerprint, .. }) if *fingerprint == vs_print => Ok(()),
            _ => Err(DeviceError::Incomplete(format!(
                "input layout '{}' does not match vertex program '{}'",
                self.label(layout),
                self.label(vs)
            ))),
        }
    }

    /// Human-readable rendering of the command log.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            let _ = writeln!(out, "{}", self.describe(command));
        }
        out
    }

    pub fn describe(&self, command: &Command) -> String {
        let names = |ids: &[ObjectId]| {
            ids.iter()
                .map(|id| self.label(*id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match command {
            Command::SetVertexProgram(id) => format!("VS  program  {}", self.label(*id)),
            Command::SetPixelProgram(id) => format!("PS  program  {}", self.label(*id)),
            Command::SetInputLayout(id) => format!("IA  layout   {}", self.label(*id)),
            Command::SetConstantBuffers {
                stage,
                start_slot,
                buffers,
            } => format!(
                "{}  b{start_slot}+    [{}]",
                stage_tag(*stage),
                names(buffers)
            ),
            Command::SetSamplers {
                stage,
                start_slot,
                samplers,
            } => format!(
                "{}  s{start_slot}+    [{}]",
                stage_tag(*stage),
                names(samplers)
            ),
            Command::SetTextures {
                stage,
                start_slot,
                views,
            } => format!(
                "{}  t{start_slot}+    [{}]",
                stage_tag(*stage),
                names(views)
            ),
            Command::ReplaceBuffer(id) => format!("UPD replace  {}", self.label(*id)),
            Command::WriteMapped(id) => format!("UPD map      {}", self.label(*id)),
            Command::Draw(label) => format!("DRAW {label}"),
        }
    }

    fn insert(&mut self, label: &str, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            RecordedObject {
                label: label.to_string(),
                kind,
            },
        );
        id
    }

    fn check_creation(&self, object: &'static str, label: &str) -> Result<(), DeviceError> {
        if self.failing_labels.contains(label) {
            return Err(DeviceError::Creation {
                object,
                label: label.to_string(),
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn check_bytecode(label: &str, bytecode: &[u8]) -> Result<(), DeviceError> {
        if bytecode.is_empty() {
            return Err(DeviceError::MalformedBytecode {
                label: label.to_string(),
                reason: "empty blob".into(),
            });
        }
        Ok(())
    }

    fn buffer_mut(&mut self, id: ObjectId) -> Option<&mut BufferRecord> {
        match self.objects.get_mut(&id).map(|o| &mut o.kind) {
            Some(ObjectKind::Buffer(record)) => Some(record),
            _ => None,
        }
    }
}

fn stage_tag(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "VS",
        ShaderStage::Pixel => "PS",
    }
}

fn bind_run(
    table: &mut BTreeMap<(ShaderStage, u32), ObjectId>,
    stage: ShaderStage,
    start_slot: u32,
    ids: &[ObjectId],
) {
    for (slot, id) in (start_slot..).zip(ids) {
        table.insert((stage, slot), *id);
    }
}

impl GraphicsDevice for RecordingDevice {
    type VertexProgram = ObjectId;
    type PixelProgram = ObjectId;
    type InputLayout = ObjectId;
    type Buffer = ObjectId;
    type Sampler = ObjectId;
    type TextureView = ObjectId;

    fn create_vertex_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<ObjectId, DeviceError> {
        Self::check_bytecode(label, bytecode)?;
        self.check_creation("vertex program", label)?;
        let fingerprint = fingerprint(bytecode);
        let kind = ObjectKind::VertexProgram { fingerprint };
        Ok(self.insert(label, kind))
    }

    fn create_pixel_program(
        &mut self,
        label: &str,
        bytecode: &[u8],
    ) -> Result<ObjectId, DeviceError> {
        Self::check_bytecode(label, bytecode)?;
        self.check_creation("pixel program", label)?;
        let fingerprint = fingerprint(bytecode);
        let kind = ObjectKind::PixelProgram { fingerprint };
        Ok(self.insert(label, kind))
    }

    fn create_input_layout(
        &mut self,
        label: &str,
        elements: &[InputElement],
        bytecode: &[u8],
    ) -> Result<ObjectId, DeviceError> {
        Self::check_bytecode(label, bytecode)?;
        let layout_label = format!("{label}_layout");
        self.check_creation("input layout", &layout_label)?;
        let kind = ObjectKind::InputLayout {
            fingerprint: fingerprint(bytecode),
            stride: layout_stride(elements),
        };
        Ok(self.insert(&layout_label, kind))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ObjectId, DeviceError> {
        self.check_creation("buffer", desc.label)?;
        let record = BufferRecord {
            desc: desc.clone(),
            contents: vec![0; desc.size as usize],
            replace_count: 0,
            map_count: 0,
        };
        Ok(self.insert(desc.label, ObjectKind::Buffer(record)))
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<ObjectId, DeviceError> {
        self.check_creation("sampler", desc.label)?;
        Ok(self.insert(desc.label, ObjectKind::Sampler(desc.clone())))
    }

    fn set_vertex_program(&mut self, program: &ObjectId) {
        self.state.vertex_program = Some(*program);
        self.commands.push(Command::SetVertexProgram(*program));
    }

    fn set_pixel_program(&mut self, program: &ObjectId) {
        self.state.pixel_program = Some(*program);
        self.commands.push(Command::SetPixelProgram(*program));
    }

    fn set_input_layout(&mut self, layout: &ObjectId) {
        self.state.input_layout = Some(*layout);
        self.commands.push(Command::SetInputLayout(*layout));
    }

    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[&ObjectId]) {
        let ids: Vec<ObjectId> = buffers.iter().map(|b| **b).collect();
        bind_run(&mut self.state.constant_buffers, stage, start_slot, &ids);
        self.commands.push(Command::SetConstantBuffers {
            stage,
            start_slot,
            buffers: ids,
        });
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[&ObjectId]) {
        let ids: Vec<ObjectId> = samplers.iter().map(|s| **s).collect();
        bind_run(&mut self.state.samplers, stage, start_slot, &ids);
        self.commands.push(Command::SetSamplers {
            stage,
            start_slot,
            samplers: ids,
        });
    }

    fn set_textures(&mut self, stage: ShaderStage, start_slot: u32, views: &[&ObjectId]) {
        let ids: Vec<ObjectId> = views.iter().map(|v| **v).collect();
        bind_run(&mut self.state.textures, stage, start_slot, &ids);
        self.commands.push(Command::SetTextures {
            stage,
            start_slot,
            views: ids,
        });
    }

    fn replace_buffer(&mut self, buffer: &ObjectId, bytes: &[u8]) {
        let id = *buffer;
        if let Some(record) = self.buffer_mut(id) {
            debug_assert_eq!(record.desc.usage, BufferUsage::Default);
            debug_assert_eq!(record.contents.len(), bytes.len());
            record.contents.copy_from_slice(bytes);
            record.replace_count += 1;
        }
        self.commands.push(Command::ReplaceBuffer(id));
    }

    fn write_mapped(&mut self, buffer: &ObjectId, bytes: &[u8]) -> Result<(), DeviceError> {
        let id = *buffer;
        let fail = self.fail_maps;
        let label = self.label(id).to_string();
        let record = self.buffer_mut(id).ok_or_else(|| DeviceError::Map {
            label: label.clone(),
            reason: "not a buffer".into(),
        })?;
        if fail || record.desc.usage != BufferUsage::Dynamic {
            return Err(DeviceError::Map {
                label,
                reason: if fail {
                    "injected failure".into()
                } else {
                    "buffer is not CPU-writable".into()
                },
            });
        }
        record.contents.copy_from_slice(bytes);
        record.map_count += 1;
        self.commands.push(Command::WriteMapped(id));
        Ok(())
    }
}
