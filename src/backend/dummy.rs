//! Dummy backend for testing.
//!
//! This backend doesn't touch a GPU. It keeps the descriptors and data it is
//! given and records every render command so tests can inspect what the
//! renderer asked for.

use std::collections::HashMap;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A render command as seen by the dummy backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginPass {
        color_load: Vec<LoadOp>,
        depth_load: Option<LoadOp>,
        depth_clear_value: Option<f32>,
    },
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    SetViewport {
        width: f32,
        height: f32,
    },
    DrawIndexed {
        indices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
    EndPass,
}

/// One upload into an array layer
#[derive(Debug, Clone)]
pub struct LayerWrite {
    pub texture: TextureHandle,
    pub layer: u32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Recording backend
#[derive(Debug)]
pub struct DummyBackend {
    size: (u32, u32),
    format: TextureFormat,
    next_id: u64,

    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_views: HashMap<u64, (TextureHandle, TextureViewDescriptor)>,
    samplers: HashMap<u64, SamplerDescriptor>,
    shader_modules: HashMap<u64, String>,
    render_pipelines: HashMap<u64, RenderPipelineDescriptor>,
    compute_pipelines: HashMap<u64, ComputePipelineDescriptor>,
    bind_group_layouts: HashMap<u64, (PipelineHandle, u32)>,
    bind_groups: HashMap<u64, Vec<(u32, BindGroupEntry)>>,

    layer_writes: Vec<LayerWrite>,
    commands: Vec<RecordedCommand>,
    in_pass: bool,
    frames_presented: u32,

    fail_pipelines: bool,
    lose_surface: bool,
    time_out: bool,
}

impl DummyBackend {
    /// Create a new dummy backend with a surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width.max(1), height.max(1)),
            format: TextureFormat::Bgra8UnormSrgb,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            shader_modules: HashMap::new(),
            render_pipelines: HashMap::new(),
            compute_pipelines: HashMap::new(),
            bind_group_layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            layer_writes: Vec::new(),
            commands: Vec::new(),
            in_pass: false,
            frames_presented: 0,
            fail_pipelines: false,
            lose_surface: false,
            time_out: false,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: RecordedCommand) {
        if self.in_pass {
            self.commands.push(command);
        } else {
            log::warn!("DummyBackend: {command:?} recorded outside a render pass");
        }
    }

    /// Make every following pipeline creation fail, as a driver link error would.
    pub fn fail_pipeline_creation(&mut self, fail: bool) {
        self.fail_pipelines = fail;
    }

    /// Report the surface as lost on the next `begin_frame`.
    pub fn lose_surface_once(&mut self) {
        self.lose_surface = true;
    }

    /// Time out the next `begin_frame`, as a busy compositor would.
    pub fn time_out_once(&mut self) {
        self.time_out = true;
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn view_descriptor(&self, view: TextureViewHandle) -> Option<&TextureViewDescriptor> {
        self.texture_views.get(&view.0).map(|(_, desc)| desc)
    }

    pub fn sampler_descriptor(&self, sampler: SamplerHandle) -> Option<&SamplerDescriptor> {
        self.samplers.get(&sampler.0)
    }

    /// Labels of the shader modules that are still alive
    pub fn live_shader_modules(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.shader_modules.values().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn render_pipeline(&self, pipeline: RenderPipelineHandle) -> Option<&RenderPipelineDescriptor> {
        self.render_pipelines.get(&pipeline.0)
    }

    pub fn compute_pipeline(
        &self,
        pipeline: ComputePipelineHandle,
    ) -> Option<&ComputePipelineDescriptor> {
        self.compute_pipelines.get(&pipeline.0)
    }

    pub fn bind_group_entries(&self, bind_group: BindGroupHandle) -> Option<&[(u32, BindGroupEntry)]> {
        self.bind_groups.get(&bind_group.0).map(Vec::as_slice)
    }

    pub fn layer_writes(&self) -> &[LayerWrite] {
        &self.layer_writes
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn frames_presented(&self) -> u32 {
        self.frames_presented
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy Backend"
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            log::trace!("DummyBackend: resize to {width}x{height}");
            self.size = (width, height);
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if std::mem::take(&mut self.lose_surface) {
            return Err(BackendError::SurfaceLost);
        }
        if std::mem::take(&mut self.time_out) {
            return Err(BackendError::FrameTimeout);
        }
        let id = self.allocate_id();
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(id),
            width: self.size.0,
            height: self.size.1,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.frames_presented += 1;
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = self.allocate_id();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} with {} bytes",
            desc.label,
            data.len()
        );
        let id = self.allocate_id();
        self.buffers.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            if end <= contents.len() {
                contents[start..end].copy_from_slice(data);
            } else {
                log::warn!("DummyBackend: write of {} bytes at {offset} overruns buffer", data.len());
            }
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            return Err(BackendError::TextureCreationFailed(
                "Texture dimensions must be non-zero".into(),
            ));
        }
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let layers = self
            .textures
            .get(&texture.0)
            .map(|t| t.array_layers)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?;

        let count = desc
            .array_layer_count
            .unwrap_or(layers.saturating_sub(desc.base_array_layer));
        let valid = match desc.dimension {
            TextureViewDimension::D2 => count == 1,
            TextureViewDimension::D2Array => count >= 1,
            TextureViewDimension::Cube => count == 6,
            TextureViewDimension::CubeArray => count >= 6 && count % 6 == 0,
        };
        if !valid || desc.base_array_layer + count > layers {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} view cannot cover {count} layers of a {layers} layer texture",
                desc.dimension
            )));
        }

        let id = self.allocate_id();
        self.texture_views.insert(id, (texture, desc.clone()));
        Ok(TextureViewHandle(id))
    }

    fn write_texture_layer(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let desc = self.textures.get(&texture.0).ok_or_else(|| {
            BackendError::TextureUploadFailed(format!("Texture for layer {layer} not found"))
        })?;
        if layer >= desc.array_layers {
            return Err(BackendError::TextureUploadFailed(format!(
                "Layer {layer} out of range for {} layers",
                desc.array_layers
            )));
        }

        log::trace!("DummyBackend: writing layer {layer} ({width}x{height})");
        self.layer_writes.push(LayerWrite {
            texture,
            layer,
            width,
            height,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        let id = self.allocate_id();
        self.samplers.insert(id, desc.clone());
        Ok(SamplerHandle(id))
    }

    fn create_shader_module(
        &mut self,
        label: &str,
        _wgsl: &str,
    ) -> BackendResult<ShaderModuleHandle> {
        log::trace!("DummyBackend: creating shader module {label}");
        let id = self.allocate_id();
        self.shader_modules.insert(id, label.to_string());
        Ok(ShaderModuleHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        if self.fail_pipelines {
            return Err(BackendError::PipelineCreationFailed(
                "pipeline creation disabled".into(),
            ));
        }
        let known = self.shader_modules.contains_key(&desc.vertex_module.0)
            && desc
                .fragment_module
                .map_or(true, |m| self.shader_modules.contains_key(&m.0));
        if !known {
            return Err(BackendError::PipelineCreationFailed(
                "Shader module not found".into(),
            ));
        }
        let id = self.allocate_id();
        self.render_pipelines.insert(id, desc.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        if self.fail_pipelines {
            return Err(BackendError::PipelineCreationFailed(
                "pipeline creation disabled".into(),
            ));
        }
        if !self.shader_modules.contains_key(&desc.module.0) {
            return Err(BackendError::PipelineCreationFailed(
                "Compute module not found".into(),
            ));
        }
        let id = self.allocate_id();
        self.compute_pipelines.insert(id, desc.clone());
        Ok(ComputePipelineHandle(id))
    }

    fn bind_group_layout(
        &mut self,
        pipeline: PipelineHandle,
        group: u32,
    ) -> BackendResult<BindGroupLayoutHandle> {
        let exists = match pipeline {
            PipelineHandle::Render(h) => self.render_pipelines.contains_key(&h.0),
            PipelineHandle::Compute(h) => self.compute_pipelines.contains_key(&h.0),
        };
        if !exists {
            return Err(BackendError::BindGroupCreationFailed(
                "Pipeline not found".into(),
            ));
        }
        let id = self.allocate_id();
        self.bind_group_layouts.insert(id, (pipeline, group));
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        if !self.bind_group_layouts.contains_key(&layout.0) {
            return Err(BackendError::BindGroupCreationFailed(
                "Layout not found".into(),
            ));
        }
        let id = self.allocate_id();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.in_pass = true;
        let depth = desc.depth_stencil_attachment.as_ref();
        self.commands.push(RecordedCommand::BeginPass {
            color_load: desc
                .color_attachments
                .iter()
                .map(|a| a.load_op.clone())
                .collect(),
            depth_load: depth.map(|d| d.depth_load_op.clone()),
            depth_clear_value: depth.map(|d| d.depth_clear_value),
        });
    }

    fn end_render_pass(&mut self) {
        if self.in_pass {
            self.commands.push(RecordedCommand::EndPass);
            self.in_pass = false;
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.record(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.record(RecordedCommand::SetIndexBuffer { buffer, format });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.record(RecordedCommand::SetViewport { width, height });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.record(RecordedCommand::DrawIndexed { indices, instances });
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        self.shader_modules.remove(&module.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.texture_views.retain(|_, (owner, _)| *owner != texture);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.texture_views.remove(&view.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_texture(backend: &mut DummyBackend, layers: u32) -> TextureHandle {
        backend
            .create_texture(&TextureDescriptor {
                width: 4,
                height: 4,
                array_layers: layers,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_cube_array_view_requires_multiple_of_six() {
        let mut backend = DummyBackend::default();
        let texture = array_texture(&mut backend, 12);
        let desc = TextureViewDescriptor {
            dimension: TextureViewDimension::CubeArray,
            ..Default::default()
        };
        assert!(backend.create_texture_view(texture, &desc).is_ok());

        let odd = array_texture(&mut backend, 7);
        assert!(backend.create_texture_view(odd, &desc).is_err());
    }

    #[test]
    fn test_write_buffer_updates_contents() {
        let mut backend = DummyBackend::default();
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer_contents(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_commands_outside_pass_are_dropped() {
        let mut backend = DummyBackend::default();
        backend.draw_indexed(0..36, 0, 0..1);
        assert!(backend.commands().is_empty());

        backend.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: vec![],
            depth_stencil_attachment: None,
        });
        backend.draw_indexed(0..36, 0, 0..1);
        backend.end_render_pass();
        assert_eq!(backend.commands().len(), 3);
    }

    #[test]
    fn test_frame_acquire_failures_recover() {
        let mut backend = DummyBackend::default();
        backend.lose_surface_once();
        assert!(matches!(backend.begin_frame(), Err(BackendError::SurfaceLost)));
        assert!(backend.begin_frame().is_ok());

        backend.time_out_once();
        assert!(matches!(backend.begin_frame(), Err(BackendError::FrameTimeout)));
        assert!(backend.begin_frame().is_ok());
    }

    #[test]
    fn test_layer_write_to_unknown_texture_fails() {
        let mut backend = DummyBackend::default();
        let texture = array_texture(&mut backend, 6);
        assert!(backend.write_texture_layer(texture, 5, &[0; 64], 4, 4).is_ok());
        assert!(matches!(
            backend.write_texture_layer(texture, 6, &[0; 64], 4, 4),
            Err(BackendError::TextureUploadFailed(_))
        ));

        backend.destroy_texture(texture);
        assert!(backend.write_texture_layer(texture, 0, &[0; 64], 4, 4).is_err());
        assert_eq!(backend.layer_writes().len(), 1);
    }
}
