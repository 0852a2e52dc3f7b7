//! Uniform buffers and bind groups of a linked program

use super::{Program, ResourceKind, ShaderError, UniformKind};
use crate::backend::traits::*;
use crate::backend::types::*;
use glam::Mat4;
use std::collections::HashMap;

/// Textures and samplers a program may bind, by uniform name
#[derive(Debug, Clone, Default)]
pub struct BindingResources {
    textures: HashMap<String, TextureViewHandle>,
    samplers: HashMap<String, SamplerHandle>,
}

impl BindingResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture(mut self, name: &str, view: TextureViewHandle) -> Self {
        self.textures.insert(name.to_string(), view);
        self
    }

    pub fn with_sampler(mut self, name: &str, sampler: SamplerHandle) -> Self {
        self.samplers.insert(name.to_string(), sampler);
        self
    }
}

/// Resolved location of a uniform value inside a block buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u32,
}

impl UniformSlot {
    pub fn write_mat4<B: GraphicsBackend>(&self, backend: &mut B, value: &Mat4) {
        backend.write_buffer(self.buffer, self.offset, bytemuck::bytes_of(value));
    }

    pub fn write_i32<B: GraphicsBackend>(&self, backend: &mut B, value: i32) {
        backend.write_buffer(self.buffer, self.offset, bytemuck::bytes_of(&value));
    }
}

/// Per-program GPU state: one buffer per uniform block, one bind group per group
#[derive(Debug)]
pub struct ProgramBindings {
    program: String,
    block_buffers: HashMap<(u32, u32), BufferHandle>,
    bind_groups: Vec<(u32, BindGroupHandle)>,
}

impl ProgramBindings {
    /// Allocate block buffers and build every bind group `program` uses
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        program: &Program,
        resources: &BindingResources,
    ) -> Result<Self, ShaderError> {
        let mut block_buffers = HashMap::new();
        let mut groups: Vec<(u32, Vec<(u32, BindGroupEntry)>)> = Vec::new();

        for resource in program.resources() {
            let entry = match &resource.kind {
                ResourceKind::UniformBlock { size, .. } => {
                    let buffer = backend.create_buffer(&BufferDescriptor {
                        label: Some(format!("{} {}", program.name, resource.name)),
                        size: u64::from(*size),
                        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                    })?;
                    block_buffers.insert((resource.group, resource.binding), buffer);
                    BindGroupEntry::Buffer {
                        buffer,
                        offset: 0,
                        size: None,
                    }
                }
                ResourceKind::Texture => {
                    let view = resources.textures.get(&resource.name).ok_or_else(|| {
                        ShaderError::MissingResource {
                            program: program.name.clone(),
                            name: resource.name.clone(),
                        }
                    })?;
                    BindGroupEntry::Texture(*view)
                }
                ResourceKind::Sampler => {
                    let sampler = resources.samplers.get(&resource.name).ok_or_else(|| {
                        ShaderError::MissingResource {
                            program: program.name.clone(),
                            name: resource.name.clone(),
                        }
                    })?;
                    BindGroupEntry::Sampler(*sampler)
                }
            };

            match groups.iter_mut().find(|(g, _)| *g == resource.group) {
                Some((_, entries)) => entries.push((resource.binding, entry)),
                None => groups.push((resource.group, vec![(resource.binding, entry)])),
            }
        }

        let mut bind_groups = Vec::with_capacity(groups.len());
        for (group, entries) in groups {
            let layout = backend.bind_group_layout(program.pipeline, group)?;
            let bind_group = backend.create_bind_group(layout, &entries)?;
            bind_groups.push((group, bind_group));
        }

        log::debug!(
            "Program {}: {} uniform blocks, {} bind groups",
            program.name,
            block_buffers.len(),
            bind_groups.len()
        );

        Ok(Self {
            program: program.name.clone(),
            block_buffers,
            bind_groups,
        })
    }

    /// Resolve `name` to the block bytes it occupies
    pub fn uniform(&self, program: &Program, name: &str) -> Result<UniformSlot, ShaderError> {
        let missing = || ShaderError::MissingUniform {
            program: self.program.clone(),
            name: name.to_string(),
        };

        let location = program.uniform_location(name).ok_or_else(missing)?;
        let UniformKind::Block { offset, size, .. } = location.kind else {
            return Err(missing());
        };
        let buffer = self
            .block_buffers
            .get(&(location.group, location.binding))
            .ok_or_else(missing)?;

        Ok(UniformSlot {
            buffer: *buffer,
            offset: u64::from(offset),
            size,
        })
    }

    /// Resolve `name` and check it holds exactly `T`
    pub fn typed_uniform<T>(&self, program: &Program, name: &str) -> Result<UniformSlot, ShaderError> {
        let slot = self.uniform(program, name)?;
        let actual = std::mem::size_of::<T>();
        if slot.size as usize != actual {
            return Err(ShaderError::UniformSize {
                name: name.to_string(),
                expected: slot.size,
                actual,
            });
        }
        Ok(slot)
    }

    /// Set every bind group of the program on the current pass
    pub fn bind<B: GraphicsBackend>(&self, backend: &mut B) {
        for (group, bind_group) in &self.bind_groups {
            backend.set_bind_group(*group, *bind_group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::shader::{create_program, CompilePolicy, PipelineState};

    const VERTEX: &str = r#"#version 450

layout(set = 0, binding = 0) uniform SkyUniforms {
    mat4 vp;
    int layer;
};

layout(location = 0) in vec3 position;
layout(location = 0) out vec3 direction;

void main() {
    direction = position;
    gl_Position = vp * vec4(position, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 450

layout(set = 0, binding = 0) uniform SkyUniforms {
    mat4 vp;
    int layer;
};
layout(set = 0, binding = 1) uniform texture2D skybox;
layout(set = 0, binding = 2) uniform sampler cubemap;

layout(location = 0) in vec3 direction;
layout(location = 0) out vec4 color;

void main() {
    color = texture(sampler2D(skybox, cubemap), direction.xy) * float(layer + 1);
}
"#;

    fn sky_program(backend: &mut DummyBackend) -> Program {
        let dir = std::env::temp_dir().join("skybox-demo-bindings");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sky.vert"), VERTEX).unwrap();
        std::fs::write(dir.join("sky.frag"), FRAGMENT).unwrap();
        create_program(
            backend,
            "sky",
            &[dir.join("sky.vert"), dir.join("sky.frag")],
            &PipelineState::new(TextureFormat::Bgra8UnormSrgb),
            CompilePolicy::Fatal,
        )
        .unwrap()
    }

    fn resources(backend: &mut DummyBackend) -> BindingResources {
        let texture = backend
            .create_texture(&TextureDescriptor::default())
            .unwrap();
        let view = backend
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        let sampler = backend.create_sampler(&SamplerDescriptor::default()).unwrap();
        BindingResources::new()
            .with_texture("skybox", view)
            .with_sampler("cubemap", sampler)
    }

    #[test]
    fn test_bindings_write_uniforms() {
        let mut backend = DummyBackend::default();
        let program = sky_program(&mut backend);
        let resources = resources(&mut backend);
        let bindings = ProgramBindings::new(&mut backend, &program, &resources).unwrap();

        let vp = bindings.typed_uniform::<Mat4>(&program, "vp").unwrap();
        let layer = bindings.typed_uniform::<i32>(&program, "layer").unwrap();
        assert_eq!(vp.buffer, layer.buffer);
        assert_eq!(layer.offset, 64);

        vp.write_mat4(&mut backend, &Mat4::from_scale(glam::Vec3::splat(2.0)));
        layer.write_i32(&mut backend, 7);

        let contents = backend.buffer_contents(vp.buffer).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(&contents[..64]);
        assert_eq!(floats[0], 2.0);
        assert_eq!(floats[15], 1.0);
        assert_eq!(&contents[64..68], &7i32.to_ne_bytes());
    }

    #[test]
    fn test_bind_group_entries() {
        let mut backend = DummyBackend::default();
        let program = sky_program(&mut backend);
        let resources = resources(&mut backend);
        let bindings = ProgramBindings::new(&mut backend, &program, &resources).unwrap();

        assert_eq!(bindings.bind_groups.len(), 1);
        let entries = backend
            .bind_group_entries(bindings.bind_groups[0].1)
            .unwrap();
        let slots: Vec<u32> = entries.iter().map(|(b, _)| *b).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(matches!(entries[1].1, BindGroupEntry::Texture(_)));
        assert!(matches!(entries[2].1, BindGroupEntry::Sampler(_)));
    }

    #[test]
    fn test_missing_resource_and_uniform() {
        let mut backend = DummyBackend::default();
        let program = sky_program(&mut backend);

        let err = ProgramBindings::new(&mut backend, &program, &BindingResources::new()).unwrap_err();
        assert!(matches!(err, ShaderError::MissingResource { ref name, .. } if name == "skybox"));

        let resources = resources(&mut backend);
        let bindings = ProgramBindings::new(&mut backend, &program, &resources).unwrap();
        assert!(matches!(
            bindings.uniform(&program, "mvp"),
            Err(ShaderError::MissingUniform { .. })
        ));
        assert!(matches!(
            bindings.typed_uniform::<Mat4>(&program, "layer"),
            Err(ShaderError::UniformSize { expected: 4, .. })
        ));
    }
}
