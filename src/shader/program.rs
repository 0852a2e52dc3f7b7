//! Program creation: compile every stage, then link them into a pipeline

use super::{
    compile_file, find_uniform, resource_bindings, CompilePolicy, CompiledStage,
    ProgramSources, ResourceBinding, ShaderError, ShaderStage, UniformLocation, ENTRY_POINT,
};
use crate::backend::traits::*;
use crate::backend::types::*;
use std::path::Path;

/// Fixed-function state baked into a linked render pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub blend: Option<BlendState>,
}

impl PipelineState {
    pub fn new(color_format: TextureFormat) -> Self {
        Self {
            color_format,
            depth_format: None,
            depth_write: true,
            depth_compare: CompareFunction::LessEqual,
            cull_mode: CullMode::Back,
            // Mesh::cube winds its faces clockwise seen from outside
            front_face: FrontFace::Cw,
            blend: None,
        }
    }

    pub fn with_depth(mut self, format: TextureFormat, write: bool) -> Self {
        self.depth_format = Some(format);
        self.depth_write = write;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = Some(blend);
        self
    }
}

/// A linked program
#[derive(Debug)]
pub struct Program {
    pub name: String,
    pub pipeline: PipelineHandle,
    /// Compiled stages, kept for reflection after linking
    pub stages: Vec<CompiledStage>,
}

impl Program {
    /// Look `name` up across every stage
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.stages
            .iter()
            .find_map(|stage| find_uniform(&stage.module, name))
    }

    /// Bound resources of all stages, one entry per (group, binding)
    pub fn resources(&self) -> Vec<ResourceBinding> {
        let mut resources: Vec<ResourceBinding> = Vec::new();
        for stage in &self.stages {
            for resource in resource_bindings(&stage.module) {
                let seen = resources
                    .iter()
                    .any(|r| r.group == resource.group && r.binding == resource.binding);
                if !seen {
                    resources.push(resource);
                }
            }
        }
        resources.sort_by_key(|r| (r.group, r.binding));
        resources
    }

    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }

    pub fn render_pipeline(&self) -> Option<RenderPipelineHandle> {
        match self.pipeline {
            PipelineHandle::Render(handle) => Some(handle),
            PipelineHandle::Compute(_) => None,
        }
    }
}

fn release_modules<B: GraphicsBackend>(
    backend: &mut B,
    modules: &[(ShaderStage, ShaderModuleHandle)],
) {
    for (_, module) in modules {
        backend.destroy_shader_module(*module);
    }
}

fn discard_or_fail(policy: CompilePolicy, error: ShaderError) -> Result<(), ShaderError> {
    match (policy, error) {
        (CompilePolicy::Discard, ShaderError::CompileFailed { path, log }) => {
            log::warn!("Discarding {path:?}:\n{log}");
            Ok(())
        }
        (_, error) => Err(error),
    }
}

/// Compile the shaders at `paths` and link them into the program `name`.
///
/// A vertex stage (with an optional fragment stage) links into a render
/// pipeline, otherwise a compute stage links into a compute pipeline.
/// Every backend module created for the program is released before this
/// returns, whether linking succeeded or not.
pub fn create_program<B: GraphicsBackend, P: AsRef<Path>>(
    backend: &mut B,
    name: &str,
    paths: &[P],
    state: &PipelineState,
    policy: CompilePolicy,
) -> Result<Program, ShaderError> {
    let sources = ProgramSources::classify(name, paths)?;

    let mut stages = Vec::with_capacity(sources.stages.len());
    let mut modules: Vec<(ShaderStage, ShaderModuleHandle)> = Vec::new();

    for (stage, path) in &sources.stages {
        let compiled = match compile_file(*stage, path) {
            Ok(compiled) => compiled,
            Err(e) => {
                if let Err(e) = discard_or_fail(policy, e) {
                    release_modules(backend, &modules);
                    return Err(e);
                }
                continue;
            }
        };

        let label = format!("{name} {stage}");
        match backend.create_shader_module(&label, &compiled.wgsl) {
            Ok(module) => {
                modules.push((*stage, module));
                stages.push(compiled);
            }
            Err(e) => {
                let error = ShaderError::CompileFailed {
                    path: path.clone(),
                    log: e.to_string(),
                };
                if let Err(e) = discard_or_fail(policy, error) {
                    release_modules(backend, &modules);
                    return Err(e);
                }
            }
        }
    }

    let module_for = |stage: ShaderStage| {
        modules
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, m)| *m)
    };

    let linked = if let Some(vertex_module) = module_for(ShaderStage::Vertex) {
        if module_for(ShaderStage::Compute).is_some() {
            log::warn!("Program {name}: compute stage ignored next to a vertex stage");
        }
        backend
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(name.to_string()),
                vertex_module,
                vertex_entry_point: ENTRY_POINT.to_string(),
                fragment_module: module_for(ShaderStage::Fragment),
                fragment_entry_point: ENTRY_POINT.to_string(),
                vertex_layouts: vec![Vertex::layout()],
                primitive_topology: PrimitiveTopology::TriangleList,
                front_face: state.front_face,
                cull_mode: state.cull_mode,
                depth_stencil: state.depth_format.map(|format| DepthStencilState {
                    format,
                    depth_write_enabled: state.depth_write,
                    depth_compare: state.depth_compare,
                }),
                color_targets: vec![ColorTargetState {
                    format: state.color_format,
                    blend: state.blend,
                    write_mask: ColorWrites::ALL,
                }],
            })
            .map(PipelineHandle::Render)
            .map_err(|e| e.to_string())
    } else if let Some(module) = module_for(ShaderStage::Compute) {
        backend
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(name.to_string()),
                module,
                entry_point: ENTRY_POINT.to_string(),
            })
            .map(PipelineHandle::Compute)
            .map_err(|e| e.to_string())
    } else {
        Err("no vertex or compute stage compiled".to_string())
    };

    // The pipeline holds what it needs; the program keeps only the IR
    release_modules(backend, &modules);

    match linked {
        Ok(pipeline) => {
            log::info!("Linked program {name} ({} stages)", stages.len());
            Ok(Program {
                name: name.to_string(),
                pipeline,
                stages,
            })
        }
        Err(log) => {
            log::error!("Program {name} failed to link:\n{log}");
            Err(ShaderError::LinkFailed {
                program: name.to_string(),
                log,
            })
        }
    }
}
