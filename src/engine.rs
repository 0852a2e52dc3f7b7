//! Frame driver
//!
//! [`SkyboxRenderer`] owns every GPU handle of the demo. `prepare` builds
//! them once, then each frame draws the skybox followed by the cube with the
//! shared cube mesh.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::error::{DemoError, DemoResult};
use crate::resources::{splice_atlases, CubeMapArray, Image, Mesh};
use crate::scene::{demo_camera, demo_transform, FrameMatrices, Transform};
use crate::shader::{
    create_program, BindingResources, PipelineState, Program, ProgramBindings, UniformSlot,
};
use crate::window::{AppWindow, RenderWindow};
use crate::{DemoConfig, CUBE_PROGRAM, SKYBOX_PROGRAM};
use glam::Mat4;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
pub const DEPTH_CLEAR_VALUE: f32 = 1.0;

/// Skybox: seen from inside, no depth writes
pub fn skybox_pipeline_state(color_format: TextureFormat) -> PipelineState {
    PipelineState::new(color_format)
        .with_depth(DEPTH_FORMAT, false)
        .with_cull_mode(CullMode::Front)
        .with_blend(BlendState::alpha_blending())
}

/// Object: seen from outside, depth tested and written
pub fn cube_pipeline_state(color_format: TextureFormat) -> PipelineState {
    PipelineState::new(color_format)
        .with_depth(DEPTH_FORMAT, true)
        .with_cull_mode(CullMode::Back)
        .with_blend(BlendState::alpha_blending())
}

/// Lifecycle of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Uninitialized,
    Prepared,
    Rendering,
    Terminated,
}

/// GPU resources for a mesh
struct GpuMesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
}

/// A linked program with its bindings
struct DrawProgram {
    program: Program,
    pipeline: RenderPipelineHandle,
    bindings: ProgramBindings,
}

/// Depth buffer matching the surface
struct DepthTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
    width: u32,
    height: u32,
}

/// Render state holding GPU resources
struct RenderState {
    mesh: GpuMesh,
    skybox: DrawProgram,
    cube: DrawProgram,
    skyboxes: CubeMapArray,

    vp: UniformSlot,
    layer: UniformSlot,
    mvp: UniformSlot,

    depth: DepthTarget,
}

/// Draws the cube in front of the selected skybox
pub struct SkyboxRenderer {
    config: DemoConfig,
    model: Transform,
    phase: FramePhase,
    frames_drawn: u64,
    state: Option<RenderState>,
}

impl SkyboxRenderer {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            model: demo_transform(),
            phase: FramePhase::Uninitialized,
            frames_drawn: 0,
            state: None,
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Load assets and create every GPU resource
    pub fn prepare<B: GraphicsBackend>(&mut self, backend: &mut B) -> DemoResult<()> {
        log::info!("Preparing to draw with the {} backend", backend.name());

        let mesh = Mesh::cube();

        // Programs
        let color_format = backend.swapchain_format();
        let skybox_state = skybox_pipeline_state(color_format);
        let cube_state = cube_pipeline_state(color_format);

        let skybox_program = self.create_program(backend, SKYBOX_PROGRAM, &skybox_state)?;
        let cube_program = self.create_program(backend, CUBE_PROGRAM, &cube_state)?;

        // Textures
        let images = self
            .config
            .atlases
            .iter()
            .map(Image::from_file)
            .collect::<Result<Vec<_>, _>>()?;
        let skyboxes = splice_atlases(backend, images)?;
        if self.config.skybox >= skyboxes.cube_count {
            return Err(DemoError::SkyboxOutOfRange {
                index: self.config.skybox,
                count: skyboxes.cube_count,
            });
        }

        // Uniforms
        let skybox_resources = BindingResources::new()
            .with_texture("skybox", skyboxes.view)
            .with_sampler("cubemap", skyboxes.sampler);
        let skybox = Self::bind(backend, skybox_program, &skybox_resources)?;
        let cube = Self::bind(backend, cube_program, &BindingResources::new())?;

        let vp = skybox.bindings.typed_uniform::<Mat4>(&skybox.program, "vp")?;
        let layer = skybox.bindings.typed_uniform::<i32>(&skybox.program, "layer")?;
        let mvp = cube.bindings.typed_uniform::<Mat4>(&cube.program, "mvp")?;
        layer.write_i32(backend, self.config.skybox as i32);

        // Buffers
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Cube Vertices".into()),
                size: mesh.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            mesh.vertex_bytes(),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Cube Indices".into()),
                size: mesh.index_bytes().len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            mesh.index_bytes(),
        )?;

        let (width, height) = backend.surface_size();
        let depth = Self::create_depth_target(backend, width, height)?;

        self.state = Some(RenderState {
            mesh: GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count() as u32,
            },
            skybox,
            cube,
            skyboxes,
            vp,
            layer,
            mvp,
            depth,
        });
        self.phase = FramePhase::Prepared;

        log::info!(
            "Prepared {} skyboxes, showing skybox {}",
            skyboxes.cube_count,
            self.config.skybox
        );
        Ok(())
    }

    fn create_program<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        name: &str,
        state: &PipelineState,
    ) -> DemoResult<Program> {
        let config = self
            .config
            .program(name)
            .ok_or_else(|| DemoError::MissingProgram(name.to_string()))?;
        Ok(create_program(
            backend,
            name,
            &config.shaders,
            state,
            self.config.compile_policy,
        )?)
    }

    fn bind<B: GraphicsBackend>(
        backend: &mut B,
        program: Program,
        resources: &BindingResources,
    ) -> DemoResult<DrawProgram> {
        let pipeline = program
            .render_pipeline()
            .ok_or_else(|| DemoError::MissingProgram(format!("{} (render)", program.name)))?;
        let bindings = ProgramBindings::new(backend, &program, resources)?;
        Ok(DrawProgram {
            program,
            pipeline,
            bindings,
        })
    }

    fn create_depth_target<B: GraphicsBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<DepthTarget> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Depth Buffer".into()),
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            format: DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture, &TextureViewDescriptor::default())?;

        Ok(DepthTarget {
            texture,
            view,
            width,
            height,
        })
    }

    /// Recreate the depth buffer if the surface size changed
    fn sync_depth_target<B: GraphicsBackend>(&mut self, backend: &mut B) -> DemoResult<()> {
        let state = self.state.as_mut().ok_or(DemoError::NotPrepared)?;
        let (width, height) = backend.surface_size();
        if state.depth.width == width && state.depth.height == height {
            return Ok(());
        }

        log::debug!("Recreating depth buffer at {width}x{height}");
        backend.destroy_texture_view(state.depth.view);
        backend.destroy_texture(state.depth.texture);
        state.depth = Self::create_depth_target(backend, width, height)?;
        Ok(())
    }

    /// Reconfigure the surface and depth buffer for a new window size
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> DemoResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        backend.resize(width, height);
        if self.state.is_some() {
            self.sync_depth_target(backend)?;
        }
        Ok(())
    }

    /// Record and present one frame
    pub fn draw_frame<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        fovy: f32,
        aspect: f32,
    ) -> DemoResult<()> {
        if self.state.is_none() {
            return Err(DemoError::NotPrepared);
        }

        let frame = match backend.begin_frame() {
            Ok(frame) => frame,
            Err(BackendError::SurfaceLost) => {
                let (width, height) = backend.surface_size();
                log::warn!("Surface lost, reconfiguring at {width}x{height}");
                backend.resize(width, height);
                return Ok(());
            }
            Err(BackendError::FrameTimeout) => {
                log::warn!("Timed out acquiring a frame, skipping it");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.sync_depth_target(backend)?;

        let state = self.state.as_ref().ok_or(DemoError::NotPrepared)?;

        let matrices = FrameMatrices::compute(&demo_camera(fovy, aspect), &self.model);
        state.vp.write_mat4(backend, &matrices.vp);
        state.mvp.write_mat4(backend, &matrices.mvp);

        // The skybox covers the whole frame, so only depth is cleared
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Skybox Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: state.depth.view,
                depth_load_op: LoadOp::Clear([DEPTH_CLEAR_VALUE, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: DEPTH_CLEAR_VALUE,
            }),
        });

        backend.set_viewport(0.0, 0.0, frame.width as f32, frame.height as f32, 0.0, 1.0);
        backend.set_vertex_buffer(0, state.mesh.vertex_buffer, 0);
        backend.set_index_buffer(state.mesh.index_buffer, 0, IndexFormat::Uint16);

        for program in [&state.skybox, &state.cube] {
            backend.set_render_pipeline(program.pipeline);
            program.bindings.bind(backend);
            backend.draw_indexed(0..state.mesh.index_count, 0, 0..1);
        }

        backend.end_render_pass();
        backend.end_frame()?;

        self.phase = FramePhase::Rendering;
        self.frames_drawn += 1;
        Ok(())
    }

    /// Prepare if needed, then draw until the window stops the loop
    pub fn run<W: RenderWindow, B: GraphicsBackend>(
        &mut self,
        window: &mut W,
        backend: &mut B,
    ) -> DemoResult<()> {
        window.make_current();

        if self.phase == FramePhase::Uninitialized {
            self.prepare(backend)?;
        }

        while window.render_cond() {
            if let Some((width, height)) = window.render_begin() {
                self.resize(backend, width, height)?;
            }
            self.draw_frame(backend, window.fovy(), window.aspect())?;
            window.render_end();
        }

        self.phase = FramePhase::Terminated;
        log::info!("Render loop finished after {} frames", self.frames_drawn);
        Ok(())
    }

    /// Number of cube maps available for selection
    pub fn skybox_count(&self) -> Option<u32> {
        self.state.as_ref().map(|s| s.skyboxes.cube_count)
    }

    /// Show another cube map of the array
    pub fn select_skybox<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        index: u32,
    ) -> DemoResult<()> {
        let state = self.state.as_ref().ok_or(DemoError::NotPrepared)?;
        if index >= state.skyboxes.cube_count {
            return Err(DemoError::SkyboxOutOfRange {
                index,
                count: state.skyboxes.cube_count,
            });
        }
        state.layer.write_i32(backend, index as i32);
        self.config.skybox = index;
        Ok(())
    }
}

/// Open the window, create the wgpu backend and run the demo to completion
pub fn run(config: DemoConfig) -> DemoResult<()> {
    let mut window =
        AppWindow::new(&config.title, config.width, config.height)?.with_fovy(config.fovy);
    let mut backend = WgpuBackend::new(window.window_arc(), config.vsync)?;

    let info = backend.adapter_info();
    log::info!("Renderer: {} ({:?})", info.name, info.backend);

    let mut renderer = SkyboxRenderer::new(config);
    renderer.run(&mut window, &mut backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use crate::shader::{compile_file, ShaderStage};
    use crate::ProgramConfig;
    use glam::Vec3;
    use std::path::{Path, PathBuf};

    const SKY_VERT: &str = r#"#version 450

layout(set = 0, binding = 0) uniform SkyboxUniforms {
    mat4 vp;
    int layer;
};

layout(location = 0) in vec3 position;
layout(location = 0) out vec3 direction;

void main() {
    direction = position;
    gl_Position = (vp * vec4(position, 1.0)).xyww;
}
"#;

    const SKY_FRAG: &str = r#"#version 450

layout(set = 0, binding = 0) uniform SkyboxUniforms {
    mat4 vp;
    int layer;
};
layout(set = 0, binding = 1) uniform texture2D skybox;
layout(set = 0, binding = 2) uniform sampler cubemap;

layout(location = 0) in vec3 direction;
layout(location = 0) out vec4 color;

void main() {
    color = texture(sampler2D(skybox, cubemap), direction.xy) + vec4(float(layer));
}
"#;

    const CUBE_VERT: &str = r#"#version 450

layout(set = 0, binding = 0) uniform ObjectUniforms {
    mat4 mvp;
};

layout(location = 0) in vec3 position;

void main() {
    gl_Position = mvp * vec4(position, 1.0);
}
"#;

    const CUBE_FRAG: &str = r#"#version 450

layout(location = 0) out vec4 color;

void main() {
    color = vec4(1.0, 0.5, 0.25, 0.85);
}
"#;

    /// Window that renders a fixed number of frames
    struct ScriptedWindow {
        frames_left: u32,
        resize_at: Option<(u32, (u32, u32))>,
        made_current: bool,
        begun: u32,
        ended: u32,
    }

    impl ScriptedWindow {
        fn new(frames: u32) -> Self {
            Self {
                frames_left: frames,
                resize_at: None,
                made_current: false,
                begun: 0,
                ended: 0,
            }
        }
    }

    impl RenderWindow for ScriptedWindow {
        fn make_current(&mut self) {
            self.made_current = true;
        }

        fn render_cond(&mut self) -> bool {
            if self.frames_left == 0 {
                return false;
            }
            self.frames_left -= 1;
            true
        }

        fn render_begin(&mut self) -> Option<(u32, u32)> {
            let frame = self.begun;
            self.begun += 1;
            match self.resize_at {
                Some((at, size)) if at == frame => Some(size),
                _ => None,
            }
        }

        fn render_end(&mut self) {
            self.ended += 1;
        }

        fn fovy(&self) -> f32 {
            crate::window::DEFAULT_FOVY
        }

        fn aspect(&self) -> f32 {
            4.0 / 3.0
        }
    }

    fn write_atlas(path: &Path, tag: u8) {
        let atlas =
            image::RgbaImage::from_fn(16, 12, |x, y| image::Rgba([x as u8, y as u8, tag, 255]));
        atlas.save(path).unwrap();
    }

    /// Config pointing at freshly written assets under the temp directory
    fn test_config(test: &str, atlases: u8) -> DemoConfig {
        let dir = std::env::temp_dir().join(format!("skybox-demo-engine-{test}"));
        std::fs::create_dir_all(&dir).unwrap();

        let mut atlas_paths = Vec::new();
        for tag in 0..atlases {
            let path = dir.join(format!("cubebox-{tag}.png"));
            write_atlas(&path, tag);
            atlas_paths.push(path);
        }

        for (name, source) in [
            ("skybox.vert", SKY_VERT),
            ("skybox.frag", SKY_FRAG),
            ("cubeobj.vert", CUBE_VERT),
            ("cubeobj.frag", CUBE_FRAG),
        ] {
            std::fs::write(dir.join(name), source).unwrap();
        }

        DemoConfig::default()
            .with_atlases(atlas_paths)
            .with_program(ProgramConfig::new(
                SKYBOX_PROGRAM,
                [dir.join("skybox.vert"), dir.join("skybox.frag")],
            ))
            .with_program(ProgramConfig::new(
                CUBE_PROGRAM,
                [dir.join("cubeobj.vert"), dir.join("cubeobj.frag")],
            ))
    }

    #[test]
    fn test_draw_before_prepare_fails() {
        let mut renderer = SkyboxRenderer::new(test_config("unprepared", 1));
        let mut backend = DummyBackend::default();
        assert_eq!(renderer.phase(), FramePhase::Uninitialized);
        assert!(matches!(
            renderer.draw_frame(&mut backend, 0.3, 1.0),
            Err(DemoError::NotPrepared)
        ));
        assert_eq!(backend.frames_presented(), 0);
    }

    #[test]
    fn test_prepare_uploads_cube_and_skyboxes() {
        let mut renderer = SkyboxRenderer::new(test_config("prepare", 3).with_skybox(2));
        let mut backend = DummyBackend::default();
        renderer.prepare(&mut backend).unwrap();
        assert_eq!(renderer.phase(), FramePhase::Prepared);
        assert_eq!(renderer.skybox_count(), Some(3));

        let state = renderer.state.as_ref().unwrap();
        let cube = Mesh::cube();
        assert_eq!(
            backend.buffer_contents(state.mesh.vertex_buffer).unwrap(),
            cube.vertex_bytes()
        );
        assert_eq!(
            backend.buffer_contents(state.mesh.index_buffer).unwrap(),
            cube.index_bytes()
        );
        assert_eq!(state.mesh.index_count, 36);

        assert_eq!(backend.layer_writes().len(), 18);
        let layer = backend.buffer_contents(state.layer.buffer).unwrap();
        let offset = state.layer.offset as usize;
        assert_eq!(&layer[offset..offset + 4], &2i32.to_ne_bytes());
    }

    #[test]
    fn test_pipeline_state_per_program() {
        let mut renderer = SkyboxRenderer::new(test_config("pipelines", 1));
        let mut backend = DummyBackend::default();
        renderer.prepare(&mut backend).unwrap();
        let state = renderer.state.as_ref().unwrap();

        let sky = backend.render_pipeline(state.skybox.pipeline).unwrap();
        assert_eq!(sky.cull_mode, CullMode::Front);
        assert_eq!(sky.front_face, FrontFace::Cw);
        let sky_depth = sky.depth_stencil.as_ref().unwrap();
        assert!(!sky_depth.depth_write_enabled);
        assert_eq!(sky_depth.depth_compare, CompareFunction::LessEqual);

        let cube = backend.render_pipeline(state.cube.pipeline).unwrap();
        assert_eq!(cube.cull_mode, CullMode::Back);
        assert!(cube.depth_stencil.as_ref().unwrap().depth_write_enabled);
        assert_eq!(cube.color_targets[0].blend, Some(BlendState::alpha_blending()));
    }

    #[test]
    fn test_frame_draws_skybox_then_cube() {
        let mut renderer = SkyboxRenderer::new(test_config("order", 1));
        let mut backend = DummyBackend::default();
        let mut window = ScriptedWindow::new(2);

        renderer.run(&mut window, &mut backend).unwrap();
        assert!(window.made_current);
        assert_eq!((window.begun, window.ended), (2, 2));
        assert_eq!(renderer.phase(), FramePhase::Terminated);
        assert_eq!(renderer.frames_drawn(), 2);
        assert_eq!(backend.frames_presented(), 2);

        let state = renderer.state.as_ref().unwrap();
        let commands = backend.commands();
        let per_frame = commands.len() / 2;
        let frame = &commands[..per_frame];

        assert_eq!(
            frame[0],
            RecordedCommand::BeginPass {
                color_load: vec![LoadOp::Load],
                depth_load: Some(LoadOp::Clear([1.0, 0.0, 0.0, 0.0])),
                depth_clear_value: Some(1.0),
            }
        );
        assert_eq!(frame.last(), Some(&RecordedCommand::EndPass));

        let pipelines: Vec<RenderPipelineHandle> = frame
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetPipeline(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(pipelines, vec![state.skybox.pipeline, state.cube.pipeline]);

        let draws: Vec<&RecordedCommand> = frame
            .iter()
            .filter(|c| matches!(c, RecordedCommand::DrawIndexed { .. }))
            .collect();
        assert_eq!(draws.len(), 2);
        for draw in draws {
            assert_eq!(
                *draw,
                RecordedCommand::DrawIndexed {
                    indices: 0..36,
                    instances: 0..1
                }
            );
        }
        assert!(frame.contains(&RecordedCommand::SetIndexBuffer {
            buffer: state.mesh.index_buffer,
            format: IndexFormat::Uint16,
        }));
    }

    #[test]
    fn test_frame_writes_matrices() {
        let mut renderer = SkyboxRenderer::new(test_config("matrices", 1));
        let mut backend = DummyBackend::default();
        renderer.prepare(&mut backend).unwrap();
        renderer.draw_frame(&mut backend, 0.25, 2.0).unwrap();

        let expected = FrameMatrices::compute(&demo_camera(0.25, 2.0), &Transform::default());
        let state = renderer.state.as_ref().unwrap();

        let vp = backend.buffer_contents(state.vp.buffer).unwrap();
        let offset = state.vp.offset as usize;
        assert_eq!(&vp[offset..offset + 64], bytemuck::bytes_of(&expected.vp));

        let mvp = backend.buffer_contents(state.mvp.buffer).unwrap();
        let offset = state.mvp.offset as usize;
        assert_eq!(&mvp[offset..offset + 64], bytemuck::bytes_of(&expected.mvp));
    }

    #[test]
    fn test_surface_lost_skips_frame() {
        let mut renderer = SkyboxRenderer::new(test_config("lost", 1));
        let mut backend = DummyBackend::default();
        renderer.prepare(&mut backend).unwrap();

        backend.lose_surface_once();
        renderer.draw_frame(&mut backend, 0.3, 1.0).unwrap();
        assert_eq!(backend.frames_presented(), 0);
        assert_eq!(renderer.phase(), FramePhase::Prepared);

        renderer.draw_frame(&mut backend, 0.3, 1.0).unwrap();
        assert_eq!(backend.frames_presented(), 1);
        assert_eq!(renderer.phase(), FramePhase::Rendering);
    }

    #[test]
    fn test_frame_timeout_keeps_running() {
        let mut renderer = SkyboxRenderer::new(test_config("timeout", 1));
        let mut backend = DummyBackend::default();
        let mut window = ScriptedWindow::new(3);
        renderer.prepare(&mut backend).unwrap();

        backend.time_out_once();
        renderer.run(&mut window, &mut backend).unwrap();
        assert_eq!(window.ended, 3);
        assert_eq!(backend.frames_presented(), 2);
        assert_eq!(renderer.frames_drawn(), 2);
        assert_eq!(renderer.phase(), FramePhase::Terminated);
    }

    /// Screen winding of a triangle under `view`, with the eye at the view origin
    fn view_winding(view: Mat4, tri: [Vec3; 3]) -> FrontFace {
        let [a, b, c] = tri.map(|p| view.transform_point3(p));
        if (b - a).cross(c - a).dot(a) < 0.0 {
            FrontFace::Ccw
        } else {
            FrontFace::Cw
        }
    }

    fn rasterized(state: &PipelineState, winding: FrontFace) -> bool {
        let front = winding == state.front_face;
        match state.cull_mode {
            CullMode::None => true,
            CullMode::Front => !front,
            CullMode::Back => front,
        }
    }

    fn triangles(mesh: &Mesh) -> Vec<([Vec3; 3], Vec3)> {
        mesh.indices
            .chunks(3)
            .map(|tri| {
                let v = |i: usize| mesh.vertices[tri[i] as usize];
                ([v(0).position, v(1).position, v(2).position], v(0).normal)
            })
            .collect()
    }

    #[test]
    fn test_skybox_inside_survives_culling() {
        let camera = demo_camera(crate::window::DEFAULT_FOVY, 4.0 / 3.0);
        let state = skybox_pipeline_state(TextureFormat::Bgra8UnormSrgb);
        let view = camera.rotation_view_matrix();

        for (tri, _) in triangles(&Mesh::cube()) {
            assert!(
                rasterized(&state, view_winding(view, tri)),
                "skybox triangle {tri:?} culled"
            );
        }
    }

    #[test]
    fn test_cube_outward_faces_survive_culling() {
        let camera = demo_camera(crate::window::DEFAULT_FOVY, 4.0 / 3.0);
        let state = cube_pipeline_state(TextureFormat::Bgra8UnormSrgb);
        let model = demo_transform().matrix();
        let view = camera.view_matrix() * model;

        let mut drawn = 0;
        for (tri, normal) in triangles(&Mesh::cube()) {
            let corner = model.transform_point3(tri[0]);
            let faces_eye = normal.dot(camera.position - corner) > 0.0;
            let kept = rasterized(&state, view_winding(view, tri));
            assert_eq!(kept, faces_eye, "triangle {tri:?} with normal {normal}");
            drawn += usize::from(kept);
        }
        // Three faces are visible from the eye
        assert_eq!(drawn, 6);
    }

    #[test]
    fn test_resize_recreates_depth() {
        let mut renderer = SkyboxRenderer::new(test_config("resize", 1));
        let mut backend = DummyBackend::new(640, 480);
        let mut window = ScriptedWindow::new(2);
        window.resize_at = Some((1, (1024, 768)));

        renderer.run(&mut window, &mut backend).unwrap();

        assert_eq!(backend.surface_size(), (1024, 768));
        let state = renderer.state.as_ref().unwrap();
        let depth = backend.texture_descriptor(state.depth.texture).unwrap();
        assert_eq!((depth.width, depth.height), (1024, 768));
        assert_eq!(depth.format, DEPTH_FORMAT);
        // Skybox array and the current depth buffer
        assert_eq!(backend.texture_count(), 2);
    }

    #[test]
    fn test_setup_errors() {
        let mut backend = DummyBackend::default();

        let config = test_config("range", 2).with_skybox(2);
        assert!(matches!(
            SkyboxRenderer::new(config).prepare(&mut backend),
            Err(DemoError::SkyboxOutOfRange { index: 2, count: 2 })
        ));

        let mut config = test_config("missing", 1);
        config.programs.retain(|p| p.name != CUBE_PROGRAM);
        assert!(matches!(
            SkyboxRenderer::new(config).prepare(&mut backend),
            Err(DemoError::MissingProgram(name)) if name == CUBE_PROGRAM
        ));

        let config = test_config("noimage", 1)
            .with_atlases([std::env::temp_dir().join("skybox-demo-engine-absent.png")]);
        assert!(matches!(
            SkyboxRenderer::new(config).prepare(&mut backend),
            Err(DemoError::Image(_))
        ));
    }

    #[test]
    fn test_select_skybox() {
        let mut renderer = SkyboxRenderer::new(test_config("select", 2));
        let mut backend = DummyBackend::default();
        renderer.prepare(&mut backend).unwrap();

        renderer.select_skybox(&mut backend, 1).unwrap();
        assert_eq!(renderer.config().skybox, 1);
        assert!(renderer.select_skybox(&mut backend, 2).is_err());
    }

    #[test]
    fn test_asset_shaders_compile() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let config = DemoConfig::default();
        for program in &config.programs {
            for path in &program.shaders {
                let stage = ShaderStage::from_path(path).unwrap();
                let compiled = compile_file(stage, &root.join(path));
                assert!(compiled.is_ok(), "{path:?}: {:?}", compiled.err());
            }
        }
    }

    #[test]
    fn test_asset_atlases_splice() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let images: Vec<Image> = DemoConfig::default()
            .atlases
            .iter()
            .map(|path| Image::from_file(root.join(path)).unwrap())
            .collect();
        let mut backend = DummyBackend::default();
        let skyboxes = splice_atlases(&mut backend, images).unwrap();
        assert_eq!(skyboxes.layer_count(), 60);
        assert_eq!((skyboxes.face_width, skyboxes.face_height), (128, 128));
    }
}
