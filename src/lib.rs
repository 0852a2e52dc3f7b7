//! Skybox Demo - a textured cube in front of a cube map array skybox
//!
//! The skybox texture is spliced from cross-layout atlas images, one cube
//! map per atlas, and both the skybox and the cube are drawn with GLSL
//! programs compiled through naga and rendered with wgpu.
//!
//! # Layout
//! - [`backend`]: the `GraphicsBackend` trait, the wgpu backend and a
//!   recording dummy backend
//! - [`resources`]: image loading, atlas splicing and the cube mesh
//! - [`shader`]: stage classification, compilation, linking and uniform
//!   reflection
//! - [`scene`]: per-frame matrices
//! - [`window`]: the `RenderWindow` trait and a winit window
//! - [`engine`]: the frame driver

pub mod backend;
pub mod engine;
pub mod error;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod window;

pub use engine::{run, FramePhase, SkyboxRenderer};
pub use error::{DemoError, DemoResult};
pub use shader::CompilePolicy;
pub use window::{AppWindow, RenderWindow};

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

use std::path::PathBuf;

/// Number of atlases shipped in `assets/textures`
pub const DEFAULT_ATLAS_COUNT: usize = 10;

/// Name of the program drawing the skybox
pub const SKYBOX_PROGRAM: &str = "skybox";
/// Name of the program drawing the cube
pub const CUBE_PROGRAM: &str = "cubeobj";

/// Shader files making up one program
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramConfig {
    pub name: String,
    pub shaders: Vec<PathBuf>,
}

impl ProgramConfig {
    pub fn new<I, P>(name: &str, shaders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.to_string(),
            shaders: shaders.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration for running the demo
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Vertical field of view reported by the window, in radians
    pub fovy: f32,
    /// Atlas images, one cube map each
    pub atlases: Vec<PathBuf>,
    /// Programs to build; must include the skybox and cube programs
    pub programs: Vec<ProgramConfig>,
    /// Which cube map of the array the skybox shows
    pub skybox: u32,
    /// What to do when a shader stage fails to compile
    pub compile_policy: CompilePolicy,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Cube Map Array Skybox".to_string(),
            width: 800,
            height: 600,
            vsync: true,
            fovy: window::DEFAULT_FOVY,
            atlases: (0..DEFAULT_ATLAS_COUNT)
                .map(|i| PathBuf::from(format!("assets/textures/cubebox-{i}.png")))
                .collect(),
            programs: vec![
                ProgramConfig::new(
                    SKYBOX_PROGRAM,
                    ["assets/shaders/skybox.vert", "assets/shaders/skybox.frag"],
                ),
                ProgramConfig::new(
                    CUBE_PROGRAM,
                    ["assets/shaders/cubeobj.vert", "assets/shaders/cubeobj.frag"],
                ),
            ],
            skybox: 0,
            compile_policy: CompilePolicy::default(),
        }
    }
}

impl DemoConfig {
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_fovy(mut self, fovy: f32) -> Self {
        self.fovy = fovy;
        self
    }

    pub fn with_atlases<I, P>(mut self, atlases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.atlases = atlases.into_iter().map(Into::into).collect();
        self
    }

    /// Add a program, replacing any existing program of the same name
    pub fn with_program(mut self, program: ProgramConfig) -> Self {
        self.programs.retain(|p| p.name != program.name);
        self.programs.push(program);
        self
    }

    pub fn with_skybox(mut self, skybox: u32) -> Self {
        self.skybox = skybox;
        self
    }

    pub fn with_compile_policy(mut self, policy: CompilePolicy) -> Self {
        self.compile_policy = policy;
        self
    }

    pub fn program(&self, name: &str) -> Option<&ProgramConfig> {
        self.programs.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_assets() {
        let config = DemoConfig::default();
        assert_eq!(config.atlases.len(), 10);
        assert_eq!(
            config.atlases[9],
            PathBuf::from("assets/textures/cubebox-9.png")
        );
        let skybox = config.program(SKYBOX_PROGRAM).unwrap();
        assert_eq!(skybox.shaders.len(), 2);
        assert!(config.program(CUBE_PROGRAM).is_some());
        assert!((config.fovy.to_degrees() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_with_program_replaces() {
        let config = DemoConfig::default()
            .with_program(ProgramConfig::new(CUBE_PROGRAM, ["a.vert"]))
            .with_skybox(3);
        assert_eq!(config.programs.len(), 2);
        assert_eq!(
            config.program(CUBE_PROGRAM).unwrap().shaders,
            vec![PathBuf::from("a.vert")]
        );
        assert_eq!(config.skybox, 3);
    }
}
