//! Shader programs
//!
//! GLSL sources are classified by file extension into stages, compiled to
//! naga IR, validated, written out as WGSL and linked into a backend
//! pipeline. The compiled IR is kept on the [`Program`] so uniforms can be
//! looked up by name afterwards.

mod bindings;
mod compiler;
mod program;
mod reflect;

pub use bindings::*;
pub use compiler::*;
pub use program::*;
pub use reflect::*;

use crate::backend::BackendError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shader stage, one per recognised file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::TessControl => "tesc",
            ShaderStage::TessEvaluation => "tese",
            ShaderStage::Geometry => "geom",
            ShaderStage::Fragment => "frag",
            ShaderStage::Compute => "comp",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::TessControl => "tessellation control",
            ShaderStage::TessEvaluation => "tessellation evaluation",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.extension() == extension)
    }

    /// Stage named by the text after the last `.` of `path`
    pub fn from_path(path: &Path) -> Option<Self> {
        let path = path.to_string_lossy();
        let (_, extension) = path.rsplit_once('.')?;
        Self::from_extension(extension)
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens when a single stage fails to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilePolicy {
    /// Log the diagnostic, drop the stage and link what compiled
    #[default]
    Discard,
    /// Abort program creation
    Fatal,
}

/// Shader error type
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Program {program}: {first:?} and {second:?} are both {stage} shaders")]
    DuplicateStage {
        program: String,
        stage: ShaderStage,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Failed to read shader {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to compile {path:?}:\n{log}")]
    CompileFailed { path: PathBuf, log: String },
    #[error("Failed to link program {program}:\n{log}")]
    LinkFailed { program: String, log: String },
    #[error("Program {program} has no uniform named {name}")]
    MissingUniform { program: String, name: String },
    #[error("Uniform {name} is {expected} bytes, got {actual}")]
    UniformSize {
        name: String,
        expected: u32,
        actual: usize,
    },
    #[error("Program {program} needs resource {name}, which was not provided")]
    MissingResource { program: String, name: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Source files of one program, at most one per stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramSources {
    pub stages: Vec<(ShaderStage, PathBuf)>,
}

impl ProgramSources {
    /// Assign each path to its stage.
    ///
    /// Unknown extensions are skipped with a warning. A second file for a
    /// stage is an error, reported before any file is read.
    pub fn classify<P: AsRef<Path>>(program: &str, paths: &[P]) -> Result<Self, ShaderError> {
        let mut stages: Vec<(ShaderStage, PathBuf)> = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let Some(stage) = ShaderStage::from_path(path) else {
                log::warn!("Program {program}: unknown shader type for {path:?}, skipping");
                continue;
            };

            if let Some((_, first)) = stages.iter().find(|(s, _)| *s == stage) {
                return Err(ShaderError::DuplicateStage {
                    program: program.to_string(),
                    stage,
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }
            stages.push((stage, path.to_path_buf()));
        }

        stages.sort_by_key(|(stage, _)| *stage);
        Ok(Self { stages })
    }

    pub fn get(&self, stage: ShaderStage) -> Option<&Path> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, p)| p.as_path())
    }
}
