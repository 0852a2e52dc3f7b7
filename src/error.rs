//! Demo error types.

use crate::backend::BackendError;
use crate::resources::{AtlasError, ImageLoadError};
use crate::shader::ShaderError;
use crate::window::WindowError;
use thiserror::Error;

/// Any error that stops the demo
#[derive(Error, Debug)]
pub enum DemoError {
    #[error(transparent)]
    Image(#[from] ImageLoadError),
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("No program named {0} is configured")]
    MissingProgram(String),
    #[error("Skybox {index} selected, but only {count} were loaded")]
    SkyboxOutOfRange { index: u32, count: u32 },
    #[error("Frame drawn before the renderer was prepared")]
    NotPrepared,
}

pub type DemoResult<T> = Result<T, DemoError>;
