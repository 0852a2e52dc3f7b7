//! Resource management
//!
//! Handles loading images, splicing them into cube map arrays and building
//! the cube mesh.

mod atlas;
mod mesh;
mod texture;

pub use atlas::*;
pub use mesh::*;
pub use texture::*;
