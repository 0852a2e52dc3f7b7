//! Backend abstraction layer
//!
//! Provides common traits and types implemented by the wgpu backend and by
//! the recording dummy backend used in tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
