//! GLSL to WGSL compilation through naga

use super::{ShaderError, ShaderStage};
use std::path::{Path, PathBuf};

/// Name naga gives the entry point of a GLSL stage
pub const ENTRY_POINT: &str = "main";

/// A successfully compiled stage
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub path: PathBuf,
    pub module: naga::Module,
    pub info: naga::valid::ModuleInfo,
    pub wgsl: String,
}

fn naga_stage(stage: ShaderStage) -> Result<naga::ShaderStage, String> {
    match stage {
        ShaderStage::Vertex => Ok(naga::ShaderStage::Vertex),
        ShaderStage::Fragment => Ok(naga::ShaderStage::Fragment),
        ShaderStage::Compute => Ok(naga::ShaderStage::Compute),
        ShaderStage::TessControl | ShaderStage::TessEvaluation | ShaderStage::Geometry => {
            Err(format!("{stage} shaders are not supported by the wgpu backend"))
        }
    }
}

/// Parse, validate and translate one GLSL stage.
///
/// The error string is the full diagnostic log.
pub fn compile_glsl(
    source: &str,
    stage: ShaderStage,
) -> Result<(naga::Module, naga::valid::ModuleInfo, String), String> {
    let options = naga::front::glsl::Options {
        stage: naga_stage(stage)?,
        defines: naga::FastHashMap::default(),
    };

    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| format!("GLSL parse error:\n{errors}"))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| format!("Validation error: {e}"))?;

    let wgsl = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
        .map_err(|e| format!("WGSL generation error: {e}"))?;

    Ok((module, info, wgsl))
}

/// Read and compile the stage at `path`
pub fn compile_file(stage: ShaderStage, path: &Path) -> Result<CompiledStage, ShaderError> {
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (module, info, wgsl) =
        compile_glsl(&source, stage).map_err(|log| ShaderError::CompileFailed {
            path: path.to_path_buf(),
            log,
        })?;

    log::debug!("Compiled {stage} shader {path:?}");

    Ok(CompiledStage {
        stage,
        path: path.to_path_buf(),
        module,
        info,
        wgsl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"#version 450

layout(set = 0, binding = 0) uniform ObjectUniforms {
    mat4 mvp;
};

layout(location = 0) in vec3 position;

void main() {
    gl_Position = mvp * vec4(position, 1.0);
}
"#;

    #[test]
    fn test_compile_vertex() {
        let (module, _, wgsl) = compile_glsl(VERTEX, ShaderStage::Vertex).unwrap();
        assert_eq!(module.entry_points.len(), 1);
        assert_eq!(module.entry_points[0].name, ENTRY_POINT);
        assert!(wgsl.contains("@vertex"));
    }

    #[test]
    fn test_compile_error_has_log() {
        let log = compile_glsl("#version 450\nvoid main() { nope(); }\n", ShaderStage::Fragment)
            .unwrap_err();
        assert!(log.starts_with("GLSL parse error"), "{log}");
    }

    #[test]
    fn test_geometry_unsupported() {
        let log = compile_glsl("#version 450\nvoid main() {}\n", ShaderStage::Geometry).unwrap_err();
        assert!(log.contains("geometry"));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("skybox-demo-missing.vert");
        let err = compile_file(ShaderStage::Vertex, &path).unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
    }
}
