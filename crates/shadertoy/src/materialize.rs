//! Generates and compiles one fragment shader per render pass.
//!
//! Sources are rewritten only when their hash changes; binaries are rebuilt
//! when missing or not newer than their source. The first compiler failure
//! stops the stage, and a pass only gains `local_binary` once its binary is
//! known good.
use tracing::{debug, info};

use crate::cache::{ensure_dir, write_if_changed, CacheLayout, WriteOutcome};
use crate::compile::{binary_is_current, ShaderCompiler};
use crate::descriptor::ShaderDescriptor;
use crate::error::CacheError;
use crate::source::{generate_source, infer_sampler_types};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeReport {
    pub sources_written: usize,
    pub sources_unchanged: usize,
    pub compiled: usize,
    pub binaries_current: usize,
}

pub struct SourceMaterializer<'a> {
    layout: &'a CacheLayout,
    compiler: &'a dyn ShaderCompiler,
}

impl<'a> SourceMaterializer<'a> {
    pub fn new(layout: &'a CacheLayout, compiler: &'a dyn ShaderCompiler) -> Self {
        Self { layout, compiler }
    }

    pub fn materialize(
        &self,
        descriptor: &mut ShaderDescriptor,
    ) -> Result<MaterializeReport, CacheError> {
        ensure_dir(&self.layout.shaders_dir())?;
        let shader_id = descriptor.shader.info.id.clone();
        let mut report = MaterializeReport::default();

        for (index, pass) in descriptor.shader.render_passes.iter_mut().enumerate() {
            let samplers = infer_sampler_types(&pass.inputs);
            let code = generate_source(&samplers, &pass.code);

            let source_rel = self.layout.source_relative(&shader_id, index);
            let source_path = self.layout.resolve(&source_rel);
            match write_if_changed(&source_path, code.as_bytes())? {
                WriteOutcome::Written => report.sources_written += 1,
                WriteOutcome::Unchanged => report.sources_unchanged += 1,
            }
            pass.local_source = Some(source_rel);

            let binary_rel = self.layout.binary_relative(&shader_id, index);
            let binary_path = self.layout.resolve(&binary_rel);
            if binary_is_current(&source_path, &binary_path)? {
                debug!(path = %binary_path.display(), "exists and is newer; skipping compilation");
                report.binaries_current += 1;
            } else {
                self.compiler.compile(&source_path, &binary_path)?;
                info!(
                    source = %source_path.display(),
                    binary = %binary_path.display(),
                    "compiled"
                );
                report.compiled += 1;
            }
            pass.local_binary = Some(binary_rel);
        }

        Ok(report)
    }
}
