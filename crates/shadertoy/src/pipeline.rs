//! Runs one shader id through fetch, asset sync, source materialization, and
//! descriptor persistence. Stages run strictly in order and the first error
//! ends the run; each stage is idempotent, so rerunning after a failure is the
//! recovery path.
use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::assets::{AssetSynchronizer, SyncReport};
use crate::cache::{CacheLayout, WriteOutcome};
use crate::compile::ShaderCompiler;
use crate::descriptor::{parse_descriptor, ShaderDescriptor};
use crate::error::CacheError;
use crate::materialize::{MaterializeReport, SourceMaterializer};
use crate::persist::persist_descriptor;
use crate::remote::RemoteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Assets,
    Sources,
    Persist,
}

impl Stage {
    /// Process exit status reported when this stage fails.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Fetch | Self::Assets => 1,
            Self::Sources => 2,
            Self::Persist => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Assets => "asset sync",
            Self::Sources => "shader source",
            Self::Persist => "descriptor persist",
        })
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: CacheError,
}

trait StageResult<T> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageResult<T> for Result<T, CacheError> {
    fn stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub assets: SyncReport,
    pub sources: MaterializeReport,
    pub descriptor: WriteOutcome,
}

impl UpdateReport {
    /// True when the run did not need to touch the cache at all.
    pub fn is_noop(&self) -> bool {
        self.assets.downloaded == 0
            && self.assets.backfilled == 0
            && self.sources.sources_written == 0
            && self.sources.compiled == 0
            && self.descriptor == WriteOutcome::Unchanged
    }
}

pub struct ShaderCache<'a> {
    layout: CacheLayout,
    remote: &'a dyn RemoteSource,
    compiler: &'a dyn ShaderCompiler,
}

impl<'a> ShaderCache<'a> {
    pub fn new(
        layout: CacheLayout,
        remote: &'a dyn RemoteSource,
        compiler: &'a dyn ShaderCompiler,
    ) -> Self {
        Self {
            layout,
            remote,
            compiler,
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn fetch(&self, shader_id: &str) -> Result<ShaderDescriptor, CacheError> {
        let body = self.remote.fetch_descriptor(shader_id)?;
        parse_descriptor(&body)
    }

    pub fn update(&self, shader_id: &str) -> Result<UpdateReport, PipelineError> {
        let mut descriptor = self.fetch(shader_id).stage(Stage::Fetch)?;
        info!(
            shader = descriptor.id(),
            passes = descriptor.render_passes().len(),
            "fetched shader descriptor"
        );

        let assets = AssetSynchronizer::new(self.remote, &self.layout)
            .sync(&mut descriptor)
            .stage(Stage::Assets)?;
        info!(
            downloaded = assets.downloaded,
            reused = assets.reused,
            backfilled = assets.backfilled,
            "media synchronized"
        );

        let sources = SourceMaterializer::new(&self.layout, self.compiler)
            .materialize(&mut descriptor)
            .stage(Stage::Sources)?;
        info!(
            written = sources.sources_written,
            compiled = sources.compiled,
            "shader sources materialized"
        );

        let outcome = persist_descriptor(&self.layout, &descriptor).stage(Stage::Persist)?;
        Ok(UpdateReport {
            assets,
            sources,
            descriptor: outcome,
        })
    }
}
