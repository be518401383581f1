//! Local cache of Shadertoy shaders: descriptors, media, generated GLSL and
//! compiled SPIR-V, laid out so a renderer can load everything offline.
mod assets;
mod cache;
mod compile;
mod descriptor;
mod error;
mod handle;
mod materialize;
mod persist;
mod pipeline;
mod remote;
mod source;

#[cfg(test)]
mod test_support;

pub use assets::{
    cubemap_face_names, AssetRecord, AssetStatus, AssetSynchronizer, SyncReport,
    CUBE_FACE_SUFFIXES,
};
pub use cache::{
    ensure_dir, sha256_file, sha256_hex, write_if_changed, CacheLayout, WriteOutcome, MEDIA_DIR,
    RECORDS_DIR, SHADERS_DIR,
};
pub use compile::{
    binary_is_current, CompilerConfig, Glslc, ShaderCompiler, DEFAULT_TARGET_ENV,
};
pub use descriptor::{
    parse_descriptor, ChannelType, LocalSource, RenderInput, RenderPass, Shader,
    ShaderDescriptor, ShaderInfo, CHANNEL_COUNT, MEDIA_PREFIX, SUPPORTED_VERSION,
};
pub use error::CacheError;
pub use handle::{parse_shader_id, validate_shader_id};
pub use materialize::{MaterializeReport, SourceMaterializer};
pub use persist::{persist_descriptor, render_descriptor};
pub use pipeline::{PipelineError, ShaderCache, Stage, UpdateReport};
pub use remote::{RemoteAsset, RemoteSource, ShadertoyClient, ShadertoyConfig};
pub use source::{generate_source, infer_sampler_types, shader_header, SamplerType};
