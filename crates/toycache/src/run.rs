use anyhow::{Context, Result};
use shadertoy::{
    parse_shader_id, CacheError, CacheLayout, Glslc, PipelineError, ShaderCache, ShadertoyClient,
    ShadertoyConfig,
};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::paths::AppPaths;
use crate::settings::Settings;

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = Settings::load_or_default(&paths.config_file())?;
    let cache_root = settings.cache_root(paths.shadertoy_cache_dir())?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        cache_base = %paths.cache_dir().display(),
        cache = %cache_root.display(),
        ?settings,
        "resolved toycache paths"
    );

    let shader_id = parse_shader_id(&cli.shader)?;
    let compiler = settings
        .compiler_config()
        .context("shader compiler is unavailable")?;
    let config = ShadertoyConfig::new(cli.api_key)
        .context("invalid Shadertoy API key configuration")?
        .with_timeout(settings.http_timeout);
    let client = ShadertoyClient::new(config).context("failed to construct Shadertoy client")?;

    tracing::info!(shader = %shader_id, cache = %cache_root.display(), "updating shader cache");
    let compiler = Glslc::new(compiler);
    let cache = ShaderCache::new(CacheLayout::new(cache_root), &client, &compiler);
    let report = cache.update(&shader_id)?;

    let descriptor = cache.layout().descriptor_path(&shader_id);
    if report.is_noop() {
        tracing::info!(path = %descriptor.display(), "cache already up to date");
    } else {
        tracing::info!(
            path = %descriptor.display(),
            downloaded = report.assets.downloaded,
            compiled = report.sources.compiled,
            "shader cached"
        );
    }
    Ok(())
}

/// Maps a failed run onto the process exit status: pipeline failures report
/// their stage, a rejected shader id counts as a fetch failure, and anything
/// else means the environment was not usable.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
        return pipeline.stage.exit_code();
    }
    match err.downcast_ref::<CacheError>() {
        Some(CacheError::Validation(_)) => 1,
        _ => 2,
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
