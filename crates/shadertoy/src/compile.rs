use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::CacheError;

pub const DEFAULT_TARGET_ENV: &str = "vulkan1.1";

/// Where the external compiler lives and which environment it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    pub glslc: PathBuf,
    pub target_env: String,
}

impl CompilerConfig {
    pub fn new(glslc: impl Into<PathBuf>) -> Self {
        Self {
            glslc: glslc.into(),
            target_env: DEFAULT_TARGET_ENV.to_string(),
        }
    }

    /// Locates `glslc` inside an SDK installation root.
    pub fn from_sdk_root(root: &Path) -> Self {
        let exe = if cfg!(windows) { "glslc.exe" } else { "glslc" };
        Self::new(root.join("bin").join(exe))
    }

    pub fn with_target_env(mut self, target_env: impl Into<String>) -> Self {
        self.target_env = target_env.into();
        self
    }

    pub fn check(&self) -> Result<(), CacheError> {
        if self.glslc.is_file() {
            Ok(())
        } else {
            Err(CacheError::Precondition(format!(
                "shader compiler not found at {}",
                self.glslc.display()
            )))
        }
    }
}

pub trait ShaderCompiler {
    /// Compiles the fragment shader at `source` into `output`.
    fn compile(&self, source: &Path, output: &Path) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
pub struct Glslc {
    config: CompilerConfig,
}

impl Glslc {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, source: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.config.glslc);
        command
            .arg("-fshader-stage=frag")
            .arg("-O")
            .arg(format!("--target-env={}", self.config.target_env))
            .arg("-o")
            .arg(output)
            .arg(source);
        command
    }
}

impl ShaderCompiler for Glslc {
    fn compile(&self, source: &Path, output: &Path) -> Result<(), CacheError> {
        let mut command = self.command(source, output);
        debug!(?command, "invoking shader compiler");
        let result = command.output().map_err(|err| CacheError::Compile {
            path: source.to_path_buf(),
            status: "failed to launch".to_string(),
            stderr: format!("{}: {err}", self.config.glslc.display()),
        })?;
        if result.status.success() {
            return Ok(());
        }
        let mut stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if stderr.is_empty() {
            stderr = String::from_utf8_lossy(&result.stdout).trim().to_string();
        }
        Err(CacheError::Compile {
            path: source.to_path_buf(),
            status: result.status.to_string(),
            stderr,
        })
    }
}

/// True when `binary` exists and was modified strictly after `source`.
pub fn binary_is_current(source: &Path, binary: &Path) -> Result<bool, CacheError> {
    let Ok(binary_meta) = fs::metadata(binary) else {
        return Ok(false);
    };
    let source_mtime = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .map_err(|err| CacheError::io("reading timestamp of", source, err))?;
    let binary_mtime = binary_meta
        .modified()
        .map_err(|err| CacheError::io("reading timestamp of", binary, err))?;
    Ok(source_mtime < binary_mtime)
}
