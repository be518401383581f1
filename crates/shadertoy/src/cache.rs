//! Owns the on-disk layout of the cache root and the content-addressed write
//! used for generated files. Every path stored in a descriptor is produced here
//! as a `/`-separated string relative to the root, so the cached JSON does not
//! depend on the host platform.
//!
//! Layout:
//!
//! - `media/` holds downloaded assets under their remote file names and
//!   nothing else, since any remote name may land there.
//! - `.records/` holds one integrity record per media file.
//! - `shaders/` holds `<id>_<pass>.frag` sources and their `.spv` siblings.
//! - `<id>.json` is the annotated descriptor for each processed shader.
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::CacheError;

pub const MEDIA_DIR: &str = "media";
pub const RECORDS_DIR: &str = ".records";
pub const SHADERS_DIR: &str = "shaders";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Unchanged,
    Written,
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_DIR)
    }

    pub fn shaders_dir(&self) -> PathBuf {
        self.root.join(SHADERS_DIR)
    }

    pub fn media_relative(&self, file_name: &str) -> String {
        format!("{MEDIA_DIR}/{file_name}")
    }

    pub fn record_path(&self, file_name: &str) -> PathBuf {
        self.records_dir().join(format!("{file_name}.json"))
    }

    pub fn source_relative(&self, shader_id: &str, pass_index: usize) -> String {
        format!("{SHADERS_DIR}/{shader_id}_{pass_index}.frag")
    }

    pub fn binary_relative(&self, shader_id: &str, pass_index: usize) -> String {
        format!("{}.spv", self.source_relative(shader_id, pass_index))
    }

    pub fn descriptor_path(&self, shader_id: &str) -> PathBuf {
        self.root.join(format!("{shader_id}.json"))
    }

    /// Resolves a root-relative path produced by this layout.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), CacheError> {
    fs::create_dir_all(path).map_err(|err| CacheError::io("creating directory", path, err))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Sibling path used while a file is being replaced.
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Writes `bytes` to `path` unless the existing file already hashes the same.
/// Replacement goes through a sibling file and a rename so readers never see a
/// half-written file.
pub fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<WriteOutcome, CacheError> {
    if path.is_file() {
        let existing =
            sha256_file(path).map_err(|err| CacheError::io("hashing", path, err))?;
        if existing == sha256_hex(bytes) {
            debug!(path = %path.display(), "exists; skipping");
            return Ok(WriteOutcome::Unchanged);
        }
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let staging = partial_path(path);
    fs::write(&staging, bytes).map_err(|err| CacheError::io("writing", &staging, err))?;
    fs::rename(&staging, path).map_err(|err| CacheError::io("replacing", path, err))?;
    info!(path = %path.display(), "saved");
    Ok(WriteOutcome::Written)
}
