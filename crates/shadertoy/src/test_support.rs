//! In-memory stand-ins for the Shadertoy service and the shader compiler.
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use crate::compile::ShaderCompiler;
use crate::descriptor::MEDIA_PREFIX;
use crate::error::CacheError;
use crate::remote::{RemoteAsset, RemoteSource};

pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Descriptor body with one render pass per entry of `pass_inputs`, each a
/// JSON array of inputs.
pub fn descriptor_json(id: &str, pass_inputs: &[&str]) -> String {
    let passes = pass_inputs
        .iter()
        .enumerate()
        .map(|(index, inputs)| {
            format!(
                r#"{{ "name": "Pass {index}", "type": "image", "inputs": {inputs}, "outputs": [],
                     "code": "void mainImage(out vec4 c, in vec2 p) {{ c = vec4({index}.0); }}" }}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"{{ "Shader": {{ "ver": "0.1", "info": {{ "id": "{id}", "name": "Test" }}, "renderpass": [{passes}] }} }}"#
    )
}

#[derive(Clone)]
struct MediaEntry {
    bytes: Vec<u8>,
    content_length: Option<u64>,
    etag: Option<String>,
}

#[derive(Default)]
pub struct FakeRemote {
    descriptors: HashMap<String, String>,
    media: HashMap<String, MediaEntry>,
    failing: Vec<String>,
    requests: RefCell<Vec<String>>,
    downloads: Rc<RefCell<Vec<String>>>,
}

impl FakeRemote {
    pub fn with_descriptor(mut self, id: &str, body: impl Into<String>) -> Self {
        self.descriptors.insert(id.to_string(), body.into());
        self
    }

    pub fn with_media(self, name: &str, bytes: &[u8]) -> Self {
        let len = bytes.len() as u64;
        self.insert(name, bytes, Some(len), None)
    }

    pub fn with_media_etag(self, name: &str, bytes: &[u8], etag: &str) -> Self {
        let len = bytes.len() as u64;
        self.insert(name, bytes, Some(len), Some(etag.to_string()))
    }

    pub fn with_media_length(self, name: &str, bytes: &[u8], content_length: u64) -> Self {
        self.insert(name, bytes, Some(content_length), None)
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(format!("{MEDIA_PREFIX}{name}"));
        self
    }

    fn insert(
        mut self,
        name: &str,
        bytes: &[u8],
        content_length: Option<u64>,
        etag: Option<String>,
    ) -> Self {
        self.media.insert(
            format!("{MEDIA_PREFIX}{name}"),
            MediaEntry {
                bytes: bytes.to_vec(),
                content_length,
                etag,
            },
        );
        self
    }

    /// Every media path that was requested, read or not.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Media paths whose bodies were actually read.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl RemoteSource for FakeRemote {
    fn fetch_descriptor(&self, shader_id: &str) -> Result<String, CacheError> {
        self.descriptors
            .get(shader_id)
            .cloned()
            .ok_or_else(|| CacheError::transport(shader_id, "HTTP status 404 Not Found"))
    }

    fn open_media(&self, path: &str) -> Result<RemoteAsset, CacheError> {
        self.requests.borrow_mut().push(path.to_string());
        if self.failing.iter().any(|failing| failing == path) {
            return Err(CacheError::transport(path, "HTTP status 500 Internal Server Error"));
        }
        let entry = self
            .media
            .get(path)
            .cloned()
            .ok_or_else(|| CacheError::transport(path, "HTTP status 404 Not Found"))?;
        Ok(RemoteAsset {
            url: path.to_string(),
            content_length: entry.content_length,
            etag: entry.etag,
            body: Box::new(TrackedBody {
                path: path.to_string(),
                data: Cursor::new(entry.bytes),
                log: Rc::clone(&self.downloads),
                logged: false,
            }),
        })
    }
}

struct TrackedBody {
    path: String,
    data: Cursor<Vec<u8>>,
    log: Rc<RefCell<Vec<String>>>,
    logged: bool,
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.logged {
            self.logged = true;
            self.log.borrow_mut().push(self.path.clone());
        }
        self.data.read(buf)
    }
}

/// Writes a stub binary stamped one second after its source so freshness
/// checks are stable on coarse-timestamp filesystems.
#[derive(Default)]
pub struct FakeCompiler {
    fail_on: Option<String>,
    invocations: RefCell<Vec<PathBuf>>,
}

impl FakeCompiler {
    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            invocations: RefCell::default(),
        }
    }

    pub fn invocations(&self) -> Vec<PathBuf> {
        self.invocations.borrow().clone()
    }
}

impl ShaderCompiler for FakeCompiler {
    fn compile(&self, source: &Path, output: &Path) -> Result<(), CacheError> {
        self.invocations.borrow_mut().push(source.to_path_buf());
        let name = source.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.fail_on.as_deref() == Some(name) {
            return Err(CacheError::Compile {
                path: source.to_path_buf(),
                status: "exit status: 1".into(),
                stderr: "ERROR: syntax error".into(),
            });
        }
        fs::write(output, b"\x03\x02\x23\x07").unwrap();
        let source_mtime = fs::metadata(source).unwrap().modified().unwrap();
        set_mtime(output, source_mtime + Duration::from_secs(1));
        Ok(())
    }
}
