//! Defines the shader descriptor returned by the Shadertoy API and persisted in
//! the cache root once every stage has annotated it with local paths. Fields
//! this crate does not interpret are kept in ordered side maps so the cached
//! JSON stays a faithful copy of the remote document.
//!
//! Types:
//!
//! - `ShaderDescriptor` is the API root (`{"Shader": {...}}`).
//! - `Shader`, `ShaderInfo`, `RenderPass`, and `RenderInput` mirror the nested
//!   objects; `RenderPass` and `RenderInput` gain `local_*` annotations.
//! - `ChannelType` classifies the `ctype` strings the cache knows how to fetch.
//! - `LocalSource` records one media path, or six for cubemaps.
//!
//! Functions:
//!
//! - `parse_descriptor` decodes an API body and rejects error payloads and
//!   unsupported format versions.
//! - `ShaderDescriptor::validate` checks the invariants later stages rely on.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CacheError;
use crate::handle::validate_shader_id;

/// Descriptor format version this crate understands.
pub const SUPPORTED_VERSION: &str = "0.1";

/// Every media resource must live directly under this remote directory.
pub const MEDIA_PREFIX: &str = "/media/a/";

pub const CHANNEL_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderDescriptor {
    #[serde(rename = "Shader")]
    pub shader: Shader,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shader {
    pub ver: String,
    pub info: ShaderInfo,
    #[serde(rename = "renderpass", default)]
    pub render_passes: Vec<RenderPass>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderInfo {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPass {
    pub code: String,
    #[serde(default)]
    pub inputs: Vec<RenderInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_binary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    pub channel: u8,
    pub ctype: String,
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_src: Option<LocalSource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Texture,
    Cubemap,
    /// Audio rendered into a 2D texture by the player.
    Music,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalSource {
    Single(String),
    CubeFaces([String; 6]),
}

impl ChannelType {
    pub fn parse(ctype: &str) -> Option<Self> {
        match ctype {
            "texture" => Some(Self::Texture),
            "cubemap" => Some(Self::Cubemap),
            "music" => Some(Self::Music),
            _ => None,
        }
    }
}

impl RenderInput {
    pub fn channel_type(&self) -> Option<ChannelType> {
        ChannelType::parse(&self.ctype)
    }

    /// File name of the resource inside the flat media directory.
    pub fn media_file_name(&self) -> Result<&str, CacheError> {
        let name = self.src.strip_prefix(MEDIA_PREFIX).ok_or_else(|| {
            CacheError::validation(format!(
                "channel {} has src path outside {} ('{}')",
                self.channel, MEDIA_PREFIX, self.src
            ))
        })?;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(CacheError::validation(format!(
                "channel {} has src path without a plain file name ('{}')",
                self.channel, self.src
            )));
        }
        Ok(name)
    }
}

impl ShaderDescriptor {
    pub fn id(&self) -> &str {
        &self.shader.info.id
    }

    pub fn render_passes(&self) -> &[RenderPass] {
        &self.shader.render_passes
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.shader.ver != SUPPORTED_VERSION {
            return Err(CacheError::validation(format!(
                "unexpected shader version '{}' (only {SUPPORTED_VERSION} is supported)",
                self.shader.ver
            )));
        }
        validate_shader_id(self.id())?;

        for (index, pass) in self.shader.render_passes.iter().enumerate() {
            let mut seen = HashSet::new();
            for input in &pass.inputs {
                if usize::from(input.channel) >= CHANNEL_COUNT {
                    return Err(CacheError::validation(format!(
                        "render pass {index} uses channel {} which exceeds the Shadertoy limit",
                        input.channel
                    )));
                }
                if !seen.insert(input.channel) {
                    return Err(CacheError::validation(format!(
                        "render pass {index} binds channel {} more than once",
                        input.channel
                    )));
                }
                if input.channel_type().is_none() {
                    return Err(CacheError::validation(format!(
                        "render pass {index} channel {} has unsupported input type '{}'",
                        input.channel, input.ctype
                    )));
                }
                input.media_file_name()?;
            }
        }
        Ok(())
    }
}

/// Decodes an API response body into a validated descriptor.
pub fn parse_descriptor(body: &str) -> Result<ShaderDescriptor, CacheError> {
    let root: Value = serde_json::from_str(body).map_err(|err| {
        let snippet = body.chars().take(200).collect::<String>();
        CacheError::validation(format!(
            "response is not JSON ({err}); first 200 bytes: {snippet}"
        ))
    })?;

    let Some(object) = root.as_object() else {
        return Err(CacheError::validation("response is not a JSON object"));
    };
    if let Some(error) = object.get("Error") {
        let message = error
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(CacheError::validation(format!("Shadertoy says: {message}")));
    }
    let Some(shader) = object.get("Shader") else {
        return Err(CacheError::validation("missing 'Shader' key in JSON"));
    };
    match shader.get("ver").and_then(Value::as_str) {
        Some(SUPPORTED_VERSION) => {}
        Some(other) => {
            return Err(CacheError::validation(format!(
                "unexpected shader version '{other}' (only {SUPPORTED_VERSION} is supported)"
            )))
        }
        None => return Err(CacheError::validation("shader is missing its 'ver' field")),
    }

    let descriptor: ShaderDescriptor = serde_json::from_value(root)
        .map_err(|err| CacheError::validation(format!("unexpected descriptor shape: {err}")))?;
    descriptor.validate()?;
    Ok(descriptor)
}
