use tracing::debug;

use crate::cache::{ensure_dir, write_if_changed, CacheLayout, WriteOutcome};
use crate::descriptor::ShaderDescriptor;
use crate::error::CacheError;

/// Pretty-printed JSON with a trailing newline; stable for a given descriptor.
pub fn render_descriptor(descriptor: &ShaderDescriptor) -> Result<String, CacheError> {
    let mut json = serde_json::to_string_pretty(descriptor).map_err(|err| CacheError::Io {
        context: format!("serializing descriptor {}", descriptor.id()),
        source: err.into(),
    })?;
    json.push('\n');
    Ok(json)
}

/// Writes `<id>.json` into the cache root unless the same bytes are already there.
pub fn persist_descriptor(
    layout: &CacheLayout,
    descriptor: &ShaderDescriptor,
) -> Result<WriteOutcome, CacheError> {
    ensure_dir(layout.root())?;
    let path = layout.descriptor_path(descriptor.id());
    let json = render_descriptor(descriptor)?;
    debug!(path = %path.display(), bytes = json.len(), "persisting descriptor");
    write_if_changed(&path, json.as_bytes())
}
