use crate::error::CacheError;

/// Extracts a bare shader id from `Xs23DR`, `shadertoy://Xs23DR`, or a
/// `https://www.shadertoy.com/view/Xs23DR` style URL.
pub fn parse_shader_id(input: &str) -> Result<String, CacheError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CacheError::validation("shader id must not be empty"));
    }

    let id = if let Some(rest) = trimmed.strip_prefix("shadertoy://") {
        rest.trim()
    } else if trimmed.contains("shadertoy.com") {
        trimmed
            .split(&['?', '#'][..])
            .next()
            .unwrap_or(trimmed)
            .split('/')
            .rev()
            .find(|segment| !segment.is_empty())
            .unwrap_or_default()
    } else {
        trimmed
    };

    validate_shader_id(id)?;
    Ok(id.to_string())
}

/// Shader ids become file names in the cache root, so only a conservative
/// character set is accepted.
pub fn validate_shader_id(id: &str) -> Result<(), CacheError> {
    if id.is_empty() {
        return Err(CacheError::validation("shader id must not be empty"));
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(CacheError::validation(format!(
            "shader id '{id}' contains unsupported characters"
        )));
    }
    Ok(())
}
