use serde::Deserialize;

/// Read size used by the transfer loop when nothing else is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Substituted when the content type of a file cannot be guessed.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Tunables for serving media files.
///
/// Missing fields take their defaults when deserialized, so an embedding
/// application can nest this in its own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Upper bound on the bytes read per chunk. Zero is treated as one.
    pub buffer_size: usize,
    pub default_content_type: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            default_content_type: OCTET_STREAM.to_string(),
        }
    }
}

impl ServeConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, DEFAULT_BUFFER_SIZE, OCTET_STREAM};

    #[test]
    fn test_defaults() {
        let config = ServeConfig::default();
        assert_eq!(DEFAULT_BUFFER_SIZE, config.buffer_size);
        assert_eq!(OCTET_STREAM, config.default_content_type);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServeConfig = serde_json::from_str(r#"{ "buffer_size": 65536 }"#).unwrap();
        assert_eq!(ServeConfig::default().with_buffer_size(65536), config);

        let config: ServeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(ServeConfig::default(), config);
    }
}
