use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prefix that turns a stream name into the name of its metadata stream.
pub const METADATA_STREAM_PREFIX: &str = "$$";

/// Returns the metadata stream for `stream`.
pub fn metadata_stream_name(stream: &str) -> String {
    format!("{METADATA_STREAM_PREFIX}{stream}")
}

/// Access control lists attached to a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAcl {
    #[serde(rename = "$r", default, skip_serializing_if = "Vec::is_empty")]
    pub read_roles: Vec<String>,

    #[serde(rename = "$w", default, skip_serializing_if = "Vec::is_empty")]
    pub write_roles: Vec<String>,

    #[serde(rename = "$d", default, skip_serializing_if = "Vec::is_empty")]
    pub delete_roles: Vec<String>,

    #[serde(rename = "$mr", default, skip_serializing_if = "Vec::is_empty")]
    pub meta_read_roles: Vec<String>,

    #[serde(rename = "$mw", default, skip_serializing_if = "Vec::is_empty")]
    pub meta_write_roles: Vec<String>,
}

/// Per-stream configuration stored in the stream's metadata stream.
///
/// The reserved `$`-prefixed keys describe retention and access; anything
/// else lands in `custom` and round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Maximum number of events kept in the stream.
    #[serde(rename = "$maxCount", default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u64>,

    /// Maximum age of events kept in the stream, in seconds.
    #[serde(rename = "$maxAge", default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,

    /// Events before this position are considered deleted.
    #[serde(rename = "$tb", default, skip_serializing_if = "Option::is_none")]
    pub truncate_before: Option<u64>,

    /// Cache lifetime hint for readers, in seconds.
    #[serde(rename = "$cacheControl", default, skip_serializing_if = "Option::is_none")]
    pub cache_control_secs: Option<u64>,

    #[serde(rename = "$acl", default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<StreamAcl>,

    /// User-defined properties.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl StreamMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    pub fn truncate_before(mut self, position: u64) -> Self {
        self.truncate_before = Some(position);
        self
    }

    pub fn cache_control_secs(mut self, secs: u64) -> Self {
        self.cache_control_secs = Some(secs);
        self
    }

    pub fn acl(mut self, acl: StreamAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Adds a user-defined property.
    pub fn custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Metadata as currently stored for a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadataResult {
    pub stream: String,

    /// 0-based position of this metadata in the metadata stream.
    pub metastream_version: u64,

    pub metadata: StreamMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_stream_name_prefixes_stream() {
        assert_eq!(metadata_stream_name("orders-Order-42"), "$$orders-Order-42");
    }

    #[test]
    fn metadata_serializes_reserved_keys() {
        let metadata = StreamMetadata::new()
            .max_count(100)
            .acl(StreamAcl {
                read_roles: vec!["$admins".into()],
                ..Default::default()
            })
            .custom("owner", serde_json::json!("billing"));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["$maxCount"], 100);
        assert_eq!(json["$acl"]["$r"][0], "$admins");
        assert_eq!(json["owner"], "billing");
        assert!(json.get("$maxAge").is_none());
    }

    #[test]
    fn metadata_roundtrip_keeps_custom_properties() {
        let metadata = StreamMetadata::new()
            .max_age_secs(3600)
            .custom("tier", serde_json::json!({"level": 2}));

        let bytes = serde_json::to_vec(&metadata).unwrap();
        let restored: StreamMetadata = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, metadata);
    }
}
