use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the client-side session is persisted. Differentiated via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq, Eq, Default)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Shared in-process map; every handle is a separate "tab".
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// JSON key/value file on disk.
    #[serde(rename = "file")]
    File(FileStorageConfig),
    /// Persistence disabled.
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq, Eq)]
pub struct FileStorageConfig {
    pub path: PathBuf,
}
