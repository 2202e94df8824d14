use std::sync::Arc;

use models::name::PreferenceName;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::StorageError;
use crate::storage::StorageBackend;

/// Content handed to `PreferenceDocument::write`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentContent {
    /// Stored verbatim.
    Text(String),
    /// Serialized to compact JSON first; a JSON string is stored verbatim.
    Structured(serde_json::Value),
}

impl DocumentContent {
    pub fn into_text(self) -> Result<String, StorageError> {
        match self {
            Self::Text(text) | Self::Structured(serde_json::Value::String(text)) => Ok(text),
            Self::Structured(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<String> for DocumentContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for DocumentContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for DocumentContent {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Named document bound to the backend of the current process.
///
/// Holds no state besides the name and the backend handle; concurrent
/// writers to the same name are not coordinated here.
#[derive(Clone)]
pub struct PreferenceDocument {
    name: PreferenceName,
    backend: Arc<dyn StorageBackend>,
}

impl PreferenceDocument {
    pub fn new<I, S>(backend: Arc<dyn StorageBackend>, segments: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = PreferenceName::from_segments(segments)?;
        Ok(Self { name, backend })
    }

    pub fn name(&self) -> &PreferenceName {
        &self.name
    }

    /// Raw document text.
    pub async fn read(&self) -> Result<String, StorageError> {
        self.backend.read(&self.name).await
    }

    pub async fn write(&self, content: impl Into<DocumentContent>) -> Result<(), StorageError> {
        let text = content.into().into_text()?;
        self.backend.write(&self.name, &text).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        let text = self.read().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Always stores the JSON encoding, so `read_json` gets back what was
    /// written even when `value` is a string.
    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value)?;
        self.backend.write(&self.name, &text).await
    }
}
