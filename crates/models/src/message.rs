use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Topic carrying requests from unprivileged processes to the host.
pub const REQUEST_TOPIC: &str = "preferences:request";
/// Topic carrying tagged replies back.
pub const RESPONSE_TOPIC: &str = "preferences:response";

/// Operation tag of a message. Unknown tags are kept verbatim so the host
/// can echo them back in its error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Read,
    Write,
    Error,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Error => "error",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "read" => Self::Read,
            "write" => Self::Write,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        match value {
            Operation::Other(tag) => tag,
            op => op.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub id: String,
    pub operation: Operation,
    /// Validated by the host, never trusted as a path.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ProxyRequest {
    pub fn read(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), operation: Operation::Read, name: name.into(), content: None }
    }

    pub fn write(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: Operation::Write,
            name: name.into(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub id: String,
    pub operation: Operation,
    /// Document text for `read`, the reason for `error`, absent for `write`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ProxyResponse {
    pub fn read(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), operation: Operation::Read, content: Some(content.into()) }
    }

    pub fn written(id: impl Into<String>) -> Self {
        Self { id: id.into(), operation: Operation::Write, content: None }
    }

    pub fn error(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { id: id.into(), operation: Operation::Error, content: Some(reason.into()) }
    }

    pub fn invalid_request(id: impl Into<String>, operation: &Operation) -> Self {
        Self::error(id, format!("Invalid request: {operation}"))
    }
}

/// One frame on the wire: a payload tagged with its topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn wrap<T: Serialize>(topic: &str, payload: &T) -> Result<Self, ModelError> {
        Ok(Self { topic: topic.to_string(), payload: serde_json::to_value(payload)? })
    }

    /// The payload's `id` when it is a string, even if the rest of the
    /// payload does not parse.
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get("id")?.as_str()
    }

    pub fn unwrap_as<T: DeserializeOwned>(self) -> Result<T, ModelError> {
        Ok(serde_json::from_value(self.payload)?)
    }

    pub fn encode_line(&self) -> Result<String, ModelError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode_line(line: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
