use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid preference name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_name(name: &str, reason: &'static str) -> Self {
        Self::InvalidName { name: name.to_string(), reason }
    }
}
