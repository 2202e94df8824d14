use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Root-relative address of one preference document, e.g. `settings/global.json`.
///
/// Always normalised to `/`-separated segments, none of which may be empty,
/// `.`, `..` or carry a separator or drive prefix, so `resolve` never leaves
/// the root it is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreferenceName(String);

impl PreferenceName {
    /// Join one or more segments; each may itself contain `/`.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = Vec::new();
        let mut raw = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if !raw.is_empty() {
                raw.push('/');
            }
            raw.push_str(segment);
            if segment.starts_with('/') {
                return Err(ModelError::invalid_name(segment, "absolute paths are not allowed"));
            }
            for part in segment.split('/') {
                validate_part(segment, part)?;
                parts.push(part.to_string());
            }
        }
        if parts.is_empty() {
            return Err(ModelError::invalid_name(&raw, "at least one segment is required"));
        }
        Ok(Self(parts.join("/")))
    }

    pub fn parse(name: &str) -> Result<Self, ModelError> {
        Self::from_segments([name])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Absolute location of the document under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |path, part| path.join(part))
    }
}

fn validate_part(segment: &str, part: &str) -> Result<(), ModelError> {
    if part.is_empty() {
        return Err(ModelError::invalid_name(segment, "empty path segment"));
    }
    if part == "." || part == ".." {
        return Err(ModelError::invalid_name(segment, "relative segments are not allowed"));
    }
    if part.contains('\\') || part.contains(':') {
        return Err(ModelError::invalid_name(segment, "separators and drive prefixes are not allowed"));
    }
    if part.contains('\0') {
        return Err(ModelError::invalid_name(segment, "NUL byte in segment"));
    }
    Ok(())
}

impl fmt::Display for PreferenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PreferenceName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PreferenceName> for String {
    fn from(value: PreferenceName) -> Self {
        value.0
    }
}
