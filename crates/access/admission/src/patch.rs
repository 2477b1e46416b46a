//! JSON patch (RFC 6902) subset
//!
//! Admission only ever emits `add`, `replace` and `remove` against object
//! members, so that is all [`apply_patch`] supports.

use crate::error::{AdmissionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
        }
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Split `/a/b/c` into the parent pointer tokens and the last member name
fn split_path(path: &str) -> Result<(Vec<String>, String)> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| AdmissionError::Patch(format!("path {:?} must start with '/'", path)))?;
    let mut tokens: Vec<String> = rest.split('/').map(unescape).collect();
    let last = tokens
        .pop()
        .ok_or_else(|| AdmissionError::Patch(format!("path {:?} is empty", path)))?;
    Ok((tokens, last))
}

fn parent_object<'a>(
    document: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut serde_json::Map<String, Value>> {
    let mut current = document;
    for token in tokens {
        current = current
            .get_mut(token.as_str())
            .ok_or_else(|| AdmissionError::Patch(format!("{}: missing parent {:?}", path, token)))?;
    }
    current
        .as_object_mut()
        .ok_or_else(|| AdmissionError::Patch(format!("{}: parent is not an object", path)))
}

/// Apply `operations` in order. Fails without partial guarantees; callers
/// patch a scratch copy.
pub fn apply_patch(document: &mut Value, operations: &[PatchOperation]) -> Result<()> {
    for operation in operations {
        let (tokens, member) = split_path(operation.path())?;
        let parent = parent_object(document, &tokens, operation.path())?;
        match operation {
            PatchOperation::Add { value, .. } => {
                parent.insert(member, value.clone());
            }
            PatchOperation::Replace { path, value } => {
                let slot = parent
                    .get_mut(&member)
                    .ok_or_else(|| AdmissionError::Patch(format!("{}: nothing to replace", path)))?;
                *slot = value.clone();
            }
            PatchOperation::Remove { path } => {
                parent
                    .remove(&member)
                    .ok_or_else(|| AdmissionError::Patch(format!("{}: nothing to remove", path)))?;
            }
        }
    }
    Ok(())
}
