use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

/// Trim a user-entered class name, rejecting names that end up empty.
pub fn normalize_class_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AnnotateError::EmptyClassName);
    }
    Ok(name.to_string())
}

/// Case-sensitive, duplicate-free class names in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList {
    names: Vec<String>,
}

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeats after the first occurrence are dropped.
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut list = Self::new();
        for name in names {
            list.insert(name);
        }
        list
    }

    /// Append `name` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names.iter().position(|n| n == name).map(ClassId)
    }

    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
