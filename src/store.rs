use serde::{Deserialize, Serialize};

use crate::classes::ClassId;
use crate::geometry::Rectangle;

// wire shape: {x, y, width, height, classId}, in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(flatten)]
    pub rect: Rectangle,
    #[serde(rename = "classId")]
    pub class_id: ClassId,
}

impl Annotation {
    pub fn new(rect: Rectangle, class_id: ClassId) -> Self {
        Self { rect, class_id }
    }
}

/// Annotations in the order they were committed. Overlapping and duplicate
/// boxes are allowed.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    revision: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
        self.revision += 1;
    }

    pub fn all(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn reset(&mut self) {
        self.annotations.clear();
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    // bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
