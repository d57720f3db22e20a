//! Binding a freshly drawn rectangle to a class.

use crate::classes::ClassList;
use crate::error::{AnnotateError, Result};
use crate::geometry::Rectangle;
use crate::store::{Annotation, AnnotationStore};

/// Holds at most one rectangle waiting for the user to pick its class.
#[derive(Debug, Clone, Default)]
pub struct ClassAssignmentFlow {
    pending: Option<Rectangle>,
    selected: Option<String>,
}

impl ClassAssignmentFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<Rectangle> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Start asking for a class. The selection defaults to the first class.
    pub fn begin(&mut self, rect: Rectangle, classes: &ClassList) -> Result<()> {
        if self.pending.is_some() {
            return Err(AnnotateError::AssignmentInProgress);
        }
        self.pending = Some(rect);
        self.selected = classes.first().map(str::to_string);
        Ok(())
    }

    pub fn select(&mut self, class_name: impl Into<String>) {
        self.selected = Some(class_name.into());
    }

    /// Pick the first class if the class list grew while nothing was selected.
    pub fn refresh_default(&mut self, classes: &ClassList) {
        if self.pending.is_some() && self.selected.is_none() {
            self.selected = classes.first().map(str::to_string);
        }
    }

    /// Commit the pending rectangle with the selected class.
    ///
    /// The pending rectangle is consumed in every case. With an empty or
    /// unknown selection nothing is appended and the error says why.
    pub fn confirm(&mut self, classes: &ClassList, store: &mut AnnotationStore) -> Result<Annotation> {
        let rect = self.pending.take().ok_or(AnnotateError::NoPendingBox)?;
        let selected = self.selected.take().unwrap_or_default();
        if selected.is_empty() {
            return Err(AnnotateError::NoClassSelected);
        }
        let class_id = classes
            .id_of(&selected)
            .ok_or(AnnotateError::UnknownClass { name: selected })?;

        let annotation = Annotation::new(rect, class_id);
        store.append(annotation);
        Ok(annotation)
    }

    /// Discard the pending rectangle.
    pub fn cancel(&mut self) -> Option<Rectangle> {
        self.selected = None;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassId;

    fn classes(names: &[&str]) -> ClassList {
        ClassList::from_names(names.iter().map(|s| s.to_string()))
    }

    fn rect() -> Rectangle {
        Rectangle::new(50.0, 50.0, 100.0, 70.0)
    }

    #[test]
    fn test_default_selection_is_first_class() {
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &classes(&["cat", "dog"])).unwrap();
        assert_eq!(flow.selected(), Some("cat"));
    }

    #[test]
    fn test_no_default_without_classes() {
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &ClassList::new()).unwrap();
        assert_eq!(flow.selected(), None);
    }

    #[test]
    fn test_confirm_resolves_class_index() {
        let list = classes(&["cat", "dog"]);
        let mut store = AnnotationStore::new();
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &list).unwrap();
        flow.select("dog");

        let ann = flow.confirm(&list, &mut store).unwrap();
        assert_eq!(ann.class_id, ClassId(1));
        assert_eq!(store.all(), &[Annotation::new(rect(), ClassId(1))]);
        assert!(!flow.is_pending());
    }

    #[test]
    fn test_confirm_unknown_class_drops_box() {
        let list = classes(&["cat"]);
        let mut store = AnnotationStore::new();
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &list).unwrap();
        flow.select("zebra");

        let err = flow.confirm(&list, &mut store).unwrap_err();
        assert!(matches!(err, AnnotateError::UnknownClass { name } if name == "zebra"));
        assert!(store.is_empty());
        assert!(!flow.is_pending());
    }

    #[test]
    fn test_confirm_without_selection() {
        let mut store = AnnotationStore::new();
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &ClassList::new()).unwrap();
        let err = flow.confirm(&ClassList::new(), &mut store).unwrap_err();
        assert!(matches!(err, AnnotateError::NoClassSelected));
        assert!(store.is_empty());
    }

    #[test]
    fn test_confirm_without_pending_box() {
        let mut store = AnnotationStore::new();
        let mut flow = ClassAssignmentFlow::new();
        let err = flow.confirm(&classes(&["cat"]), &mut store).unwrap_err();
        assert!(matches!(err, AnnotateError::NoPendingBox));
    }

    #[test]
    fn test_cancel_leaves_store_alone() {
        let list = classes(&["cat"]);
        let mut store = AnnotationStore::new();
        store.append(Annotation::new(rect(), ClassId(0)));
        let before = store.all().to_vec();

        let mut flow = ClassAssignmentFlow::new();
        flow.begin(Rectangle::new(1.0, 1.0, 5.0, 5.0), &list).unwrap();
        assert_eq!(flow.cancel(), Some(Rectangle::new(1.0, 1.0, 5.0, 5.0)));

        assert_eq!(store.all(), before.as_slice());
        assert!(!flow.is_pending());
    }

    #[test]
    fn test_second_begin_is_rejected() {
        let list = classes(&["cat"]);
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &list).unwrap();
        let err = flow.begin(Rectangle::new(0.0, 0.0, 1.0, 1.0), &list).unwrap_err();
        assert!(matches!(err, AnnotateError::AssignmentInProgress));
        assert_eq!(flow.pending(), Some(rect()));
    }

    #[test]
    fn test_refresh_default_after_first_class_added() {
        let mut flow = ClassAssignmentFlow::new();
        flow.begin(rect(), &ClassList::new()).unwrap();
        flow.refresh_default(&classes(&["cat"]));
        assert_eq!(flow.selected(), Some("cat"));
    }
}
