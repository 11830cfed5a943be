use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::domain::{ElementRecord, FieldDefinition, FieldId};
use crate::form::PropertyBinding;

/// Saved values keyed by element id, then field id.
pub type PanelValues = IndexMap<String, IndexMap<String, Option<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Change {
    field: FieldId,
    before: Option<String>,
    after: Option<String>,
}

/// Committed values of every element plus an undo history for the element being edited.
#[derive(Debug)]
pub(crate) struct PropertyStore {
    elements: Vec<ElementRecord>,
    current: usize,
    undo: Vec<Change>,
    redo: Vec<Change>,
    validation: HashMap<(usize, FieldId), String>,
    dirty: bool,
}

impl PropertyStore {
    pub(crate) fn new(elements: Vec<ElementRecord>) -> Self {
        Self {
            elements,
            current: 0,
            undo: Vec::new(),
            redo: Vec::new(),
            validation: HashMap::new(),
            dirty: false,
        }
    }

    pub(crate) fn current(&self) -> Option<&ElementRecord> {
        self.elements.get(self.current)
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    /// Moves to another element by `delta`, wrapping around. History does not carry over.
    pub(crate) fn step(&mut self, delta: i32) -> bool {
        let len = self.elements.len();
        if len < 2 {
            return false;
        }
        let next = (self.current as i64 + delta as i64).rem_euclid(len as i64) as usize;
        if next == self.current {
            return false;
        }
        self.current = next;
        self.undo.clear();
        self.redo.clear();
        true
    }

    /// Reverts the latest commit on the current element and returns the restored value.
    pub(crate) fn undo(&mut self) -> Option<(FieldId, Option<String>)> {
        let change = self.undo.pop()?;
        self.write(&change.field, change.before.clone());
        let restored = (change.field.clone(), change.before.clone());
        self.redo.push(change);
        Some(restored)
    }

    pub(crate) fn redo(&mut self) -> Option<(FieldId, Option<String>)> {
        let change = self.redo.pop()?;
        self.write(&change.field, change.after.clone());
        let restored = (change.field.clone(), change.after.clone());
        self.undo.push(change);
        Some(restored)
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn issue_count(&self) -> usize {
        self.validation.len()
    }

    fn write(&mut self, field: &FieldId, value: Option<String>) {
        if let Some(element) = self.elements.get_mut(self.current) {
            element.values.insert(field.clone(), value);
            self.dirty = true;
        }
    }

    /// Snapshot of all values; every declared field appears for every element.
    pub(crate) fn values(&self, fields: &[FieldDefinition]) -> PanelValues {
        self.elements
            .iter()
            .map(|element| {
                let values = fields
                    .iter()
                    .map(|field| {
                        (
                            field.id.to_string(),
                            element.value(&field.id).map(str::to_string),
                        )
                    })
                    .collect();
                (element.id.to_string(), values)
            })
            .collect()
    }
}

impl PropertyBinding for PropertyStore {
    fn get_value(&self, field: &FieldId) -> Option<String> {
        self.current()
            .and_then(|element| element.value(field))
            .map(str::to_string)
    }

    fn set_value(&mut self, field: &FieldId, value: Option<String>, validation_error: Option<String>) {
        let before = self.get_value(field);
        debug!(%field, ?before, after = ?value, "property updated");
        self.undo.push(Change {
            field: field.clone(),
            before,
            after: value.clone(),
        });
        self.redo.clear();
        self.write(field, value);
        let key = (self.current, field.clone());
        match validation_error {
            Some(message) => {
                self.validation.insert(key, message);
            }
            None => {
                self.validation.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PropertyStore {
        PropertyStore::new(vec![
            ElementRecord::new("task_1").with_value("condition", Some("=a")),
            ElementRecord::new("task_2"),
        ])
    }

    #[test]
    fn undo_and_redo_restore_committed_values() {
        let mut store = store();
        let field = FieldId::from("condition");
        store.set_value(&field, Some("=a + b".into()), None);
        assert_eq!(store.undo(), Some((field.clone(), Some("=a".into()))));
        assert_eq!(store.get_value(&field).as_deref(), Some("=a"));
        assert_eq!(store.redo(), Some((field.clone(), Some("=a + b".into()))));
        assert_eq!(store.redo(), None);
    }

    #[test]
    fn stepping_wraps_and_drops_history() {
        let mut store = store();
        store.set_value(&"condition".into(), None, None);
        assert!(store.step(-1));
        assert_eq!(store.current_index(), 1);
        assert_eq!(store.undo(), None);
        assert!(store.step(1));
        assert_eq!(store.current_index(), 0);
    }

    #[test]
    fn validation_issues_track_the_latest_commit() {
        let mut store = store();
        let field = FieldId::from("condition");
        store.set_value(&field, None, Some("Value is required.".into()));
        assert_eq!(store.issue_count(), 1);
        store.set_value(&field, Some("x".into()), None);
        assert_eq!(store.issue_count(), 0);
    }

    #[test]
    fn values_list_every_declared_field() {
        let store = store();
        let fields = vec![
            FieldDefinition::new("condition", "Condition"),
            FieldDefinition::new("name", "Name"),
        ];
        let values = store.values(&fields);
        assert_eq!(values["task_1"]["condition"].as_deref(), Some("=a"));
        assert_eq!(values["task_1"]["name"], None);
        assert_eq!(values["task_2"].len(), 2);
    }
}
