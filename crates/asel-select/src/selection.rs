//! Single and multiple selection state.

use serde_json::Value;

use crate::option::{OptionKey, RawValue};

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Single(Option<RawValue>),
    Multiple(Vec<RawValue>),
}

/// What a call to [`SelectionStore::select`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected,
    Deselected,
    Replaced,
    /// Invalid value, or the multiple selection is at its cap.
    Ignored,
}

#[derive(Clone, Debug)]
pub struct SelectionStore {
    selection: Selection,
    max_selections: usize,
}

impl SelectionStore {
    /// `max_selections == 0` means unlimited.
    pub fn new(multiple: bool, max_selections: usize) -> Self {
        let selection = if multiple {
            Selection::Multiple(Vec::new())
        } else {
            Selection::Single(None)
        };
        Self {
            selection,
            max_selections,
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.selection, Selection::Multiple(_))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn max_selections(&self) -> usize {
        self.max_selections
    }

    /// Toggle in multiple mode, replace in single mode.
    pub fn select(&mut self, raw: RawValue) -> SelectOutcome {
        let Some(key) = raw.key() else {
            return SelectOutcome::Ignored;
        };
        let at_cap = self.max_selections_reached();
        match &mut self.selection {
            Selection::Multiple(values) => {
                if let Some(pos) = values.iter().position(|v| v.key().as_ref() == Some(&key)) {
                    values.remove(pos);
                    SelectOutcome::Deselected
                } else if at_cap {
                    SelectOutcome::Ignored
                } else {
                    values.push(raw);
                    SelectOutcome::Selected
                }
            }
            Selection::Single(current) => {
                let outcome = if current.is_some() {
                    SelectOutcome::Replaced
                } else {
                    SelectOutcome::Selected
                };
                *current = Some(raw);
                outcome
            }
        }
    }

    /// Remove one value, or everything when `raw` is `None`. A single
    /// selection only clears when `raw` matches it.
    pub fn clear(&mut self, raw: Option<&RawValue>) {
        match (&mut self.selection, raw.and_then(RawValue::key)) {
            (Selection::Multiple(values), Some(key)) => {
                values.retain(|v| v.key().as_ref() != Some(&key));
            }
            (Selection::Multiple(values), None) => values.clear(),
            (Selection::Single(current), Some(key)) => {
                if current.as_ref().and_then(RawValue::key).as_ref() == Some(&key) {
                    *current = None;
                }
            }
            (Selection::Single(current), None) => *current = None,
        }
    }

    /// Replace the selection from an external value.
    ///
    /// Multiple mode accepts a scalar or a list, drops entries without a key,
    /// de-duplicates by key and truncates to the cap. Single mode keeps the
    /// first scalar found.
    pub fn set(&mut self, value: &Value) {
        let scalars: Vec<RawValue> = match value {
            Value::Array(items) => items.iter().filter_map(RawValue::from_json).collect(),
            other => RawValue::from_json(other).into_iter().collect(),
        };
        let max = self.max_selections;
        match &mut self.selection {
            Selection::Multiple(values) => {
                values.clear();
                for raw in scalars {
                    let Some(key) = raw.key() else { continue };
                    if values.iter().any(|v| v.key().as_ref() == Some(&key)) {
                        continue;
                    }
                    if max > 0 && values.len() >= max {
                        break;
                    }
                    values.push(raw);
                }
            }
            Selection::Single(current) => {
                *current = scalars.into_iter().find(|raw| raw.key().is_some());
            }
        }
    }

    pub fn values(&self) -> Vec<RawValue> {
        match &self.selection {
            Selection::Single(current) => current.iter().cloned().collect(),
            Selection::Multiple(values) => values.clone(),
        }
    }

    pub fn keys(&self) -> Vec<OptionKey> {
        self.values().iter().filter_map(RawValue::key).collect()
    }

    pub fn contains(&self, key: &OptionKey) -> bool {
        self.keys().contains(key)
    }

    pub fn has_selection(&self) -> bool {
        match &self.selection {
            Selection::Single(current) => current.is_some(),
            Selection::Multiple(values) => !values.is_empty(),
        }
    }

    pub fn max_selections_reached(&self) -> bool {
        match &self.selection {
            Selection::Multiple(values) => {
                self.max_selections > 0 && values.len() >= self.max_selections
            }
            Selection::Single(_) => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match &self.selection {
            Selection::Single(current) => {
                current.as_ref().map(RawValue::to_json).unwrap_or(Value::Null)
            }
            Selection::Multiple(values) => {
                Value::Array(values.iter().map(RawValue::to_json).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multiple_toggles() {
        let mut store = SelectionStore::new(true, 0);
        assert_eq!(store.select("x".into()), SelectOutcome::Selected);
        assert_eq!(store.to_json(), json!(["x"]));
        assert_eq!(store.select("x".into()), SelectOutcome::Deselected);
        assert_eq!(store.to_json(), json!([]));
    }

    #[test]
    fn toggling_matches_by_key_not_type() {
        let mut store = SelectionStore::new(true, 0);
        store.select(RawValue::Int(3));
        assert_eq!(store.select("3".into()), SelectOutcome::Deselected);
        assert!(!store.has_selection());
    }

    #[test]
    fn cap_blocks_additions_but_not_removals() {
        let mut store = SelectionStore::new(true, 2);
        store.select("a".into());
        store.select("b".into());
        assert!(store.max_selections_reached());
        assert_eq!(store.select("c".into()), SelectOutcome::Ignored);
        assert_eq!(store.select("a".into()), SelectOutcome::Deselected);
        assert!(!store.max_selections_reached());
        assert_eq!(store.to_json(), json!(["b"]));
    }

    #[test]
    fn single_replaces_and_never_reports_cap() {
        let mut store = SelectionStore::new(false, 1);
        assert_eq!(store.select(RawValue::Int(1)), SelectOutcome::Selected);
        assert_eq!(store.select(RawValue::Int(2)), SelectOutcome::Replaced);
        assert_eq!(store.to_json(), json!(2));
        assert!(!store.max_selections_reached());
    }

    #[test]
    fn null_is_ignored() {
        let mut store = SelectionStore::new(true, 0);
        assert_eq!(store.select("".into()), SelectOutcome::Ignored);
        store.set(&json!([null, "a"]));
        assert_eq!(store.to_json(), json!(["a"]));
    }

    #[test]
    fn clear_one_or_all() {
        let mut store = SelectionStore::new(true, 0);
        store.set(&json!(["a", "b", "c"]));
        store.clear(Some(&"b".into()));
        assert_eq!(store.to_json(), json!(["a", "c"]));
        store.clear(None);
        assert_eq!(store.to_json(), json!([]));

        let mut single = SelectionStore::new(false, 0);
        single.set(&json!("a"));
        single.clear(Some(&"zzz".into()));
        assert_eq!(single.to_json(), json!("a"));
        single.clear(Some(&"a".into()));
        assert_eq!(single.to_json(), json!(null));

        single.set(&json!(7));
        single.clear(Some(&"7".into()));
        assert!(!single.has_selection());
        single.set(&json!("b"));
        single.clear(None);
        assert!(!single.has_selection());
    }

    #[test]
    fn external_set_dedupes_and_truncates() {
        let mut store = SelectionStore::new(true, 2);
        store.set(&json!([1, "1", 2, 3]));
        assert_eq!(store.to_json(), json!([1, 2]));

        store.set(&json!("solo"));
        assert_eq!(store.to_json(), json!(["solo"]));

        let mut single = SelectionStore::new(false, 0);
        single.set(&json!([null, 5, 6]));
        assert_eq!(single.to_json(), json!(5));
    }
}
