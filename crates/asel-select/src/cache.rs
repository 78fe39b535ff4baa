//! Label cache for every option the widget has ever seen.

use indexmap::IndexMap;
use serde_json::Value;

use crate::normalize::{FieldMap, normalize_item};
use crate::option::{OptionKey, OptionMap, RawValue, SelectOption};

/// Caller-provided label for a value that may never appear in any result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelOverride {
    pub label: String,
    pub image: Option<String>,
}

impl LabelOverride {
    pub fn to_option(&self, key: &OptionKey) -> SelectOption {
        let mut option = SelectOption::new(key, self.label.clone());
        option.image = self.image.clone();
        option
    }
}

pub type ValueLabels = IndexMap<OptionKey, LabelOverride>;

/// Parse a value-to-label mapping.
///
/// Object entries map a value to either a scalar label or `{label|text, image}`.
/// A list of option-shaped items is accepted as well.
pub fn parse_value_labels(raw: &Value) -> ValueLabels {
    let mut out = ValueLabels::new();
    match raw {
        Value::Object(map) => {
            for (value, entry) in map {
                let Some(key) = OptionKey::new(value.as_str()) else {
                    continue;
                };
                let label = match entry {
                    Value::Object(fields) => LabelOverride {
                        label: fields
                            .get("label")
                            .or_else(|| fields.get("text"))
                            .and_then(OptionKey::from_json)
                            .map(|k| k.as_str().to_string())
                            .unwrap_or_else(|| key.as_str().to_string()),
                        image: fields
                            .get("image")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    },
                    scalar => match OptionKey::from_json(scalar) {
                        Some(label) => LabelOverride {
                            label: label.as_str().to_string(),
                            image: None,
                        },
                        None => continue,
                    },
                };
                out.insert(key, label);
            }
        }
        Value::Array(items) => {
            for option in items
                .iter()
                .filter_map(|item| normalize_item(item, &FieldMap::default()))
            {
                out.insert(
                    option.key(),
                    LabelOverride {
                        label: option.label,
                        image: option.image,
                    },
                );
            }
        }
        _ => {}
    }
    out
}

#[derive(Clone, Debug, Default)]
pub struct OptionCache {
    entries: OptionMap,
}

impl OptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge options in; later writes for a key win.
    pub fn cache(&mut self, options: OptionMap) {
        for (key, option) in options {
            self.entries.insert(key, option);
        }
    }

    pub fn insert(&mut self, option: SelectOption) {
        self.entries.insert(option.key(), option);
    }

    pub fn lookup(&self, key: &str) -> Option<&SelectOption> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve selected values to options: cache, then overrides, then the
    /// value itself as label. Values without a key are skipped.
    pub fn labels_for(&self, values: &[RawValue], overrides: &ValueLabels) -> Vec<SelectOption> {
        values
            .iter()
            .filter_map(RawValue::key)
            .map(|key| {
                if let Some(option) = self.entries.get(&key) {
                    option.clone()
                } else if let Some(label) = overrides.get(&key) {
                    label.to_option(&key)
                } else {
                    SelectOption::synthetic(&key)
                }
            })
            .collect()
    }
}
