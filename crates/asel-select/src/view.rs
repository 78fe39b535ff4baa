//! Derived, read-only views over options.

use indexmap::IndexMap;
use serde::Serialize;

use crate::option::SelectOption;

/// Options as the dropdown lists them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupedOptions {
    Flat(Vec<SelectOption>),
    Grouped {
        ungrouped: Vec<SelectOption>,
        groups: IndexMap<String, Vec<SelectOption>>,
    },
}

impl GroupedOptions {
    pub fn is_grouped(&self) -> bool {
        matches!(self, GroupedOptions::Grouped { .. })
    }
}

/// Case-insensitive substring match on the label. An empty term keeps all.
pub fn filter_local<'a>(
    options: impl IntoIterator<Item = &'a SelectOption>,
    term: &str,
) -> Vec<SelectOption> {
    let needle = term.to_lowercase();
    options
        .into_iter()
        .filter(|o| needle.is_empty() || o.label.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

pub fn has_groups(options: &[SelectOption]) -> bool {
    options.iter().any(|o| o.group.is_some())
}

/// Ungrouped options first, then each group in first-seen order.
pub fn group_options(options: Vec<SelectOption>) -> GroupedOptions {
    if !has_groups(&options) {
        return GroupedOptions::Flat(options);
    }
    let mut ungrouped = Vec::new();
    let mut groups: IndexMap<String, Vec<SelectOption>> = IndexMap::new();
    for option in options {
        match option.group.clone() {
            Some(group) => groups.entry(group).or_default().push(option),
            None => ungrouped.push(option),
        }
    }
    GroupedOptions::Grouped { ungrouped, groups }
}
