//! Turning arbitrary JSON items into [`SelectOption`]s.

use serde_json::{Map, Value};

use crate::option::{OptionKey, OptionMap, SelectOption};

const VALUE_CANDIDATES: [&str; 2] = ["id", "value"];
const LABEL_CANDIDATES: [&str; 4] = ["name", "title", "label", "text"];

/// Which fields of a remote item carry value, label and image.
///
/// Unset fields are auto-detected per item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMap {
    pub value: Option<String>,
    pub label: Option<String>,
    pub image: Option<String>,
}

impl FieldMap {
    pub fn new(value: Option<String>, label: Option<String>, image: Option<String>) -> Self {
        Self { value, label, image }
    }
}

/// Normalize a list of items, dropping the ones without a usable value.
/// Later duplicates overwrite earlier ones but keep the first position.
pub fn normalize(items: &[Value], fields: &FieldMap) -> OptionMap {
    let mut out = OptionMap::new();
    for item in items {
        match normalize_item(item, fields) {
            Some(option) => {
                out.insert(option.key(), option);
            }
            None => tracing::trace!(%item, "dropping item without a usable value"),
        }
    }
    out
}

pub fn normalize_item(item: &Value, fields: &FieldMap) -> Option<SelectOption> {
    match item {
        Value::Object(map) => normalize_object(map, fields),
        Value::Null | Value::Array(_) => None,
        scalar => {
            let key = OptionKey::from_json(scalar)?;
            Some(SelectOption::synthetic(&key))
        }
    }
}

fn normalize_object(map: &Map<String, Value>, fields: &FieldMap) -> Option<SelectOption> {
    let label_field = configured(map, fields.label.as_deref())
        .or_else(|| LABEL_CANDIDATES.into_iter().find(|k| is_scalar(map.get(*k))));

    let value = configured(map, fields.value.as_deref())
        .or_else(|| VALUE_CANDIDATES.into_iter().find(|k| is_scalar(map.get(*k))))
        .and_then(|k| map.get(k))
        .or_else(|| {
            map.iter()
                .find(|(k, v)| Some(k.as_str()) != label_field && is_scalar(Some(*v)))
                .map(|(_, v)| v)
        })?;
    let key = OptionKey::from_json(value)?;

    let label = label_field
        .and_then(|k| map.get(k))
        .and_then(OptionKey::from_json)
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| key.as_str().to_string());

    let mut option = SelectOption::new(&key, label);
    option.image = fields
        .image
        .as_deref()
        .and_then(|k| map.get(k))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    option.group = map
        .get("group")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    option.disabled = map.get("disabled").is_some_and(truthy);
    Some(option)
}

/// Flatten a locally supplied option list.
///
/// Accepts a list of items, group objects shaped `{label, options: [..]}`, or a
/// plain `{value: label}` object. A key mapping to a list becomes a group.
pub fn flatten_local(input: &Value, fields: &FieldMap) -> OptionMap {
    let mut out = OptionMap::new();
    match input {
        Value::Array(items) => {
            for item in items {
                match group_of(item) {
                    Some((label, children)) => push_group(&mut out, label, children, fields),
                    None => push(&mut out, normalize_item(item, fields)),
                }
            }
        }
        Value::Object(map) => {
            for (key, entry) in map {
                match entry {
                    Value::Array(children) => push_group(&mut out, key, children, fields),
                    Value::Object(_) => push(&mut out, normalize_item(entry, fields)),
                    scalar => {
                        let label = OptionKey::from_json(scalar)
                            .map(|k| k.as_str().to_string())
                            .unwrap_or_else(|| key.clone());
                        push(&mut out, OptionKey::new(key.as_str()).map(|k| SelectOption::new(&k, label)));
                    }
                }
            }
        }
        Value::Null => {}
        other => tracing::debug!(%other, "ignoring non-list local options"),
    }
    out
}

fn group_of(item: &Value) -> Option<(&str, &[Value])> {
    let label = item.get("label")?.as_str()?;
    let children = item.get("options")?.as_array()?;
    Some((label, children.as_slice()))
}

fn push_group(out: &mut OptionMap, label: &str, children: &[Value], fields: &FieldMap) {
    for child in children {
        let option = normalize_item(child, fields).map(|mut option| {
            option.group = Some(label.to_string());
            option
        });
        push(out, option);
    }
}

fn push(out: &mut OptionMap, option: Option<SelectOption>) {
    if let Some(option) = option {
        out.insert(option.key(), option);
    }
}

fn configured<'a>(map: &Map<String, Value>, field: Option<&'a str>) -> Option<&'a str> {
    field.filter(|k| map.contains_key(*k))
}

fn is_scalar(value: Option<&Value>) -> bool {
    matches!(
        value,
        Some(Value::String(_) | Value::Number(_) | Value::Bool(_))
    )
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
