use std::time::Duration;

use asel_auth::InternalAuthConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{ValueLabels, parse_value_labels};
use crate::normalize::FieldMap;
use crate::remote::RemoteSettings;

/// Markup flavor the host renders the widget with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiTheme {
    Tailwind,
    #[default]
    Bootstrap,
}

impl UiTheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Some(UiTheme::Tailwind),
            "bootstrap" => Some(UiTheme::Bootstrap),
            _ => None,
        }
    }
}

/// Process-wide defaults every widget instance starts from.
#[derive(Clone, Debug)]
pub struct SelectDefaults {
    pub placeholder: String,
    pub min_search_length: usize,
    /// Debounce for the search input. Carried for the input binding only.
    pub search_delay: Duration,
    pub search_param: String,
    pub selected_param: String,
    pub autoload: bool,
    pub multiple: bool,
    pub ui: UiTheme,
    pub use_internal_auth: bool,
    pub per_page: u32,
    pub request_timeout: Duration,
    pub internal: InternalAuthConfig,
}

impl Default for SelectDefaults {
    fn default() -> Self {
        Self {
            placeholder: "Select an option".into(),
            min_search_length: 2,
            search_delay: Duration::from_millis(300),
            search_param: "search".into(),
            selected_param: "selected".into(),
            autoload: false,
            multiple: false,
            ui: UiTheme::default(),
            use_internal_auth: true,
            per_page: 20,
            request_timeout: Duration::from_secs(5),
            internal: InternalAuthConfig::default(),
        }
    }
}

impl SelectDefaults {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut defaults = Self::default();
        if let Some(placeholder) = lookup("ASYNC_SELECT_PLACEHOLDER") {
            defaults.placeholder = placeholder;
        }
        if let Some(len) = parsed(&lookup, "ASYNC_SELECT_MIN_SEARCH_LENGTH") {
            defaults.min_search_length = len;
        }
        if let Some(ms) = parsed(&lookup, "ASYNC_SELECT_SEARCH_DELAY") {
            defaults.search_delay = Duration::from_millis(ms);
        }
        if let Some(param) = lookup("ASYNC_SELECT_SEARCH_PARAM").filter(|v| !v.is_empty()) {
            defaults.search_param = param;
        }
        if let Some(param) = lookup("ASYNC_SELECT_SELECTED_PARAM").filter(|v| !v.is_empty()) {
            defaults.selected_param = param;
        }
        if let Some(flag) = lookup("ASYNC_SELECT_AUTOLOAD").and_then(|v| parse_bool(&v)) {
            defaults.autoload = flag;
        }
        if let Some(flag) = lookup("ASYNC_SELECT_MULTIPLE").and_then(|v| parse_bool(&v)) {
            defaults.multiple = flag;
        }
        if let Some(ui) = lookup("ASYNC_SELECT_UI").and_then(|v| UiTheme::parse(&v)) {
            defaults.ui = ui;
        }
        if let Some(flag) = lookup("ASYNC_SELECT_USE_INTERNAL_AUTH").and_then(|v| parse_bool(&v)) {
            defaults.use_internal_auth = flag;
        }
        if let Some(per_page) = parsed::<u32>(&lookup, "ASYNC_SELECT_PER_PAGE").filter(|n| *n > 0) {
            defaults.per_page = per_page;
        }
        if let Some(secs) = parsed(&lookup, "ASYNC_SELECT_REQUEST_TIMEOUT") {
            defaults.request_timeout = Duration::from_secs(secs);
        }
        defaults.internal = InternalAuthConfig::from_lookup(&lookup);
        defaults
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration of a single widget instance.
#[derive(Clone, Debug)]
pub struct SelectConfig {
    pub placeholder: String,
    pub ui: UiTheme,
    pub search_delay: Duration,
    pub endpoint: Option<String>,
    pub selected_endpoint: Option<String>,
    pub search_param: String,
    pub selected_param: String,
    pub min_search_length: usize,
    pub autoload: bool,
    pub multiple: bool,
    pub tags: bool,
    /// 0 means unlimited.
    pub max_selections: usize,
    pub per_page: u32,
    pub fields: FieldMap,
    pub extra_params: IndexMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub value_labels: ValueLabels,
    pub use_internal_auth: bool,
    pub request_timeout: Duration,
    pub internal: InternalAuthConfig,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self::from_defaults(&SelectDefaults::default())
    }
}

impl SelectConfig {
    pub fn from_defaults(defaults: &SelectDefaults) -> Self {
        Self {
            placeholder: defaults.placeholder.clone(),
            ui: defaults.ui,
            search_delay: defaults.search_delay,
            endpoint: None,
            selected_endpoint: None,
            search_param: defaults.search_param.clone(),
            selected_param: defaults.selected_param.clone(),
            min_search_length: defaults.min_search_length,
            autoload: defaults.autoload,
            multiple: defaults.multiple,
            tags: false,
            max_selections: 0,
            per_page: defaults.per_page.max(1),
            fields: FieldMap::default(),
            extra_params: IndexMap::new(),
            headers: Vec::new(),
            value_labels: ValueLabels::new(),
            use_internal_auth: defaults.use_internal_auth,
            request_timeout: defaults.request_timeout,
            internal: defaults.internal.clone(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = non_blank(endpoint.into());
        self
    }

    pub fn selected_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.selected_endpoint = non_blank(endpoint.into());
        self
    }

    pub fn search_param(mut self, param: impl Into<String>) -> Self {
        self.search_param = param.into();
        self
    }

    pub fn selected_param(mut self, param: impl Into<String>) -> Self {
        self.selected_param = param.into();
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Free-form values; only effective together with `multiple`.
    pub fn tags(mut self, tags: bool) -> Self {
        self.tags = tags;
        self
    }

    pub fn max_selections(mut self, max: i64) -> Self {
        self.max_selections = usize::try_from(max).unwrap_or(0);
        self
    }

    pub fn min_search_length(mut self, len: i64) -> Self {
        self.min_search_length = usize::try_from(len).unwrap_or(0);
        self
    }

    pub fn autoload(mut self, autoload: bool) -> Self {
        self.autoload = autoload;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn value_field(mut self, field: impl Into<String>) -> Self {
        self.fields.value = Some(field.into());
        self
    }

    pub fn label_field(mut self, field: impl Into<String>) -> Self {
        self.fields.label = Some(field.into());
        self
    }

    pub fn image_field(mut self, field: impl Into<String>) -> Self {
        self.fields.image = Some(field.into());
        self
    }

    pub fn extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn value_labels(mut self, raw: &Value) -> Self {
        self.value_labels = parse_value_labels(raw);
        self
    }

    pub fn use_internal_auth(mut self, enabled: bool) -> Self {
        self.use_internal_auth = enabled;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn ui(mut self, ui: UiTheme) -> Self {
        self.ui = ui;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn internal(mut self, internal: InternalAuthConfig) -> Self {
        self.internal = internal;
        self
    }

    pub fn tag_mode(&self) -> bool {
        self.multiple && self.tags
    }

    pub fn remote_settings(&self) -> RemoteSettings {
        RemoteSettings {
            endpoint: self.endpoint.clone(),
            selected_endpoint: self.selected_endpoint.clone(),
            search_param: self.search_param.clone(),
            selected_param: self.selected_param.clone(),
            per_page: self.per_page,
            min_search_length: self.min_search_length,
            autoload: self.autoload,
            extra_params: self.extra_params.clone(),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}
