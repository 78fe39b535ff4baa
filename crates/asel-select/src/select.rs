//! The widget facade: one instance per rendered select.

use std::time::Duration;

use asel_auth::{OutboundAuth, RequestContext, TokenCodec, resolve_endpoint};
use serde_json::Value;

use crate::cache::{OptionCache, ValueLabels, parse_value_labels};
use crate::config::{SelectConfig, UiTheme};
use crate::error::{FetchError, SelectError};
use crate::fetch::{FetchRequest, FetchResponse, OptionFetcher};
use crate::normalize::{flatten_local, normalize};
use crate::option::{OptionKey, OptionMap, RawValue, SelectOption};
use crate::remote::{PageState, PendingQuery, RemoteQueryEngine, SearchRequest, extract_items};
use crate::selection::{SelectOutcome, SelectionStore};
use crate::view::{GroupedOptions, filter_local, group_options};

/// Async select widget state.
///
/// Construct with [`AsyncSelect::new`], seed it with the `with_*` builders and
/// call [`AsyncSelect::mount`] once. Every mutating operation that may reach the
/// network is `async` and returns after its fetch has been applied.
pub struct AsyncSelect<F> {
    config: SelectConfig,
    fetcher: F,
    auth: OutboundAuth,
    context: RequestContext,
    cache: OptionCache,
    local: OptionMap,
    value_labels: ValueLabels,
    selection: SelectionStore,
    remote: RemoteQueryEngine,
    search: String,
}

impl<F> std::fmt::Debug for AsyncSelect<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSelect")
            .field("endpoint", &self.remote.endpoint())
            .field("search", &self.search)
            .field("selection", self.selection.selection())
            .field("page", self.remote.page_state())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl<F: OptionFetcher> AsyncSelect<F> {
    pub fn new(config: SelectConfig, fetcher: F) -> Self {
        let auth = OutboundAuth::new(
            TokenCodec::new(config.internal.clone()),
            config.use_internal_auth,
        );
        let selection = SelectionStore::new(config.multiple, config.max_selections);
        let remote = RemoteQueryEngine::new(config.remote_settings());
        let value_labels = config.value_labels.clone();
        let mut select = Self {
            config,
            fetcher,
            auth,
            context: RequestContext::default(),
            cache: OptionCache::new(),
            local: OptionMap::new(),
            value_labels: ValueLabels::new(),
            selection,
            remote,
            search: String::new(),
        };
        select.apply_value_labels(value_labels);
        select
    }

    /// Page origin and user the widget acts for.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Replace the token codec, e.g. to share a clock with a verifier.
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.auth = OutboundAuth::new(codec, self.config.use_internal_auth);
        self
    }

    pub fn with_options(mut self, raw: &Value) -> Self {
        self.apply_options(raw);
        self
    }

    pub fn with_value_labels(mut self, raw: &Value) -> Self {
        self.apply_value_labels(parse_value_labels(raw));
        self
    }

    pub fn with_value(mut self, raw: &Value) -> Self {
        self.selection.set(raw);
        self
    }

    /// Initial autoload query, then label backfill for the seeded selection.
    pub async fn mount(&mut self) {
        if self.remote.is_remote() && (self.remote.autoload() || !self.search.is_empty()) {
            let term = self.search.clone();
            if let Some(request) = self.remote.query(&term, false) {
                self.run(request).await;
            }
        }
        self.ensure_labels_for_selected().await;
    }

    pub async fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
        if let Some(request) = self.remote.on_search_changed(term) {
            self.run(request).await;
        }
    }

    pub async fn select_option(&mut self, raw: impl Into<RawValue>) {
        let raw = raw.into();
        let Some(key) = raw.key() else {
            tracing::debug!(?raw, "ignoring selection without a usable value");
            return;
        };
        let new_tag = self.config.tag_mode() && !self.is_known(&key);
        let outcome = self.selection.select(raw);
        tracing::debug!(value = %key, ?outcome, "option selected");
        if new_tag && matches!(outcome, SelectOutcome::Selected | SelectOutcome::Replaced) {
            tracing::debug!(tag = %key, "creating tag");
            self.cache.insert(SelectOption::synthetic(&key));
        }
        if outcome != SelectOutcome::Ignored {
            self.ensure_labels_for_selected().await;
        }
    }

    /// Remove one value, or clear everything with `None`.
    pub fn clear_selection(&mut self, raw: Option<RawValue>) {
        self.selection.clear(raw.as_ref());
    }

    pub async fn set_value(&mut self, raw: &Value) {
        self.selection.set(raw);
        self.ensure_labels_for_selected().await;
    }

    pub async fn set_options(&mut self, raw: &Value) {
        self.apply_options(raw);
        self.ensure_labels_for_selected().await;
    }

    pub async fn set_value_labels(&mut self, raw: &Value) {
        self.apply_value_labels(parse_value_labels(raw));
        self.ensure_labels_for_selected().await;
    }

    pub async fn set_endpoint(&mut self, endpoint: Option<String>) {
        let term = self.search.clone();
        if let Some(request) = self.remote.set_endpoint(endpoint, &term) {
            self.run(request).await;
        }
    }

    pub async fn load_more(&mut self) {
        let term = self.search.clone();
        if let Some(request) = self.remote.load_more(&term) {
            self.run(request).await;
        }
    }

    pub async fn reload(&mut self) {
        if !self.remote.is_remote() {
            return;
        }
        let term = self.search.clone();
        if let Some(request) = self.remote.reload(&term) {
            self.run(request).await;
        }
    }

    /// Resolve labels for selected values nothing has described yet.
    ///
    /// Failures are logged and otherwise ignored; the selection then shows
    /// the raw values as labels.
    pub async fn ensure_labels_for_selected(&mut self) {
        let mut missing = Vec::new();
        for key in self.selection.keys() {
            if self.cache.contains(key.as_str()) {
                continue;
            }
            if let Some(label) = self.value_labels.get(&key) {
                self.cache.insert(label.to_option(&key));
                continue;
            }
            missing.push(key);
        }
        let Some((endpoint, params)) = self.remote.selected_request(&missing) else {
            return;
        };
        let request = match self.fetch_request(&endpoint, params) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%endpoint, "selected labels not requested: {err}");
                return;
            }
        };
        let payload = self
            .fetcher
            .get(request)
            .await
            .map_err(SelectError::from)
            .and_then(FetchResponse::into_payload);
        match payload {
            Ok(body) => {
                let options = normalize(extract_items(&body), &self.config.fields);
                tracing::debug!(%endpoint, count = options.len(), "selected labels resolved");
                self.cache.cache(options);
            }
            Err(err) => tracing::warn!(%endpoint, "selected labels unavailable: {err}"),
        }
    }

    /// Options the dropdown lists: remote results, or local options filtered
    /// by the search term.
    pub fn display_options(&self) -> Vec<SelectOption> {
        if self.remote.is_remote() {
            self.remote.results().values().cloned().collect()
        } else {
            filter_local(self.local.values(), &self.search)
        }
    }

    pub fn grouped_options(&self) -> GroupedOptions {
        group_options(self.display_options())
    }

    pub fn has_groups(&self) -> bool {
        self.grouped_options().is_grouped()
    }

    pub fn selected_options(&self) -> Vec<SelectOption> {
        self.cache
            .labels_for(&self.selection.values(), &self.value_labels)
    }

    pub fn is_selected(&self, raw: impl Into<RawValue>) -> bool {
        raw.into()
            .key()
            .is_some_and(|key| self.selection.contains(&key))
    }

    pub fn has_selection(&self) -> bool {
        self.selection.has_selection()
    }

    pub fn max_selections_reached(&self) -> bool {
        self.selection.max_selections_reached()
    }

    /// Current selection as JSON: a scalar or null, or a list in multiple mode.
    pub fn value(&self) -> Value {
        self.selection.to_json()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page_state(&self) -> &PageState {
        self.remote.page_state()
    }

    pub fn is_loading(&self) -> bool {
        self.remote.page_state().is_loading
    }

    pub fn error_message(&self) -> Option<&str> {
        self.remote.page_state().error_message.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.remote.page_state().page
    }

    pub fn has_more(&self) -> bool {
        self.remote.page_state().has_more
    }

    pub fn placeholder(&self) -> &str {
        &self.config.placeholder
    }

    pub fn ui(&self) -> UiTheme {
        self.config.ui
    }

    pub fn search_delay(&self) -> Duration {
        self.config.search_delay
    }

    pub fn config(&self) -> &SelectConfig {
        &self.config
    }

    pub fn cache(&self) -> &OptionCache {
        &self.cache
    }

    async fn run(&mut self, request: SearchRequest) {
        let SearchRequest {
            ticket,
            endpoint,
            params,
        } = request;
        let fetch = self.fetch_request(&endpoint, params);

        let pending = PendingQuery::new(&mut self.remote, ticket);
        let outcome = match fetch {
            Ok(fetch) => self.fetcher.get(fetch).await,
            Err(err) => Err(err),
        };
        let options = pending.complete(outcome, &self.config.fields);
        self.cache.cache(options);
    }

    fn fetch_request(
        &self,
        endpoint: &str,
        query: Vec<(String, String)>,
    ) -> Result<FetchRequest, FetchError> {
        let url = resolve_endpoint(endpoint, self.context.origin.as_ref())
            .map_err(|err| FetchError::InvalidUrl(format!("{endpoint}: {err}")))?;
        let headers =
            self.auth
                .headers_for(&self.context, endpoint, "GET", None, &self.config.headers);
        Ok(FetchRequest {
            url,
            query,
            headers,
        })
    }

    fn apply_options(&mut self, raw: &Value) {
        self.local = flatten_local(raw, &self.config.fields);
        self.cache.cache(self.local.clone());
    }

    fn apply_value_labels(&mut self, labels: ValueLabels) {
        for (key, label) in &labels {
            self.cache.insert(label.to_option(key));
        }
        self.value_labels = labels;
    }

    fn is_known(&self, key: &OptionKey) -> bool {
        self.cache.contains(key.as_str()) || self.value_labels.contains_key(key)
    }
}
