//! Remote query lifecycle: search gating, pagination and stale-response
//! protection.
//!
//! The engine never performs I/O. Each query it decides to run is handed out
//! as a [`SearchRequest`] carrying a [`QueryTicket`]; the caller performs the
//! fetch and feeds the outcome back through [`RemoteQueryEngine::complete`].
//! Only the most recently issued ticket may change results or paging state.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FetchError, SelectError};
use crate::fetch::FetchResponse;
use crate::normalize::{FieldMap, normalize, truthy};
use crate::option::{OptionKey, OptionMap};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load options. Please try again.";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Keys searched, in order, for the item list of an envelope payload.
const ITEM_KEYS: [&str; 3] = ["data", "results", "items"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl PageState {
    fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            has_more: false,
            is_loading: false,
            error_message: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Loading,
    Loaded,
    Errored,
}

/// Identity of one issued query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTicket {
    seq: u64,
    term: String,
    page: u32,
    append: bool,
}

impl QueryTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn append(&self) -> bool {
        self.append
    }
}

/// A query the caller should execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub ticket: QueryTicket,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

#[derive(Clone, Debug)]
pub struct RemoteSettings {
    pub endpoint: Option<String>,
    pub selected_endpoint: Option<String>,
    pub search_param: String,
    pub selected_param: String,
    pub per_page: u32,
    pub min_search_length: usize,
    pub autoload: bool,
    pub extra_params: IndexMap<String, String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            selected_endpoint: None,
            search_param: "search".into(),
            selected_param: "selected".into(),
            per_page: 20,
            min_search_length: 2,
            autoload: false,
            extra_params: IndexMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct RemoteQueryEngine {
    settings: RemoteSettings,
    state: PageState,
    phase: QueryPhase,
    results: OptionMap,
    latest: Option<QueryTicket>,
    next_seq: u64,
}

impl RemoteQueryEngine {
    pub fn new(settings: RemoteSettings) -> Self {
        let state = PageState::new(settings.per_page.max(1));
        Self {
            settings,
            state,
            phase: QueryPhase::Idle,
            results: OptionMap::new(),
            latest: None,
            next_seq: 0,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.settings.endpoint.as_deref()
    }

    pub fn is_remote(&self) -> bool {
        self.settings.endpoint.is_some()
    }

    pub fn autoload(&self) -> bool {
        self.settings.autoload
    }

    pub fn page_state(&self) -> &PageState {
        &self.state
    }

    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    pub fn results(&self) -> &OptionMap {
        &self.results
    }

    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        self.latest.as_ref().is_some_and(|t| t.seq == ticket.seq)
    }

    /// React to a new search term.
    ///
    /// A blank term reloads the first page with autoload on, otherwise it
    /// clears results without a query. A non-empty term shorter than the
    /// minimum falls back to the blank query under autoload and is ignored
    /// without it. Every issued search starts again from page 1 with the
    /// accumulated results cleared.
    pub fn on_search_changed(&mut self, term: &str) -> Option<SearchRequest> {
        if !self.is_remote() {
            return None;
        }
        if term.is_empty() {
            if self.settings.autoload {
                return self.restart("");
            }
            self.results.clear();
            self.state.has_more = false;
            self.state.error_message = None;
            return None;
        }
        if term.chars().count() < self.settings.min_search_length {
            if self.settings.autoload {
                return self.restart("");
            }
            return None;
        }
        self.restart(term)
    }

    fn restart(&mut self, term: &str) -> Option<SearchRequest> {
        self.state.page = 1;
        self.results.clear();
        self.query(term, false)
    }

    /// Issue a query for the current page. `None` without an endpoint.
    pub fn query(&mut self, term: &str, append: bool) -> Option<SearchRequest> {
        let endpoint = self.settings.endpoint.clone()?;
        self.next_seq += 1;
        let ticket = QueryTicket {
            seq: self.next_seq,
            term: term.to_string(),
            page: self.state.page,
            append,
        };
        self.state.is_loading = true;
        self.state.error_message = None;
        self.phase = QueryPhase::Loading;
        self.latest = Some(ticket.clone());
        tracing::debug!(seq = ticket.seq, page = ticket.page, append, term, "option query issued");

        let params = self.query_params(&[
            (self.settings.search_param.clone(), term.to_string()),
            ("page".to_string(), ticket.page.to_string()),
            ("per_page".to_string(), self.state.per_page.to_string()),
        ]);
        Some(SearchRequest {
            ticket,
            endpoint,
            params,
        })
    }

    /// Next page, appended. No-op while loading or when nothing is left.
    pub fn load_more(&mut self, term: &str) -> Option<SearchRequest> {
        if !self.is_remote() || !self.state.has_more || self.state.is_loading {
            return None;
        }
        self.state.page += 1;
        self.query(term, true)
    }

    /// Drop results and query page 1 for the current term.
    pub fn reload(&mut self, term: &str) -> Option<SearchRequest> {
        self.results.clear();
        self.state.page = 1;
        self.state.has_more = false;
        self.query(term, false)
    }

    /// Swap endpoints. In-flight responses for the old endpoint become stale.
    /// Returns a query when one should run right away.
    pub fn set_endpoint(&mut self, endpoint: Option<String>, term: &str) -> Option<SearchRequest> {
        self.settings.endpoint = endpoint.filter(|e| !e.trim().is_empty());
        self.results.clear();
        self.latest = None;
        self.state = PageState::new(self.state.per_page);
        self.phase = QueryPhase::Idle;
        if self.settings.autoload || !term.is_empty() {
            return self.query(term, false);
        }
        None
    }

    /// Apply the outcome of a fetch.
    ///
    /// Returns every option parsed from a successful response, current or
    /// stale, so the caller can feed its label cache.
    pub fn complete(
        &mut self,
        ticket: &QueryTicket,
        outcome: Result<FetchResponse, FetchError>,
        fields: &FieldMap,
    ) -> OptionMap {
        let payload = outcome
            .map_err(SelectError::from)
            .and_then(FetchResponse::into_payload);
        let options = match &payload {
            Ok(body) => normalize(extract_items(body), fields),
            Err(_) => OptionMap::new(),
        };

        if !self.is_current(ticket) {
            tracing::debug!(seq = ticket.seq, "discarding stale option response");
            return options;
        }
        self.state.is_loading = false;

        match payload {
            Ok(body) => {
                self.state.has_more = derive_has_more(&body, ticket.page, self.state.per_page);
                if !ticket.append {
                    self.results.clear();
                }
                for (key, option) in &options {
                    self.results.insert(key.clone(), option.clone());
                }
                self.phase = QueryPhase::Loaded;
                tracing::debug!(
                    seq = ticket.seq,
                    count = options.len(),
                    has_more = self.state.has_more,
                    "option query completed"
                );
            }
            Err(err) => {
                tracing::warn!(seq = ticket.seq, "option query failed: {err}");
                self.state.error_message = Some(err.user_message().to_string());
                if ticket.append {
                    self.state.page = self.state.page.saturating_sub(1).max(1);
                } else {
                    self.results.clear();
                    self.state.has_more = false;
                }
                self.phase = QueryPhase::Errored;
            }
        }
        options
    }

    /// Release the loading flag of a query whose fetch never completed.
    pub fn abandon(&mut self, ticket: &QueryTicket) {
        if self.is_current(ticket) {
            tracing::debug!(seq = ticket.seq, "option query abandoned");
            self.state.is_loading = false;
            self.latest = None;
            if ticket.append {
                self.state.page = self.state.page.saturating_sub(1).max(1);
            }
            self.phase = if self.results.is_empty() {
                QueryPhase::Idle
            } else {
                QueryPhase::Loaded
            };
        }
    }

    /// Endpoint and parameters for resolving labels of selected values.
    pub fn selected_request(&self, keys: &[OptionKey]) -> Option<(String, Vec<(String, String)>)> {
        if keys.is_empty() {
            return None;
        }
        let endpoint = self
            .settings
            .selected_endpoint
            .clone()
            .or_else(|| self.settings.endpoint.clone())?;
        let joined = keys
            .iter()
            .map(OptionKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let params = self.query_params(&[(self.settings.selected_param.clone(), joined)]);
        Some((endpoint, params))
    }

    /// Extra parameters first, then the engine's own, which win on conflict.
    fn query_params(&self, own: &[(String, String)]) -> Vec<(String, String)> {
        let mut merged = self.settings.extra_params.clone();
        for (key, value) in own {
            merged.insert(key.clone(), value.clone());
        }
        merged.into_iter().collect()
    }
}

/// An issued query whose outcome has not been applied yet.
///
/// Dropping it without calling [`PendingQuery::complete`] (for instance when
/// the fetch future is cancelled) abandons the query so the loading flag is
/// never left set.
pub struct PendingQuery<'a> {
    engine: &'a mut RemoteQueryEngine,
    ticket: QueryTicket,
    settled: bool,
}

impl<'a> PendingQuery<'a> {
    pub fn new(engine: &'a mut RemoteQueryEngine, ticket: QueryTicket) -> Self {
        Self {
            engine,
            ticket,
            settled: false,
        }
    }

    pub fn complete(
        mut self,
        outcome: Result<FetchResponse, FetchError>,
        fields: &FieldMap,
    ) -> OptionMap {
        self.settled = true;
        self.engine.complete(&self.ticket, outcome, fields)
    }
}

impl Drop for PendingQuery<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.engine.abandon(&self.ticket);
        }
    }
}

/// Locate the item list of a payload: an envelope key, or the payload itself.
pub fn extract_items(payload: &Value) -> &[Value] {
    if let Value::Array(items) = payload {
        return items;
    }
    ITEM_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Whether another page exists, from the first signal the payload offers.
pub fn derive_has_more(payload: &Value, page: u32, per_page: u32) -> bool {
    for key in ["has_more", "hasMore"] {
        if let Some(flag) = payload.get(key).filter(|v| !v.is_null()) {
            return truthy(flag);
        }
    }
    let current = payload.get("current_page").and_then(as_number);
    let last = payload.get("last_page").and_then(as_number);
    if let (Some(current), Some(last)) = (current, last) {
        return current < last;
    }
    if let Some(total) = payload.pointer("/meta/total").and_then(as_number) {
        return f64::from(page) * f64::from(per_page) < total;
    }
    false
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
