//! Option resolution and selection engine for an async select widget.
//!
//! Options come either from a local list or from a paginated remote search
//! endpoint. Everything seen is cached by value so selected values keep
//! their labels across searches, and same-origin requests are signed with an
//! internal token from `asel-auth`.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod option;
pub mod remote;
pub mod select;
pub mod selection;
pub mod view;

pub use cache::{LabelOverride, OptionCache, ValueLabels, parse_value_labels};
pub use config::{SelectConfig, SelectDefaults, UiTheme};
pub use error::{FetchError, SelectError};
pub use fetch::{FetchRequest, FetchResponse, HttpFetcher, OptionFetcher};
pub use normalize::{FieldMap, flatten_local, normalize, normalize_item};
pub use option::{OptionKey, OptionMap, RawValue, SelectOption};
pub use remote::{
    LOAD_FAILED_MESSAGE, NETWORK_ERROR_MESSAGE, PageState, PendingQuery, QueryPhase, QueryTicket,
    RemoteQueryEngine, RemoteSettings, SearchRequest, derive_has_more, extract_items,
};
pub use select::AsyncSelect;
pub use selection::{SelectOutcome, Selection, SelectionStore};
pub use view::{GroupedOptions, filter_local, group_options};
