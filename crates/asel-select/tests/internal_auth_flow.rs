//! Widget and verifier talking over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use asel_auth::{
    InternalAuthConfig, InternalAuthState, InternalUser, Origin, RequestContext, TokenCodec,
    internal_authenticate,
};
use asel_select::{AsyncSelect, HttpFetcher, LOAD_FAILED_MESSAGE, SelectConfig, SelectOption};
use axum::Json;
use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;

const SECRET: &str = "integration-secret";
const USERS: [(u32, &str); 3] = [(1, "Alice"), (2, "Alan"), (3, "Bob")];

async fn users(req: Request) -> Response {
    let Some(viewer) = req.extensions().get::<InternalUser>().cloned() else {
        return (StatusCode::UNAUTHORIZED, "login required").into_response();
    };
    let mut search = String::new();
    let mut selected = Vec::new();
    for (key, value) in url::form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes()) {
        match &*key {
            "search" => search = value.to_lowercase(),
            "selected" => selected = value.split(',').map(str::to_string).collect(),
            _ => {}
        }
    }
    let data: Vec<_> = USERS
        .iter()
        .filter(|(id, name)| {
            if selected.is_empty() {
                name.to_lowercase().contains(&search)
            } else {
                selected.contains(&id.to_string())
            }
        })
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();
    Json(json!({"data": data, "has_more": false, "viewer": viewer.uid})).into_response()
}

async fn spawn_app() -> Option<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
    let addr = listener.local_addr().ok()?;
    let state = InternalAuthState::new(TokenCodec::new(InternalAuthConfig::new(SECRET)));
    let app = Router::new()
        .route("/api/users", get(users))
        .layer(from_fn_with_state(state, internal_authenticate));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Some(addr)
}

fn widget(addr: SocketAddr, endpoint: &str, secret: &str) -> AsyncSelect<HttpFetcher> {
    let config = SelectConfig::default()
        .endpoint(endpoint)
        .multiple(true)
        .internal(InternalAuthConfig::new(secret))
        .request_timeout(Duration::from_secs(5));
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let origin = Origin::parse(&format!("http://{addr}"));
    AsyncSelect::new(config, fetcher).with_context(RequestContext::new(origin, Some("42".into())))
}

fn labels(options: &[SelectOption]) -> Vec<String> {
    options.iter().map(|o| o.label.clone()).collect()
}

#[tokio::test]
async fn same_origin_search_is_authenticated_by_token() {
    let Some(addr) = spawn_app().await else {
        eprintln!("skipping same_origin_search_is_authenticated_by_token: loopback bind not permitted");
        return;
    };
    let mut select = widget(addr, "/api/users", SECRET);

    select.set_search("al").await;
    assert_eq!(select.error_message(), None);
    assert_eq!(labels(&select.display_options()), vec!["Alice", "Alan"]);

    // Every request carries a fresh nonce, so repeating a search is not a replay.
    select.set_search("bo").await;
    assert_eq!(select.error_message(), None);
    assert_eq!(labels(&select.display_options()), vec!["Bob"]);
}

#[tokio::test]
async fn selected_labels_are_fetched_with_a_token() {
    let Some(addr) = spawn_app().await else {
        eprintln!("skipping selected_labels_are_fetched_with_a_token: loopback bind not permitted");
        return;
    };
    let mut select = widget(addr, "/api/users", SECRET).with_value(&json!([3, 1]));
    select.mount().await;
    assert_eq!(labels(&select.selected_options()), vec!["Bob", "Alice"]);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let Some(addr) = spawn_app().await else {
        eprintln!("skipping wrong_secret_is_rejected: loopback bind not permitted");
        return;
    };
    let mut select = widget(addr, "/api/users", "not-the-secret");

    select.set_search("al").await;
    assert_eq!(select.error_message(), Some(LOAD_FAILED_MESSAGE));
    assert!(select.display_options().is_empty());
}

#[tokio::test]
async fn cross_origin_endpoint_gets_no_token() {
    let Some(addr) = spawn_app().await else {
        eprintln!("skipping cross_origin_endpoint_gets_no_token: loopback bind not permitted");
        return;
    };
    let config = SelectConfig::default()
        .endpoint(format!("http://{addr}/api/users"))
        .internal(InternalAuthConfig::new(SECRET));
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let mut select = AsyncSelect::new(config, fetcher).with_context(RequestContext::new(
        Origin::parse("http://app.test"),
        Some("42".into()),
    ));

    select.set_search("al").await;
    assert_eq!(select.error_message(), Some(LOAD_FAILED_MESSAGE));
}
