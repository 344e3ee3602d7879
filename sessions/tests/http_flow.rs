use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use gemini_sessions::config::AppConfig;
use gemini_sessions::http_server::{router, AppState, FlashesResponse, VisitsResponse};
use gemini_sessions::session::InMemorySessionStore;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

fn app(store: Arc<InMemorySessionStore>) -> axum::Router {
    router(AppState::new(AppConfig::default(), store))
}

async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The `name=value` part of the session cookie set on the response
fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn visits_persist_across_requests() {
    let store = Arc::new(InMemorySessionStore::new());

    let response = app(store.clone()).oneshot(get("/visits", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    assert!(cookie.starts_with("session="));
    let body: VisitsResponse = json_body(response).await;
    assert_eq!(body.visits, 1);
    assert!(body.is_new);

    let response = app(store.clone())
        .oneshot(get("/visits", Some(&cookie)))
        .await
        .unwrap();
    let body: VisitsResponse = json_body(response).await;
    assert_eq!(body.visits, 2);
    assert!(!body.is_new);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn unknown_session_id_starts_fresh() {
    let store = Arc::new(InMemorySessionStore::new());

    let response = app(store.clone())
        .oneshot(get("/visits", Some("session=stale-id")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(session_cookie(&response), "session=stale-id");
    let body: VisitsResponse = json_body(response).await;
    assert_eq!(body.visits, 1);
}

#[tokio::test]
async fn flashes_are_delivered_once() {
    let store = Arc::new(InMemorySessionStore::new());

    let request = Request::builder()
        .method("POST")
        .uri("/flash")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"message":"saved"}"#))
        .unwrap();
    let response = app(store.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let cookie = session_cookie(&response);

    let response = app(store.clone())
        .oneshot(get("/flash", Some(&cookie)))
        .await
        .unwrap();
    let body: FlashesResponse = json_body(response).await;
    assert_eq!(body.flashes, vec![serde_json::json!("saved")]);

    let response = app(store.clone())
        .oneshot(get("/flash", Some(&cookie)))
        .await
        .unwrap();
    let body: FlashesResponse = json_body(response).await;
    assert!(body.flashes.is_empty());
}

#[tokio::test]
async fn health_does_not_touch_sessions() {
    let store = Arc::new(InMemorySessionStore::new());

    let response = app(store.clone()).oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(store.is_empty());
}
