//! End-to-end webhook and renewal flows against the full router.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use darkroom_core::{CacheTag, WatchSubscription};
use darkroom_drive::{DriveClient, StaticTokenProvider};
use darkroom_store::{MemoryWatchStore, StoreResult, WatchStore};
use darkroom_server::{AppConfig, AppState, TagCache, build_app};

const DEBOUNCE_MS: u64 = 100;

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.base_url = Some("https://darkroom.example".into());
    cfg.watch.renew_secret = "sweep-secret".into();
    cfg.watch.debounce_ms = DEBOUNCE_MS;
    cfg
}

fn build_state(
    store: Arc<dyn WatchStore>,
    drive_url: &str,
    tokens: StaticTokenProvider,
) -> (Router, AppState, Arc<TagCache>) {
    let cache = Arc::new(TagCache::new_local());
    let state = AppState::new(
        Arc::new(test_config()),
        Arc::clone(&cache),
        store,
        Arc::new(DriveClient::new(drive_url)),
        Arc::new(tokens),
    );
    (build_app(state.clone()), state, cache)
}

fn subscription(channel_id: &str, folder_id: &str) -> WatchSubscription {
    WatchSubscription {
        user_id: Uuid::new_v4(),
        folder_id: folder_id.into(),
        gallery_id: Uuid::new_v4(),
        channel_id: channel_id.into(),
        resource_id: "res-1".into(),
        expires_at: OffsetDateTime::now_utc() + time::Duration::days(7),
    }
}

fn webhook_request(channel_id: Option<&str>, resource_state: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/hooks/drive");
    if let Some(channel_id) = channel_id {
        builder = builder.header("x-goog-channel-id", channel_id);
    }
    if let Some(state) = resource_state {
        builder = builder.header("x-goog-resource-state", state);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store wrapper counting channel lookups, to prove filtered events never
/// reach the registry.
struct CountingStore {
    inner: MemoryWatchStore,
    channel_lookups: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryWatchStore::new(),
            channel_lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WatchStore for CountingStore {
    async fn upsert(&self, subscription: &WatchSubscription) -> StoreResult<()> {
        self.inner.upsert(subscription).await
    }

    async fn find_by_folder(
        &self,
        user_id: Uuid,
        folder_id: &str,
    ) -> StoreResult<Option<WatchSubscription>> {
        self.inner.find_by_folder(user_id, folder_id).await
    }

    async fn find_by_channel(&self, channel_id: &str) -> StoreResult<Option<WatchSubscription>> {
        self.channel_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_channel(channel_id).await
    }

    async fn find_expiring_before(
        &self,
        threshold: OffsetDateTime,
    ) -> StoreResult<Vec<WatchSubscription>> {
        self.inner.find_expiring_before(threshold).await
    }
}

#[tokio::test]
async fn webhook_update_event_invalidates_after_quiet_period() {
    let store = Arc::new(MemoryWatchStore::new());
    let sub = subscription("c1", "f1");
    store.upsert(&sub).await.unwrap();

    let (app, _state, cache) =
        build_state(Arc::clone(&store) as Arc<dyn WatchStore>, "http://drive.invalid", StaticTokenProvider::default());

    cache
        .set(
            "photos:f1",
            b"listing".to_vec(),
            Duration::from_secs(60),
            &[CacheTag::drive_photos("f1")],
        )
        .await;
    cache
        .set(
            "listing:g1",
            b"gallery".to_vec(),
            Duration::from_secs(60),
            &[CacheTag::gallery_tags(sub.gallery_id)],
        )
        .await;

    let res = app
        .clone()
        .oneshot(webhook_request(Some("c1"), Some("update")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, serde_json::json!({"ok": true}));

    // The acknowledgment is decoupled from the eviction: right after the
    // response the entries are still there.
    assert!(cache.get("photos:f1").await.is_some());

    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 4)).await;

    assert!(cache.get("photos:f1").await.is_none());
    assert!(cache.get("listing:g1").await.is_none());
}

#[tokio::test]
async fn webhook_burst_holds_invalidation_until_last_event_settles() {
    let store = Arc::new(MemoryWatchStore::new());
    store.upsert(&subscription("c1", "f1")).await.unwrap();

    let (app, _state, cache) =
        build_state(store, "http://drive.invalid", StaticTokenProvider::default());

    cache
        .set(
            "photos:f1",
            b"listing".to_vec(),
            Duration::from_secs(60),
            &[CacheTag::drive_photos("f1")],
        )
        .await;

    app.clone()
        .oneshot(webhook_request(Some("c1"), Some("add")))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3 / 4)).await;
    app.clone()
        .oneshot(webhook_request(Some("c1"), Some("add")))
        .await
        .unwrap();

    // The first event's timer would have fired by now; the second event
    // restarted the quiet period, so the entry must still be cached.
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3 / 4)).await;
    assert!(cache.get("photos:f1").await.is_some());

    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 2)).await;
    assert!(cache.get("photos:f1").await.is_none());
}

#[tokio::test]
async fn webhook_sync_event_is_acknowledged_without_lookups() {
    let store = Arc::new(CountingStore::new());
    store.upsert(&subscription("c1", "f1")).await.unwrap();

    let (app, _state, cache) = build_state(
        Arc::clone(&store) as Arc<dyn WatchStore>,
        "http://drive.invalid",
        StaticTokenProvider::default(),
    );

    cache
        .set(
            "photos:f1",
            b"listing".to_vec(),
            Duration::from_secs(60),
            &[CacheTag::drive_photos("f1")],
        )
        .await;

    let res = app
        .clone()
        .oneshot(webhook_request(Some("c1"), Some("sync")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, serde_json::json!({"ok": true}));

    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3)).await;
    assert_eq!(store.channel_lookups.load(Ordering::SeqCst), 0);
    assert!(cache.get("photos:f1").await.is_some());
}

#[tokio::test]
async fn webhook_unrecognized_state_and_missing_headers_are_dropped_before_lookup() {
    let store = Arc::new(CountingStore::new());
    let (app, _state, _cache) = build_state(
        Arc::clone(&store) as Arc<dyn WatchStore>,
        "http://drive.invalid",
        StaticTokenProvider::default(),
    );

    for req in [
        webhook_request(Some("c1"), Some("exists")),
        webhook_request(Some("c1"), None),
        webhook_request(None, Some("update")),
        webhook_request(None, None),
    ] {
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, serde_json::json!({"ok": true}));
    }

    assert_eq!(store.channel_lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn webhook_unknown_channel_is_a_no_op() {
    let store = Arc::new(MemoryWatchStore::new());
    let (app, state, cache) =
        build_state(store, "http://drive.invalid", StaticTokenProvider::default());

    cache
        .set(
            "photos:f1",
            b"listing".to_vec(),
            Duration::from_secs(60),
            &[CacheTag::drive_photos("f1")],
        )
        .await;

    let res = app
        .oneshot(webhook_request(Some("stale-channel"), Some("update")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3)).await;
    assert!(cache.get("photos:f1").await.is_some());
    assert_eq!(state.debouncer.pending_len(), 0);
}

#[tokio::test]
async fn renew_endpoint_requires_bearer_secret() {
    let store = Arc::new(MemoryWatchStore::new());
    let (app, _state, _cache) =
        build_state(store, "http://drive.invalid", StaticTokenProvider::default());

    // Both accepted methods enforce the secret.
    let unauthenticated = Request::builder()
        .method("GET")
        .uri("/tasks/renew-watches")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(unauthenticated).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let wrong_secret = Request::builder()
        .method("POST")
        .uri("/tasks/renew-watches")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(wrong_secret).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn renew_endpoint_reports_sweep_summary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files/f-soon/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "echo",
            "resourceId": "res-renewed",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/stop"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let user_with_token = Uuid::new_v4();
    let user_without_token = Uuid::new_v4();

    let store = Arc::new(MemoryWatchStore::new());
    let mut soon = subscription("c-soon", "f-soon");
    soon.user_id = user_with_token;
    soon.expires_at = OffsetDateTime::now_utc() + time::Duration::hours(2);
    store.upsert(&soon).await.unwrap();

    let mut revoked = subscription("c-revoked", "f-revoked");
    revoked.user_id = user_without_token;
    revoked.expires_at = OffsetDateTime::now_utc() + time::Duration::hours(3);
    store.upsert(&revoked).await.unwrap();

    let (app, _state, _cache) = build_state(
        Arc::clone(&store) as Arc<dyn WatchStore>,
        &server.uri(),
        StaticTokenProvider::default().with_token(user_with_token, "tok"),
    );

    // Plain GET, the way a cron pinger calls it.
    let req = Request::builder()
        .method("GET")
        .uri("/tasks/renew-watches")
        .header("authorization", "Bearer sweep-secret")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    assert_eq!(body["renewed"], 1);
    assert_eq!(body["failures"].as_array().unwrap().len(), 1);
    assert_eq!(body["failures"][0]["folderId"], "f-revoked");

    // POST reaches the same sweep; the second run has nothing left to renew.
    let req = Request::builder()
        .method("POST")
        .uri("/tasks/renew-watches")
        .header("authorization", "Bearer sweep-secret")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["renewed"], 0);

    // The renewed subscription runs under a fresh channel.
    let renewed = store
        .find_by_folder(user_with_token, "f-soon")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(renewed.channel_id, "c-soon");
    assert_eq!(renewed.resource_id, "res-renewed");
}

#[tokio::test]
async fn health_and_info_endpoints_respond() {
    let store = Arc::new(MemoryWatchStore::new());
    let (app, _state, _cache) =
        build_state(store, "http://drive.invalid", StaticTokenProvider::default());

    for uri in ["/", "/healthz", "/readyz"] {
        let res = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "GET {uri}");
    }

    let res = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(res).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["cache"]["mode"], "local");
}
