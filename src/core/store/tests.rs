use super::*;
use crate::core::storage::{BlobStore, MemoryBlobStore, STORAGE_KEY};
use crate::utils::test_utils::{spawn_http_stub, HttpStub, StubResponse};
use chrono::Duration;
use std::io;
use std::sync::Arc;
use std::time::Duration as StdDuration;

const CATALOG_BODY: &str = r#"{"data":[
    {"id":"openai/gpt-4o","name":"OpenAI: GPT-4o","context_length":128000},
    {"id":"google/gemini-2.5-flash-image","name":"Google: Gemini 2.5 Flash Image"}
]}"#;

struct SharedBlobs(Arc<MemoryBlobStore>);

impl BlobStore for SharedBlobs {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        self.0.read(key)
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        self.0.write(key, contents)
    }
}

fn store_with(base_url: &str, blobs: &Arc<MemoryBlobStore>) -> OpenRouterStore {
    let settings = StoreSettings {
        base_url: base_url.to_string(),
        ..StoreSettings::default()
    };
    OpenRouterStore::new(
        settings,
        CatalogStorage::new(Box::new(SharedBlobs(Arc::clone(blobs)))),
    )
}

fn seed(blobs: &MemoryBlobStore, state: &PersistedState) {
    blobs
        .write(STORAGE_KEY, &serde_json::to_string(state).expect("serialize"))
        .expect("seed write");
}

fn persisted(blobs: &MemoryBlobStore) -> PersistedState {
    let raw = blobs.read(STORAGE_KEY).expect("read").expect("present");
    serde_json::from_str(&raw).expect("persisted JSON parses")
}

#[test]
fn settings_from_config_apply_defaults() {
    let settings = StoreSettings::from_config(&Config::default());
    assert_eq!(settings, StoreSettings::default());
    assert_eq!(settings.base_url, "https://openrouter.ai/api/v1");
    assert_eq!(settings.app_title, "OpenCreator");

    let config = Config {
        base_url: Some("http://localhost:4000/v1/".to_string()),
        app_title: Some("  ".to_string()),
        referer: Some("https://studio.example".to_string()),
        ..Default::default()
    };
    let settings = StoreSettings::from_config(&config);
    assert_eq!(settings.base_url, "http://localhost:4000/v1");
    assert_eq!(settings.app_title, "OpenCreator");
    assert_eq!(settings.referer.as_deref(), Some("https://studio.example"));
}

#[tokio::test]
async fn fetch_replaces_catalog_and_persists() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with(&stub.base_url, &blobs);

    let before = Utc::now();
    store.fetch_models().await;
    let after = Utc::now();

    let ids: Vec<String> = store.models().await.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["openai/gpt-4o", "google/gemini-2.5-flash-image"]);
    let fetched = store.last_fetched().await.expect("timestamp set");
    assert!(fetched >= before && fetched <= after);
    assert!(!store.is_loading().await);
    assert_eq!(store.last_error().await, None);

    let saved = persisted(&blobs);
    assert_eq!(saved.models, store.models().await);
    assert_eq!(saved.last_fetched, Some(fetched));
}

#[tokio::test]
async fn fetch_failure_keeps_previous_catalog() {
    let stub = spawn_http_stub(vec![
        StubResponse::json(200, CATALOG_BODY),
        StubResponse::json(500, "upstream exploded"),
        StubResponse::json(200, r#"{"unexpected":true}"#),
    ])
    .await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with(&stub.base_url, &blobs);

    store.fetch_models().await;
    let original = store.models().await;
    let original_fetch = store.last_fetched().await;

    store.fetch_models().await;
    let message = store.last_error().await.expect("error recorded");
    assert!(message.contains("500"), "message: {message}");
    assert_eq!(store.models().await, original);
    assert_eq!(store.last_fetched().await, original_fetch);
    assert!(!store.is_loading().await);

    store.fetch_models().await;
    assert!(store.last_error().await.is_some());
    assert_eq!(store.models().await, original);
}

#[tokio::test]
async fn successful_fetch_clears_previous_error() {
    let stub = spawn_http_stub(vec![
        StubResponse::json(502, "bad gateway"),
        StubResponse::json(200, CATALOG_BODY),
    ])
    .await;
    let store = store_with(&stub.base_url, &Arc::new(MemoryBlobStore::new()));

    store.fetch_models().await;
    assert!(store.last_error().await.is_some());
    assert!(!store.has_models().await);

    store.fetch_models().await;
    assert_eq!(store.last_error().await, None);
    assert!(store.has_models().await);
}

#[tokio::test]
async fn initialize_uses_fresh_cache_without_network() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    seed(
        &blobs,
        &PersistedState {
            models: vec![Model::new("cached/model", Some("Cached"))],
            last_fetched: Some(Utc::now() - Duration::hours(3)),
            api_key: "sk-or-cached".to_string(),
        },
    );
    let store = store_with(&stub.base_url, &blobs);

    store.initialize().await;

    assert_eq!(store.model_names().await, vec!["Cached"]);
    assert_eq!(store.api_key().await, "sk-or-cached");
    assert!(stub.requests().await.is_empty());
}

#[tokio::test]
async fn initialize_fetches_when_cache_is_stale() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    seed(
        &blobs,
        &PersistedState {
            models: vec![Model::new("cached/model", None)],
            last_fetched: Some(Utc::now() - Duration::days(3)),
            api_key: "sk-or-cached".to_string(),
        },
    );
    let store = store_with(&stub.base_url, &blobs);

    store.initialize().await;

    assert_eq!(stub.requests().await.len(), 1);
    assert_eq!(store.models().await.len(), 2);
    assert_eq!(store.api_key().await, "sk-or-cached");
    assert_eq!(persisted(&blobs).api_key, "sk-or-cached");
}

#[tokio::test]
async fn initialize_fetches_when_storage_is_empty_or_corrupt() {
    for stored in [None, Some("{definitely not json")] {
        let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
        let blobs = Arc::new(MemoryBlobStore::new());
        if let Some(raw) = stored {
            blobs.write(STORAGE_KEY, raw).expect("seed");
        }
        let store = store_with(&stub.base_url, &blobs);

        store.initialize().await;

        assert_eq!(stub.requests().await.len(), 1);
        assert!(store.has_models().await);
        assert_eq!(store.api_key().await, "");
    }
}

#[tokio::test]
async fn refresh_models_always_fetches() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    seed(
        &blobs,
        &PersistedState {
            models: vec![Model::new("cached/model", None)],
            last_fetched: Some(Utc::now()),
            api_key: String::new(),
        },
    );
    let store = store_with(&stub.base_url, &blobs);
    store.initialize().await;
    assert!(stub.requests().await.is_empty());

    store.refresh_models().await;

    assert_eq!(stub.requests().await.len(), 1);
    assert!(store.get_model_by_id("openai/gpt-4o").await.is_some());
    assert!(store.get_model_by_id("cached/model").await.is_none());
}

#[tokio::test]
async fn set_api_key_trims_and_persists() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = store_with("http://127.0.0.1:9", &blobs);

    store.set_api_key("  sk-or-new \n").await.expect("persist");
    assert_eq!(store.api_key().await, "sk-or-new");
    assert_eq!(persisted(&blobs).api_key, "sk-or-new");

    store.set_api_key("").await.expect("persist");
    assert_eq!(persisted(&blobs).api_key, "");
}

#[tokio::test]
async fn storage_round_trip_through_a_second_store() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let first = store_with(&stub.base_url, &blobs);
    first.set_api_key("sk-or-keep").await.expect("persist");
    first.fetch_models().await;

    let second = store_with(&stub.base_url, &blobs);
    assert!(second.load_from_storage().await);

    assert_eq!(second.models().await, first.models().await);
    assert_eq!(second.last_fetched().await, first.last_fetched().await);
    assert_eq!(second.api_key().await, "sk-or-keep");
}

#[tokio::test]
async fn lookups_by_name_and_id() {
    let stub = spawn_http_stub(vec![StubResponse::json(200, CATALOG_BODY)]).await;
    let store = store_with(&stub.base_url, &Arc::new(MemoryBlobStore::new()));
    store.fetch_models().await;

    let by_name = store
        .get_model_by_name("openai: gpt-4o")
        .await
        .expect("case-insensitive name match");
    assert_eq!(by_name.id, "openai/gpt-4o");
    assert_eq!(
        by_name.metadata.get("context_length"),
        Some(&serde_json::json!(128000))
    );
    assert!(store.get_model_by_name("gpt-4o").await.is_none());
}

async fn wait_for_requests(stub: &HttpStub, count: usize) {
    while stub.requests().await.len() < count {
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn concurrent_fetches_are_serialized() {
    let stub = spawn_http_stub(vec![
        StubResponse::json(500, "slow failure").delayed(StdDuration::from_millis(200)),
        StubResponse::json(200, r#"{"data":[{"id":"second/model"}]}"#),
    ])
    .await;
    let store = Arc::new(store_with(&stub.base_url, &Arc::new(MemoryBlobStore::new())));

    let first = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.fetch_models().await }
    });
    wait_for_requests(&stub, 1).await;
    let second = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.fetch_models().await }
    });
    first.await.expect("first fetch joins");
    second.await.expect("second fetch joins");

    // The second fetch starts only after the failed first one finished, so
    // it clears that failure and its catalog is the one kept.
    assert_eq!(stub.requests().await.len(), 2);
    assert_eq!(store.last_error().await, None);
    let ids: Vec<String> = store.models().await.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["second/model"]);
}

#[tokio::test]
async fn dropped_fetch_clears_loading_flag() {
    let stub = spawn_http_stub(vec![
        StubResponse::json(200, CATALOG_BODY).delayed(StdDuration::from_secs(5)),
    ])
    .await;
    let store = Arc::new(store_with(&stub.base_url, &Arc::new(MemoryBlobStore::new())));

    let fetch = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.fetch_models().await }
    });
    wait_for_requests(&stub, 1).await;
    assert!(store.is_loading().await);

    fetch.abort();
    let _ = fetch.await;

    assert!(!store.is_loading().await);
    assert!(!store.has_models().await);
}

#[tokio::test]
async fn store_mediates_model_selection() {
    let store = Arc::new(store_with("http://127.0.0.1:9", &Arc::new(MemoryBlobStore::new())));
    let waiter = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.select_models(SelectionRequest::multi()).await }
    });

    let mut rx = store.selector().subscribe();
    rx.wait_for(Option::is_some).await.expect("selector alive");

    assert!(store.confirm_model_selection(vec!["m1".to_string(), "m2".to_string()]));
    assert_eq!(
        waiter.await.expect("joins"),
        Ok(Some(Selection::Multi(vec!["m1".to_string(), "m2".to_string()])))
    );
    assert!(!store.close_model_selector());
}
