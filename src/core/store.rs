//! The OpenRouter store: catalog cache, credential, and model selection.
//!
//! One [`OpenRouterStore`] is built at startup and shared (usually behind an
//! `Arc`) with everything that needs the catalog or issues requests. Nothing
//! happens on construction; the owner calls [`OpenRouterStore::initialize`]
//! once to restore persisted data and refresh a stale catalog.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::api::models::{display_names, fetch_models, find_by_id, find_by_name};
use crate::api::Model;
use crate::core::catalog::Catalog;
use crate::core::config::Config;
use crate::core::error::StoreError;
use crate::core::selection::{ModelSelector, Selection, SelectionError, SelectionRequest};
use crate::core::storage::{CatalogStorage, PersistedState, StorageError};
use crate::utils::url::resolve_base_url;

pub const DEFAULT_APP_TITLE: &str = "OpenCreator";

/// Connection settings for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub base_url: String,
    pub app_title: String,
    pub referer: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: resolve_base_url(None),
            app_title: DEFAULT_APP_TITLE.to_string(),
            referer: None,
        }
    }
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Self {
        let app_title = config
            .app_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_APP_TITLE)
            .to_string();
        let referer = config
            .referer
            .as_deref()
            .map(str::trim)
            .filter(|referer| !referer.is_empty())
            .map(str::to_string);

        Self {
            base_url: resolve_base_url(config.base_url.as_deref()),
            app_title,
            referer,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    catalog: Catalog,
    api_key: String,
    error: Option<String>,
}

impl StoreState {
    fn snapshot(&self) -> PersistedState {
        PersistedState {
            models: self.catalog.models().to_vec(),
            last_fetched: self.catalog.last_fetched(),
            api_key: self.api_key.clone(),
        }
    }
}

pub struct OpenRouterStore {
    http: reqwest::Client,
    settings: StoreSettings,
    storage: CatalogStorage,
    state: RwLock<StoreState>,
    is_loading: AtomicBool,
    // Catalog fetches run one at a time so the last response is the one
    // that sticks.
    fetch_gate: Mutex<()>,
    selector: ModelSelector,
}

impl OpenRouterStore {
    pub fn new(settings: StoreSettings, storage: CatalogStorage) -> Self {
        Self::with_client(reqwest::Client::new(), settings, storage)
    }

    pub fn with_client(
        http: reqwest::Client,
        settings: StoreSettings,
        storage: CatalogStorage,
    ) -> Self {
        Self {
            http,
            settings,
            storage,
            state: RwLock::new(StoreState::default()),
            is_loading: AtomicBool::new(false),
            fetch_gate: Mutex::new(()),
            selector: ModelSelector::new(),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Restore persisted data, then fetch the catalog unless the restored
    /// copy is still fresh.
    pub async fn initialize(&self) {
        let loaded = self.load_from_storage().await;

        if loaded && !self.should_refresh().await {
            info!("Using cached OpenRouter data from storage");
            return;
        }

        info!("Fetching fresh OpenRouter models");
        self.fetch_models().await;
    }

    /// Replace the in-memory state with the persisted copy. Returns `false`
    /// when there was nothing usable to load.
    pub async fn load_from_storage(&self) -> bool {
        let Some(persisted) = self.storage.load() else {
            return false;
        };

        let mut state = self.state.write().await;
        state.catalog = Catalog::new(persisted.models, persisted.last_fetched);
        state.api_key = persisted.api_key;
        true
    }

    /// Fetch the catalog and replace the cached one.
    ///
    /// Failures never propagate: the message lands in [`Self::last_error`]
    /// and the previous catalog is kept.
    pub async fn fetch_models(&self) {
        let _gate = self.fetch_gate.lock().await;
        let _loading = LoadingGuard::start(&self.is_loading);
        self.state.write().await.error = None;

        let result = fetch_models(&self.http, &self.settings.base_url, &self.settings.app_title).await;

        let mut state = self.state.write().await;
        match result {
            Ok(response) => {
                info!(count = response.data.len(), "fetched OpenRouter models");
                state.catalog.replace(response.data, Utc::now());
                if let Err(err) = self.storage.save(&state.snapshot()) {
                    warn!(error = %err, "failed to persist OpenRouter models");
                }
            }
            Err(err) => {
                error!(error = %err, "error fetching OpenRouter models");
                state.error = Some(err.to_string());
            }
        }
    }

    /// Force a refetch regardless of catalog age.
    pub async fn refresh_models(&self) {
        self.state.write().await.catalog.invalidate();
        self.fetch_models().await;
    }

    /// Store a new API key (trimmed) and persist it. An empty key logs the
    /// store out.
    pub async fn set_api_key(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.api_key = key.trim().to_string();
        info!(configured = !state.api_key.is_empty(), "OpenRouter API key updated");
        self.storage.save(&state.snapshot())
    }

    pub async fn api_key(&self) -> String {
        self.state.read().await.api_key.clone()
    }

    pub(crate) async fn require_api_key(&self) -> Result<String, StoreError> {
        let api_key = self.api_key().await;
        if api_key.is_empty() {
            return Err(StoreError::AuthenticationMissing);
        }
        Ok(api_key)
    }

    pub async fn models(&self) -> Vec<Model> {
        self.state.read().await.catalog.models().to_vec()
    }

    pub async fn model_names(&self) -> Vec<String> {
        display_names(self.state.read().await.catalog.models())
    }

    pub async fn has_models(&self) -> bool {
        !self.state.read().await.catalog.models().is_empty()
    }

    pub async fn get_model_by_id(&self, model_id: &str) -> Option<Model> {
        find_by_id(self.state.read().await.catalog.models(), model_id).cloned()
    }

    pub async fn get_model_by_name(&self, model_name: &str) -> Option<Model> {
        find_by_name(self.state.read().await.catalog.models(), model_name).cloned()
    }

    pub async fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.catalog.last_fetched()
    }

    pub async fn should_refresh(&self) -> bool {
        self.state.read().await.catalog.should_refresh(Utc::now())
    }

    pub async fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::Acquire)
    }

    /// Message from the most recent failed catalog fetch, cleared when the
    /// next fetch starts.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub async fn select_models(
        &self,
        request: SelectionRequest,
    ) -> Result<Option<Selection>, SelectionError> {
        self.selector.select_models(request).await
    }

    pub fn confirm_model_selection(&self, selected: Vec<String>) -> bool {
        self.selector.confirm_model_selection(selected)
    }

    pub fn close_model_selector(&self) -> bool {
        self.selector.close_model_selector()
    }
}

/// Holds the loading flag up for the life of a fetch, including one whose
/// future is dropped mid-request.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests;
