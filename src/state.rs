use crate::error::{StartupError, StartupResult};
use exn::ResultExt;
use std::sync::Arc;
use strata_config::Config;
use strata_index::IndexHandle;
use strata_render::Renderer;
use strata_storage::{StoreHandle, TieredStore};

/// Everything a handler needs, built once at startup and shared by
/// reference.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub index: IndexHandle,
    pub renderer: Arc<Renderer>,
    /// Leading part of every file URL, starting and ending with `/`.
    pub download_prefix: Arc<str>,
    /// Backend URL embedded in the listing page.
    pub public_url: Arc<str>,
}

impl AppState {
    pub fn new(
        store: StoreHandle,
        index: IndexHandle,
        renderer: Renderer,
        download_prefix: impl Into<Arc<str>>,
        public_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            index,
            renderer: Arc::new(renderer),
            download_prefix: download_prefix.into(),
            public_url: public_url.into(),
        }
    }

    /// Open the index, set up the tiered store and compile the listing page.
    pub async fn from_config(config: &Config) -> StartupResult<Self> {
        let store = TieredStore::new(&config.storage.low_dir, &config.storage.deep_dir, config.storage.bundle_format)
            .or_raise(|| StartupError("storage"))?;
        let index = strata_index::open(config.index.backend, &config.index.path)
            .await
            .or_raise(|| StartupError("metadata index"))?;
        let renderer = Renderer::new().or_raise(|| StartupError("listing page"))?;
        tracing::info!(
            low = %store.root(strata_storage::Tier::Low).display(),
            deep = %store.root(strata_storage::Tier::Deep).display(),
            bundle_format = %store.bundle_format(),
            "Storage tiers ready"
        );
        Ok(Self::new(
            Arc::new(store),
            index,
            renderer,
            config.download_prefix.as_str(),
            config.public_url(),
        ))
    }
}
