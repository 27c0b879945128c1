use enterprise::catalog::{CatalogApiClient, CatalogService, ResponseCache};
use enterprise::channels::{HttpChannelClients, TransmissionOrchestrator};
use enterprise::config::AppConfig;
use enterprise::consent::{ConsentPolicyEngine, ConsentService};
use enterprise::error::AppError;
use enterprise::store::SnapshotStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Storage and catalog access shared by the server and the batch commands.
pub(crate) struct Backends {
    pub(crate) store: Arc<SnapshotStore>,
    pub(crate) catalog: Arc<dyn CatalogService>,
}

impl Backends {
    pub(crate) fn open(config: &AppConfig) -> Result<Self, AppError> {
        let store = match &config.store.path {
            Some(path) => {
                info!(path = %path.display(), "opening enterprise snapshot store");
                SnapshotStore::open(path)?
            }
            None => {
                warn!("ENTERPRISE_STORE_PATH not set; state is kept in memory only");
                SnapshotStore::in_memory()
            }
        };
        let store = Arc::new(store);

        let catalog: Arc<dyn CatalogService> = match &config.catalog.api_url {
            Some(url) => Arc::new(CatalogApiClient::new(
                url.clone(),
                config.catalog.api_token.clone(),
                Arc::new(ResponseCache::new(config.catalog.cache_ttl)),
            )),
            None => {
                info!("CATALOG_API_URL not set; answering catalog queries from the snapshot store");
                store.clone()
            }
        };

        Ok(Self { store, catalog })
    }

    #[cfg(test)]
    pub(crate) fn from_store(store: Arc<SnapshotStore>) -> Self {
        Self {
            catalog: store.clone(),
            store,
        }
    }

    pub(crate) fn consent_engine(&self) -> ConsentPolicyEngine {
        ConsentPolicyEngine::new(self.store.clone(), self.store.clone(), self.catalog.clone())
    }

    pub(crate) fn consent_service(&self) -> ConsentService {
        ConsentService::new(self.consent_engine())
    }

    pub(crate) fn orchestrator(&self, config: &AppConfig) -> TransmissionOrchestrator {
        TransmissionOrchestrator::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.catalog.clone(),
            self.consent_engine(),
            Arc::new(HttpChannelClients::new(config.channels.clone())),
            config.channels.clone(),
        )
    }
}
