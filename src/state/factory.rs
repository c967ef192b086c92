use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{ClusterStore, InMemoryStore, SledClusterStore};
use std::sync::Arc;

/// Create a cluster store from configuration.
pub async fn create_store(config: &StateConfig) -> Result<Arc<dyn ClusterStore>> {
    match config.backend {
        StateBackend::Memory => {
            tracing::info!("Using in-memory cluster store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StateBackend::Sled => {
            let path = config.path.clone().ok_or_else(|| {
                AppError::Configuration(
                    "state.path is required for the sled backend".to_string(),
                )
            })?;
            tracing::info!(path = ?path, "Using sled cluster store");
            Ok(Arc::new(SledClusterStore::new(path)?))
        }
    }
}
