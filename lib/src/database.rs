// lib/src/database.rs
use std::sync::Arc;

use log::{info, warn};

use crate::auth::{AuthGate, TokenSigner};
use crate::config::ClinicConfig;
use crate::services::{IdentityService, StatsService, VisitService};
use crate::storage_engine::{create_storage, ClinicStorageEngine};
use models::errors::ClinicResult;

/// One store plus every service wired to it. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ClinicDatabase {
    pub storage: Arc<dyn ClinicStorageEngine>,
    pub gate: AuthGate,
    pub identity: IdentityService,
    pub visits: VisitService,
    pub stats: StatsService,
}

impl ClinicDatabase {
    /// Opens the configured engine and builds the services on top of it.
    pub async fn new(config: &ClinicConfig) -> ClinicResult<Self> {
        let storage = create_storage(&config.storage).await?;
        Ok(Self::with_storage(storage, config))
    }

    pub fn with_storage(storage: Arc<dyn ClinicStorageEngine>, config: &ClinicConfig) -> Self {
        let signer = Arc::new(TokenSigner::from_config(&config.auth));
        ClinicDatabase {
            gate: AuthGate::new(signer.clone(), storage.clone()),
            identity: IdentityService::new(storage.clone(), signer, config.auth.bcrypt_cost),
            visits: VisitService::new(storage.clone(), config.visits.clone()),
            stats: StatsService::new(storage.clone()),
            storage,
        }
    }

    pub fn storage_type(&self) -> &'static str {
        self.storage.get_type()
    }

    pub async fn close(&self) {
        match self.storage.close().await {
            Ok(()) => info!("{} storage closed", self.storage.get_type()),
            Err(e) => warn!("Error while closing {} storage: {}", self.storage.get_type(), e),
        }
    }
}
