//! Lazily built, cached lender adapters.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use crate::config::{Config, LenderConfig};
use crate::lenders::karrofin::KarroFinClient;
use crate::lenders::pocketcredit::PocketCreditClient;
use crate::lenders::zype::ZypeClient;
use crate::lenders::LenderClient;
use crate::models::LenderName;

/// Hands out one shared adapter per configured lender.
///
/// Adapters are built on first use and cached for the life of the process,
/// so authenticated sessions survive across requests and sweeps.
pub struct LenderRegistry {
    config: Arc<Config>,
    clients: RwLock<HashMap<LenderName, Arc<dyn LenderClient>>>,
}

impl LenderRegistry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the adapter for `name`, building it on first use.
    ///
    /// Disabled lenders and adapters that fail to initialize yield `None`;
    /// a failed build is retried on the next call rather than cached.
    pub async fn get(&self, name: LenderName) -> Option<Arc<dyn LenderClient>> {
        if let Some(client) = self.clients.read().await.get(&name) {
            return Some(client.clone());
        }

        let lender_config = self.config.lender(name);
        if !lender_config.is_enabled() {
            return None;
        }

        let mut clients = self.clients.write().await;
        // Another task may have built it while we waited for the lock.
        if let Some(client) = clients.get(&name) {
            return Some(client.clone());
        }

        match build_client(name, lender_config) {
            Ok(client) => {
                clients.insert(name, client.clone());
                Some(client)
            }
            Err(e) => {
                error!("Failed to initialize {} adapter: {}", name, e);
                None
            }
        }
    }

    /// Adapters for every enabled lender, in declaration order.
    pub async fn all_enabled(&self) -> Vec<Arc<dyn LenderClient>> {
        let mut clients = Vec::new();
        for name in LenderName::ALL {
            if let Some(client) = self.get(name).await {
                clients.push(client);
            }
        }
        clients
    }

    /// Drops every cached adapter so the next access rebuilds from config.
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }
}

fn build_client(
    name: LenderName,
    config: &LenderConfig,
) -> anyhow::Result<Arc<dyn LenderClient>> {
    Ok(match name {
        LenderName::KarroFin => Arc::new(KarroFinClient::new(config)?),
        LenderName::PocketCredit => Arc::new(PocketCreditClient::new(config)?),
        LenderName::Zype => Arc::new(ZypeClient::new(config)?),
    })
}
