// crates/mcpcp-proxy/src/registry.rs
// ============================================================================
// Module: Backend Registry
// Description: Backend table with cached tool catalogs and concurrent fetch.
// Purpose: Own one client per backend and aggregate tool listings.
// Dependencies: mcpcp-core, mcpcp-config, tokio
// ============================================================================

//! ## Overview
//! The registry holds one [`BackendClient`] per configured backend in
//! declaration order, plus a per-backend tool cache. Catalog aggregation
//! fans out to the requested backends concurrently and reports each
//! backend's outcome independently, so one unreachable backend never hides
//! the others. Tool listings are fetched lazily and cached until a fetch
//! fails, at which point the cache entry is dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use mcpcp_config::BackendConfig;
use mcpcp_core::BackendName;
use mcpcp_core::ToolDescriptor;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::client::BackendClient;
use crate::client::BackendError;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// One backend's contribution to an aggregated catalog.
#[derive(Debug)]
pub struct BackendCatalog {
    /// Backend the listing came from.
    pub backend: BackendName,
    /// Tool listing, or the failure that prevented it.
    pub result: Result<Vec<ToolDescriptor>, BackendError>,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// One backend slot: its client and cached tool listing.
#[derive(Debug)]
struct BackendEntry {
    /// Client bound to this backend.
    client: BackendClient,
    /// Cached tool listing. `None` until the first successful fetch.
    tools: RwLock<Option<Vec<ToolDescriptor>>>,
}

/// Registry of configured backends, in declaration order.
#[derive(Debug)]
pub struct BackendRegistry {
    /// Backend entries in declaration order.
    entries: Vec<Arc<BackendEntry>>,
    /// Name → entry index lookup.
    index: BTreeMap<BackendName, usize>,
}

impl BackendRegistry {
    /// Builds the registry from the configured backend table.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when a backend client cannot be constructed.
    pub fn from_configs(configs: &[BackendConfig]) -> Result<Self, BackendError> {
        let mut entries = Vec::with_capacity(configs.len());
        let mut index = BTreeMap::new();
        for config in configs {
            let client = BackendClient::from_config(config)?;
            index.insert(client.name().clone(), entries.len());
            entries.push(Arc::new(BackendEntry {
                client,
                tools: RwLock::new(None),
            }));
        }
        Ok(Self {
            entries,
            index,
        })
    }

    /// Returns backend names in declaration order.
    #[must_use]
    pub fn backend_order(&self) -> Vec<BackendName> {
        self.entries.iter().map(|entry| entry.client.name().clone()).collect()
    }

    /// Fetches tool listings from the allowed backends concurrently.
    ///
    /// Results come back in declaration order. Each backend reports its own
    /// outcome; a failed fetch never aborts the aggregation.
    pub async fn list_tools(&self, allowed: &BTreeSet<BackendName>) -> Vec<BackendCatalog> {
        let mut selected = Vec::new();
        for entry in &self.entries {
            if allowed.contains(entry.client.name()) {
                selected.push(Arc::clone(entry));
            }
        }
        let mut join_set = JoinSet::new();
        for (position, entry) in selected.iter().enumerate() {
            let entry = Arc::clone(entry);
            join_set.spawn(async move { (position, fetch_tools(&entry).await) });
        }
        let mut results: Vec<Option<Result<Vec<ToolDescriptor>, BackendError>>> =
            selected.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((position, result)) = joined {
                if let Some(slot) = results.get_mut(position) {
                    *slot = Some(result);
                }
            }
        }
        selected
            .iter()
            .zip(results)
            .map(|(entry, result)| BackendCatalog {
                backend: entry.client.name().clone(),
                result: result
                    .unwrap_or_else(|| Err(BackendError::Unavailable("fetch task failed".to_string()))),
            })
            .collect()
    }

    /// Invokes a backend-local tool by backend name.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend is unknown, unreachable, or
    /// reports a failure.
    pub async fn invoke(
        &self,
        backend: &BackendName,
        local_name: &str,
        arguments: Value,
    ) -> Result<Value, BackendError> {
        let entry = self
            .index
            .get(backend)
            .and_then(|position| self.entries.get(*position))
            .ok_or_else(|| BackendError::Unavailable(format!("unknown backend: {backend}")))?;
        entry.client.call_tool(local_name, arguments).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the cached tool listing, fetching it on a miss.
///
/// A failed fetch clears any stale cache entry so the next catalog request
/// retries the backend.
async fn fetch_tools(entry: &BackendEntry) -> Result<Vec<ToolDescriptor>, BackendError> {
    if let Some(tools) = entry.tools.read().await.as_ref() {
        return Ok(tools.clone());
    }
    let mut cache = entry.tools.write().await;
    // A concurrent fetch may have filled the cache while we waited.
    if let Some(tools) = cache.as_ref() {
        return Ok(tools.clone());
    }
    match entry.client.list_tools().await {
        Ok(tools) => {
            *cache = Some(tools.clone());
            Ok(tools)
        }
        Err(err) => {
            *cache = None;
            Err(err)
        }
    }
}
