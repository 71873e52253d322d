use crate::models::GatewayConfig;
use crate::modules::system::config as config_store;
use crate::proxy::cache::ResponseCache;
use crate::proxy::monitor::ProxyMonitor;
use crate::proxy::queue::DispatchQueue;
use crate::proxy::session_manager::SessionManager;
use crate::proxy::upstream::client::UpstreamClient;
use std::sync::Arc;

// Readers take a cheap Arc snapshot; the admin surface is the single writer
// and swaps the snapshot after persisting.
pub struct ConfigHandle {
    snapshot: parking_lot::RwLock<Arc<GatewayConfig>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl ConfigHandle {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            snapshot: parking_lot::RwLock::new(Arc::new(config)),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<GatewayConfig> {
        self.snapshot.read().clone()
    }

    // Mutate-persist-swap under the writer lock. The new snapshot only
    // becomes visible once the document is safely on disk.
    pub async fn update<F>(&self, mutate: F) -> Result<Arc<GatewayConfig>, String>
    where
        F: FnOnce(&mut GatewayConfig),
    {
        let _guard = self.write_lock.lock().await;
        let mut next = (*self.snapshot()).clone();
        mutate(&mut next);
        config_store::save_gateway_config(&next)?;
        let next = Arc::new(next);
        *self.snapshot.write() = next.clone();
        Ok(next)
    }
}

pub struct CoreServices {
    pub upstream: Arc<UpstreamClient>,
    pub monitor: Arc<ProxyMonitor>,
    pub cache: Arc<ResponseCache>,
    pub queue: Arc<DispatchQueue>,
    pub sessions: Arc<SessionManager>,
}

// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<CoreServices>,
    pub config: Arc<ConfigHandle>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        use crate::constants::{CACHE_TTL_SECS, MAX_CONCURRENT_UPSTREAM, MIN_DISPATCH_INTERVAL_MS};
        Self {
            core: Arc::new(CoreServices {
                upstream: Arc::new(UpstreamClient::new()),
                monitor: Arc::new(ProxyMonitor::new()),
                cache: Arc::new(ResponseCache::new(CACHE_TTL_SECS)),
                queue: Arc::new(DispatchQueue::new(
                    MAX_CONCURRENT_UPSTREAM,
                    MIN_DISPATCH_INTERVAL_MS,
                )),
                sessions: Arc::new(SessionManager::new()),
            }),
            config: Arc::new(ConfigHandle::new(config)),
        }
    }
}

impl axum::extract::FromRef<AppState> for Arc<CoreServices> {
    fn from_ref(state: &AppState) -> Self {
        state.core.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ConfigHandle> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
