//! Invocation Registry
//!
//! Process-wide cache of invocations keyed by (library, symbol).
//!
//! Entries are inserted once and never removed, so an `Arc<Invocation>`
//! handed out here (and any raw dispatch handle derived from it) stays
//! valid for the life of the registry. The global registry lives until
//! process exit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::convention::{platform_resolver, ConventionResolver};
use super::error::FfiResult;
use super::invocation::Invocation;
use super::loader::{SearchPaths, SymbolResolver};
use crate::config::BridgeConfig;

/// Cache key: (library path as given, exported symbol name)
pub type InvocationKey = (String, String);

static GLOBAL: Lazy<InvocationRegistry> = Lazy::new(|| {
    let config = BridgeConfig::load_from_cwd().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable dynffi.toml");
        BridgeConfig::default()
    });
    InvocationRegistry::from_config(&config)
});

/// Registry of prepared invocations
pub struct InvocationRegistry {
    search: SearchPaths,
    conventions: &'static dyn ConventionResolver,
    entries: Mutex<HashMap<InvocationKey, Arc<Invocation>>>,
    libraries_opened: AtomicUsize,
}

impl InvocationRegistry {
    /// Empty registry resolving bare library names through `search`
    pub fn new(search: SearchPaths) -> Self {
        Self {
            search,
            conventions: platform_resolver(),
            entries: Mutex::new(HashMap::new()),
            libraries_opened: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.loader.search_paths())
    }

    /// Use a specific convention resolver for invocations created from now on
    pub fn with_conventions(mut self, conventions: &'static dyn ConventionResolver) -> Self {
        self.conventions = conventions;
        self
    }

    /// The process-wide registry, built from `dynffi.toml` on first use
    pub fn global() -> &'static InvocationRegistry {
        &GLOBAL
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.search
    }

    /// Find the invocation for (library, symbol), opening the library and
    /// creating an unbound invocation on first request.
    ///
    /// An existing invocation is returned as is; it is never reloaded here.
    pub fn get_or_create(&self, library: &str, symbol: &str) -> FfiResult<Arc<Invocation>> {
        let key = (library.to_string(), symbol.to_string());
        let mut entries = self.entries.lock();
        if let Some(invocation) = entries.get(&key) {
            return Ok(Arc::clone(invocation));
        }

        let resolver = SymbolResolver::open(library, &self.search)?;
        self.libraries_opened.fetch_add(1, Ordering::Relaxed);
        let invocation = Arc::new(Invocation::with_conventions(resolver, self.conventions));
        debug!(library, symbol, entries = entries.len() + 1, "created invocation");

        entries.insert(key, Arc::clone(&invocation));
        Ok(invocation)
    }

    pub fn get(&self, library: &str, symbol: &str) -> Option<Arc<Invocation>> {
        self.entries
            .lock()
            .get(&(library.to_string(), symbol.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// All cached keys, sorted
    pub fn keys(&self) -> Vec<InvocationKey> {
        let mut keys: Vec<_> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// How many times this registry has mapped a library
    pub fn libraries_opened(&self) -> usize {
        self.libraries_opened.load(Ordering::Relaxed)
    }
}

impl Default for InvocationRegistry {
    fn default() -> Self {
        Self::new(SearchPaths::system())
    }
}
