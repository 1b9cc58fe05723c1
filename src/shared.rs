//! Shared engine lifecycle
//!
//! Every adapter (one per benchmark worker) uses the same engine handle.
//! [`SharedEngine`] opens it on the first [`acquire`](SharedEngine::acquire)
//! and closes it on the [`release`](SharedEngine::release) that drops the
//! reference count back to zero.
//!
//! Open and close both run under the lifecycle mutex, so no caller can
//! observe a handle that is half-open or half-closed. CRUD traffic never
//! takes this mutex.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::{EngineOptions, KvEngine, KvTable, PAGE_SIZE};
use crate::error::{BTreeDbError, Result};

struct Slot<E> {
    handle: Option<Arc<E>>,
    refs: usize,
}

/// Reference-counted owner of the single engine handle
pub struct SharedEngine<E: KvEngine = KvTable> {
    slot: Mutex<Slot<E>>,
}

impl<E: KvEngine> SharedEngine<E> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                handle: None,
                refs: 0,
            }),
        }
    }

    /// Take a reference to the engine, opening it if this is the first one.
    ///
    /// Only the first caller's storage settings are used; later callers get
    /// the already-open handle. A failed open leaves the count unchanged.
    pub fn acquire(&self, config: &Config) -> Result<Arc<E>> {
        let mut slot = self.slot.lock();

        let handle = match slot.handle.clone() {
            Some(handle) => handle,
            None => {
                let options = Self::engine_options(config)?;
                tracing::debug!(
                    "Opening shared engine at {} ({} pages)",
                    options.path.display(),
                    options.page_count
                );
                let handle = Arc::new(E::open(&options)?);
                slot.handle = Some(Arc::clone(&handle));
                handle
            }
        };

        slot.refs += 1;
        Ok(handle)
    }

    /// Give back a reference obtained from `acquire`.
    ///
    /// The last release closes the engine. `handle` must be the caller's
    /// only remaining clone; closing fails if other clones are still alive.
    pub fn release(&self, handle: Arc<E>) -> Result<()> {
        let mut slot = self.slot.lock();

        if slot.refs == 0 {
            return Err(BTreeDbError::Storage(
                "release without a matching acquire".to_string(),
            ));
        }
        slot.refs -= 1;
        drop(handle);

        if slot.refs > 0 {
            return Ok(());
        }

        let Some(engine) = slot.handle.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(engine) {
            Ok(engine) => {
                tracing::debug!("Closing shared engine");
                engine.close()
            }
            Err(engine) => {
                let leaked = Arc::strong_count(&engine) - 1;
                slot.handle = Some(engine);
                Err(BTreeDbError::Storage(format!(
                    "cannot close engine: {} handle(s) still in use",
                    leaked
                )))
            }
        }
    }

    /// Number of outstanding acquires
    pub fn ref_count(&self) -> usize {
        self.slot.lock().refs
    }

    /// Whether the engine is currently open
    pub fn is_open(&self) -> bool {
        self.slot.lock().handle.is_some()
    }

    /// Validate storage settings and derive the engine's open parameters
    fn engine_options(config: &Config) -> Result<EngineOptions> {
        let path = config
            .db_path
            .as_ref()
            .ok_or_else(|| BTreeDbError::Config("BTree db path is missing".to_string()))?;

        let page_count = config.pool_size / PAGE_SIZE;
        if page_count == 0 {
            return Err(BTreeDbError::Config(format!(
                "pool size {} is smaller than one {}-byte page",
                config.pool_size, PAGE_SIZE
            )));
        }

        Ok(EngineOptions {
            path: path.clone(),
            page_count,
            wal_sync_strategy: config.wal_sync_strategy,
        })
    }
}

impl<E: KvEngine> Default for SharedEngine<E> {
    fn default() -> Self {
        Self::new()
    }
}
