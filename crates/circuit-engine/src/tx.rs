//! Transactional helper
//!
//! Wraps `Store::run` so services can run a closure inside one transaction
//! and still get a typed result back out.

use circuit_core::{EngineError, EngineResult, Store};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};

/// Run `work` inside a single store transaction and return its value.
///
/// The closure sees a store view whose repository calls all share the
/// transaction; if it errors, every write inside it is rolled back.
pub async fn in_tx<T, F>(store: &Arc<dyn Store>, work: F) -> EngineResult<T>
where
    T: Send + 'static,
    F: for<'a> FnOnce(&'a dyn Store) -> BoxFuture<'a, EngineResult<T>> + Send + 'static,
{
    let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let out = slot.clone();

    store
        .run(Box::new(move |s| {
            Box::pin(async move {
                let value = work(s).await?;
                *out.lock().map_err(|_| {
                    EngineError::Integrity("transaction result slot poisoned".to_string())
                })? = Some(value);
                Ok(())
            })
        }))
        .await?;

    let mut guard = slot
        .lock()
        .map_err(|_| EngineError::Integrity("transaction result slot poisoned".to_string()))?;
    guard
        .take()
        .ok_or_else(|| EngineError::Integrity("transaction committed without a result".to_string()))
}
