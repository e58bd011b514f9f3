//! Bridges DataFusion's `async` planning/execution API to the
//! synchronous-per-call contract the rest of the core presents.
//!
//! A single background Tokio runtime is constructed once, lazily, and
//! every [`crate::QueryEngine::run_sql`] call blocks on it. There is no
//! per-call runtime construction and no executor thread visible to
//! callers beyond this blocking call.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Runtime::new().expect("failed to start the query engine's background runtime")
});

/// Run `future` to completion on the shared runtime, blocking the caller.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}
