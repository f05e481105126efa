//! Runtime backing the blocking entry points.

use std::future::Future;

use once_cell::sync::Lazy;
use tokio::runtime::{Handle, Runtime};

use crate::error::{ScriptError, ScriptResult};

// Global Tokio runtime - shared by every blocking call
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name("qail-script-blocking")
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime")
});

/// Drive `future` to completion on the shared runtime.
///
/// Fails with [`ScriptError::BlockingInAsyncContext`] when called from a
/// thread that is already inside a Tokio runtime, where blocking would
/// stall or panic.
pub fn block_on<F: Future>(future: F) -> ScriptResult<F::Output> {
    if Handle::try_current().is_ok() {
        return Err(ScriptError::BlockingInAsyncContext);
    }
    Ok(RUNTIME.block_on(future))
}

/// Handle to the shared runtime, for producers feeding blocking consumers.
pub fn handle() -> &'static Handle {
    RUNTIME.handle()
}
