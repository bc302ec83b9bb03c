// src/routing.rs
//! Per-call region routing context.
//!
//! The executor runs every unit of work inside [`with_region`], so storage code further
//! down the call stack can ask [`current_region`] which partition to route to. The value
//! lives in a task-local and is only visible to the future it wraps, which keeps
//! concurrent calls from observing each other's region.

use std::future::Future;

use crate::region::Region;

tokio::task_local! {
    static CURRENT_REGION: Region;
}

/// Run `fut` with `region` as the current routing region
pub async fn with_region<F>(region: Region, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_REGION.scope(region, fut).await
}

/// The routing region of the enclosing call, if any
pub fn current_region() -> Option<Region> {
    CURRENT_REGION.try_with(|region| *region).ok()
}
