//! Cluster creation actions that run against live nodes

pub mod config;

pub use config::ConfigAction;

use std::future::Future;

use keel_common::Result;
use tracing::warn;

/// Drive every unit to completion and report the first failure
///
/// Units run concurrently on the current task. A failing unit does not
/// cancel its siblings; once all have finished, the first error in launch
/// order is returned.
pub async fn run_concurrently<I, F>(units: I) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<()>>,
{
    let results = futures::future::join_all(units).await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 1 {
        warn!(failed, total = results.len(), "multiple node units failed, reporting the first");
    }

    results.into_iter().collect()
}
