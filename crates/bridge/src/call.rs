//! Simulator call timing

use std::future::Future;
use std::time::Instant;

use observability::record_client_call;

use crate::error::Result;

/// Await a client call, recording its latency and outcome
pub(crate) async fn timed<T, F>(method: &'static str, call: F) -> Result<T>
where
    F: Future<Output = sim_client::Result<T>>,
{
    let started = Instant::now();
    let result = call.await;
    record_client_call(
        method,
        started.elapsed().as_secs_f64() * 1000.0,
        result.is_ok(),
    );
    Ok(result?)
}
