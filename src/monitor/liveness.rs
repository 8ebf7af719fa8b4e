use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::MonitorTarget;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One reachability observation of a monitor target.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, target: &MonitorTarget) -> bool;
}

/// Single TCP connect attempt. Resolution failure, refusal and timeout all
/// read as "unreachable"; nothing is retried.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    let start_time = Instant::now();
    let result = tokio::time::timeout(timeout, tokio::net::TcpStream::connect((host, port))).await;
    match result {
        Ok(Ok(_stream)) => {
            debug!(host = %host, port = port, elapsed_ms = start_time.elapsed().as_millis() as u64, "TCP probe connected.");
            true
        }
        Ok(Err(e)) => {
            debug!(host = %host, port = port, error = %e, "TCP probe failed.");
            false
        }
        Err(_) => {
            debug!(host = %host, port = port, "TCP probe timed out.");
            false
        }
    }
}

pub struct TcpProbe {
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn probe(&self, target: &MonitorTarget) -> bool {
        probe(&target.host, target.port, self.timeout).await
    }
}
