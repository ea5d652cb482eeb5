//! Time sources for lifecycle projection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::Result;
use crate::rpc::RpcClient;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    async fn now_seconds(&self) -> Result<i64>;
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn now_seconds(&self) -> Result<i64> {
        Ok(Utc::now().timestamp())
    }
}

/// Reads the timestamp of the latest block, so contract progress follows the
/// chain rather than the host (which matters on test networks with a
/// manipulated clock).
pub struct ChainClock {
    rpc: Arc<RpcClient>,
}

impl ChainClock {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Clock for ChainClock {
    async fn now_seconds(&self) -> Result<i64> {
        self.rpc.latest_block_timestamp().await
    }
}
