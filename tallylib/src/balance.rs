//! Advisory balance lookup for a resolved funding address.

use crate::rpc::{NodeRpc, RpcError};

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("balance unavailable for {address}: {source}")]
    Unavailable { address: String, source: RpcError },
}

/// Current balance of `address` in zatoshis. One node call, no retries;
/// retry belongs to the outer poll cadence.
pub fn balance_of(rpc: &impl NodeRpc, address: &str) -> Result<u64, BalanceError> {
    rpc.address_balance(&[address])
        .map_err(|source| BalanceError::Unavailable {
            address: address.to_string(),
            source,
        })
}
