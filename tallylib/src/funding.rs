//! Resolution of the transparent address that funded a voting transaction.
//!
//! A vote is weighed by the balance of the address that supplied its input
//! value, so the funding graph is walked one level back: every input of the
//! voting transaction is resolved to the transparent address exposed at the
//! referenced output of its source transaction. The vote is only attributable
//! when that walk yields exactly one distinct address.

use std::collections::BTreeSet;

use crate::rpc::{NodeRpc, RpcError};

#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("voting memo came from fully shielded transfers with no associated taddr")]
    NoAddress,
    #[error(
        "voting memo came from {} taddrs, {}, where a single taddr was expected; funding txids {}",
        .addresses.len(),
        .addresses.join(", "),
        .funding_txids.join(", ")
    )]
    AmbiguousAddress {
        addresses: Vec<String>,
        funding_txids: Vec<String>,
    },
    #[error("funding txid {txid} vout {vout} exposes {count} addresses where one was expected")]
    UnexpectedScript {
        txid: String,
        vout: u32,
        count: usize,
    },
    #[error("funding txid {txid} has no vout {vout}")]
    MissingOutput { txid: String, vout: u32 },
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Resolve the unique transparent address that funded `txid`. Multi-input
/// transactions are accepted as long as all inputs trace back to the same
/// address.
pub fn resolve_funder(rpc: &impl NodeRpc, txid: &str) -> Result<String, FundingError> {
    let tx = rpc.raw_transaction(txid)?;

    let mut taddrs = BTreeSet::new();
    let mut funding_txids = BTreeSet::new();
    for input in &tx.vin {
        let funding_tx = rpc.raw_transaction(&input.txid)?;
        let output =
            funding_tx
                .vout
                .get(input.vout as usize)
                .ok_or_else(|| FundingError::MissingOutput {
                    txid: input.txid.clone(),
                    vout: input.vout,
                })?;

        match output.script_pub_key.addresses.as_slice() {
            [address] => {
                taddrs.insert(address.clone());
            }
            other => {
                return Err(FundingError::UnexpectedScript {
                    txid: input.txid.clone(),
                    vout: input.vout,
                    count: other.len(),
                });
            }
        }
        funding_txids.insert(input.txid.clone());
    }

    let mut addresses: Vec<String> = taddrs.into_iter().collect();
    match addresses.len() {
        0 => Err(FundingError::NoAddress),
        1 => Ok(addresses.remove(0)),
        _ => Err(FundingError::AmbiguousAddress {
            addresses,
            funding_txids: funding_txids.into_iter().collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockNode;

    #[test]
    fn single_funder_resolves() {
        let node = MockNode::new()
            .with_transaction("vote", &[("fund", 0)], &[])
            .with_transaction_outputs("fund", &[&["t1funder"]]);

        assert_eq!(resolve_funder(&node, "vote").unwrap(), "t1funder");
    }

    #[test]
    fn multiple_inputs_from_one_address_resolve() {
        let node = MockNode::new()
            .with_transaction("vote", &[("fund-a", 0), ("fund-b", 1)], &[])
            .with_transaction_outputs("fund-a", &[&["t1same"]])
            .with_transaction_outputs("fund-b", &[&["t1other-slot"], &["t1same"]]);

        assert_eq!(resolve_funder(&node, "vote").unwrap(), "t1same");
    }

    #[test]
    fn shielded_funding_has_no_address() {
        let node = MockNode::new().with_transaction("vote", &[], &[]);

        assert!(matches!(
            resolve_funder(&node, "vote"),
            Err(FundingError::NoAddress)
        ));
    }

    #[test]
    fn two_distinct_funders_are_ambiguous() {
        let node = MockNode::new()
            .with_transaction("vote", &[("fund-a", 0), ("fund-b", 0)], &[])
            .with_transaction_outputs("fund-a", &[&["t1alpha"]])
            .with_transaction_outputs("fund-b", &[&["t1beta"]]);

        match resolve_funder(&node, "vote") {
            Err(FundingError::AmbiguousAddress {
                addresses,
                funding_txids,
            }) => {
                assert_eq!(addresses, vec!["t1alpha", "t1beta"]);
                assert_eq!(funding_txids, vec!["fund-a", "fund-b"]);
            }
            other => panic!("expected AmbiguousAddress, got {:?}", other),
        }
    }

    #[test]
    fn multisig_script_is_rejected() {
        let node = MockNode::new()
            .with_transaction("vote", &[("fund", 0)], &[])
            .with_transaction_outputs("fund", &[&["t1one", "t1two"]]);

        assert!(matches!(
            resolve_funder(&node, "vote"),
            Err(FundingError::UnexpectedScript { count: 2, .. })
        ));
    }

    #[test]
    fn out_of_range_vout_is_rejected() {
        let node = MockNode::new()
            .with_transaction("vote", &[("fund", 3)], &[])
            .with_transaction_outputs("fund", &[&["t1only"]]);

        assert!(matches!(
            resolve_funder(&node, "vote"),
            Err(FundingError::MissingOutput { vout: 3, .. })
        ));
    }
}
