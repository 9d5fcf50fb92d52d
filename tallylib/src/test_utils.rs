//! In-memory [`NodeRpc`] implementation for unit tests.

use std::collections::HashMap;

use crate::rpc::{NodeRpc, RawTransaction, ReceivedNote, RpcError, ScriptPubKey, TxInput, TxOutput};

#[derive(Default)]
pub(crate) struct MockNode {
    pub height: u64,
    pub received: Vec<ReceivedNote>,
    pub transactions: HashMap<String, RawTransaction>,
    pub balances: HashMap<String, u64>,
}

impl MockNode {
    pub fn new() -> MockNode {
        MockNode {
            height: 1_400_000,
            ..MockNode::default()
        }
    }

    pub fn with_height(mut self, height: u64) -> MockNode {
        self.height = height;
        self
    }

    /// Register a received note whose memo is the hex encoding of `text`.
    pub fn with_received_memo(self, txid: &str, text: &str) -> MockNode {
        self.with_received_hex_memo(txid, &hex::encode(text))
    }

    /// Register a received note with a raw (possibly malformed) memo hex.
    pub fn with_received_hex_memo(mut self, txid: &str, memo_hex: &str) -> MockNode {
        self.received.push(ReceivedNote {
            txid: txid.to_string(),
            memo: memo_hex.to_string(),
            amount_zat: Some(10_000),
        });
        self
    }

    /// Register a transaction with the given inputs and transparent output
    /// address sets (one inner slice per vout index).
    pub fn with_transaction(
        mut self,
        txid: &str,
        inputs: &[(&str, u32)],
        outputs: &[&[&str]],
    ) -> MockNode {
        self.transactions.insert(
            txid.to_string(),
            RawTransaction {
                vin: inputs
                    .iter()
                    .map(|(txid, vout)| TxInput {
                        txid: txid.to_string(),
                        vout: *vout,
                    })
                    .collect(),
                vout: outputs
                    .iter()
                    .map(|addresses| TxOutput {
                        script_pub_key: ScriptPubKey {
                            addresses: addresses.iter().map(|a| a.to_string()).collect(),
                        },
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn with_transaction_outputs(self, txid: &str, outputs: &[&[&str]]) -> MockNode {
        self.with_transaction(txid, &[], outputs)
    }

    pub fn with_balance(mut self, address: &str, zatoshis: u64) -> MockNode {
        self.balances.insert(address.to_string(), zatoshis);
        self
    }
}

impl NodeRpc for MockNode {
    fn current_height(&self) -> Result<u64, RpcError> {
        Ok(self.height)
    }

    fn import_viewing_key(&self, _viewing_key: &str, _start_height: u64) -> Result<(), RpcError> {
        Ok(())
    }

    fn list_received(&self, _address: &str) -> Result<Vec<ReceivedNote>, RpcError> {
        Ok(self.received.clone())
    }

    fn raw_transaction(&self, txid: &str) -> Result<RawTransaction, RpcError> {
        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::Node {
                code: -5,
                message: format!("No information available about transaction {txid}"),
            })
    }

    fn address_balance(&self, addresses: &[&str]) -> Result<u64, RpcError> {
        addresses
            .iter()
            .map(|address| {
                self.balances.get(*address).copied().ok_or(RpcError::Node {
                    code: -5,
                    message: format!("No information available for address {address}"),
                })
            })
            .sum()
    }
}

/// A node holding one received vote with a clean single-address funding
/// chain and a known balance.
pub(crate) fn funded_vote(txid: &str, memo_text: &str, taddr: &str, zatoshis: u64) -> MockNode {
    let funding_txid = format!("{txid}-funding");
    MockNode::new()
        .with_received_memo(txid, memo_text)
        .with_transaction(txid, &[(&funding_txid, 0)], &[])
        .with_transaction_outputs(&funding_txid, &[&[taddr]])
        .with_balance(taddr, zatoshis)
}
