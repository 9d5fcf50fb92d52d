//! Assembly of one output record per received transaction.
//!
//! Validation failures are expected input, not exceptions: every received
//! note yields a [`Row`], and a note that fails any extraction stage carries
//! the diagnostic in `parse_issue` instead of aborting the batch. Stages run
//! decode, parse, resolve, balance; the first failure wins and later stages
//! are not attempted.

use std::borrow::Cow;

use crate::balance::{balance_of, BalanceError};
use crate::funding::{resolve_funder, FundingError};
use crate::memo::{decode_memo, MemoDecodeError};
use crate::rpc::{NodeRpc, ReceivedNote};
use crate::vote::{parse_answers, VoteAnswer, VoteParseError, QUESTION_COUNT};

/// Column order of the snapshot CSV. `block height recorded` is stamped by
/// the snapshot builder, not here.
pub const CSV_HEADER: &str = "is valid,taddr,balance,answer 1,answer 1 comment,answer 2,answer 2 comment,answer 3,answer 3 comment,parse issue,txid,block height recorded";

/// One extraction result per received transaction.
#[derive(Clone, Debug, Default)]
pub struct Row {
    pub is_valid: bool,
    pub txid: String,
    pub taddr: Option<String>,
    pub balance: Option<u64>,
    pub answers: [Option<VoteAnswer>; QUESTION_COUNT],
    pub parse_issue: String,
    pub height_recorded: u64,
}

#[derive(Debug, thiserror::Error)]
enum RowIssue {
    #[error(transparent)]
    Decode(#[from] MemoDecodeError),
    #[error(transparent)]
    Parse(#[from] VoteParseError),
    #[error(transparent)]
    Funding(#[from] FundingError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
}

/// Build the row for one received note. Never fails; the returned row is
/// either fully valid or carries a diagnostic.
pub fn assemble_row(rpc: &impl NodeRpc, received: &ReceivedNote) -> Row {
    let mut row = Row {
        txid: received.txid.clone(),
        ..Row::default()
    };

    match fill_row(rpc, received, &mut row) {
        Ok(()) => row.is_valid = true,
        Err(issue) => row.parse_issue = issue.to_string(),
    }
    row
}

fn fill_row(rpc: &impl NodeRpc, received: &ReceivedNote, row: &mut Row) -> Result<(), RowIssue> {
    let memo = decode_memo(&received.memo)?;
    for answer in parse_answers(&memo)? {
        let slot = (answer.question - 1) as usize;
        row.answers[slot] = Some(answer);
    }

    let taddr = resolve_funder(rpc, &received.txid)?;
    row.taddr = Some(taddr.clone());
    row.balance = Some(balance_of(rpc, &taddr)?);
    Ok(())
}

impl Row {
    /// Render the row as one CSV record in [`CSV_HEADER`] column order.
    pub fn csv_record(&self) -> String {
        let balance = self.balance.map(|b| b.to_string()).unwrap_or_default();
        let mut fields: Vec<String> = vec![
            self.is_valid.to_string(),
            self.taddr.clone().unwrap_or_default(),
            balance,
        ];
        for answer in &self.answers {
            match answer {
                Some(answer) => {
                    fields.push(answer.option.to_string());
                    fields.push(answer.comment.clone());
                }
                None => {
                    fields.push(String::new());
                    fields.push(String::new());
                }
            }
        }
        fields.push(self.parse_issue.clone());
        fields.push(self.txid.clone());
        fields.push(self.height_recorded.to_string());

        fields
            .iter()
            .map(|field| escape_csv_field(field))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn escape_csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{funded_vote, MockNode};

    #[test]
    fn fully_valid_note_yields_valid_row() {
        let node = funded_vote("vote", "1a hello;2c;3y", "t1funder", 40_000);
        let received = node.received[0].clone();

        let row = assemble_row(&node, &received);
        assert!(row.is_valid);
        assert_eq!(row.taddr.as_deref(), Some("t1funder"));
        assert_eq!(row.balance, Some(40_000));
        assert_eq!(row.parse_issue, "");
        let q1 = row.answers[0].as_ref().unwrap();
        assert_eq!((q1.option, q1.comment.as_str()), ('a', "hello"));
    }

    #[test]
    fn bad_hex_memo_stops_before_resolution() {
        let mut node = funded_vote("vote", "1a;2c;3y", "t1funder", 40_000);
        node.received[0].memo = "zzzz".to_string();
        let received = node.received[0].clone();

        let row = assemble_row(&node, &received);
        assert!(!row.is_valid);
        assert!(row.parse_issue.contains("memo hex"));
        assert_eq!(row.taddr, None);
        assert_eq!(row.balance, None);
        assert!(row.answers.iter().all(Option::is_none));
    }

    #[test]
    fn parse_failure_keeps_txid_and_diagnostic() {
        let node = funded_vote("vote", "1z;2c;3y", "t1funder", 40_000);
        let received = node.received[0].clone();

        let row = assemble_row(&node, &received);
        assert!(!row.is_valid);
        assert!(row.parse_issue.contains("unknown option"));
        assert_eq!(row.txid, "vote");
        assert_eq!(row.balance, None);
    }

    #[test]
    fn ambiguous_funding_leaves_balance_empty() {
        let node = MockNode::new()
            .with_received_memo("vote", "1a;2c;3y")
            .with_transaction("vote", &[("fund-a", 0), ("fund-b", 0)], &[])
            .with_transaction_outputs("fund-a", &[&["t1alpha"]])
            .with_transaction_outputs("fund-b", &[&["t1beta"]]);
        let received = node.received[0].clone();

        let row = assemble_row(&node, &received);
        assert!(!row.is_valid);
        assert!(row.parse_issue.contains("t1alpha, t1beta"));
        assert_eq!(row.taddr, None);
        assert_eq!(row.balance, None);
        // Parsing succeeded before resolution failed.
        assert!(row.answers[0].is_some());
    }

    #[test]
    fn csv_record_escapes_embedded_delimiters() {
        let node = funded_vote("vote", r#"1a used "quotes", and commas;2c;3y"#, "t1f", 1);
        let received = node.received[0].clone();

        let mut row = assemble_row(&node, &received);
        row.height_recorded = 7;
        let record = row.csv_record();
        assert!(record.contains(r#""used ""quotes"", and commas""#));
        assert!(record.ends_with(",vote,7"));
    }

    #[test]
    fn csv_record_of_default_row_matches_header_width() {
        let header_columns = CSV_HEADER.split(',').count();
        let row_columns = Row::default().csv_record().split(',').count();
        assert_eq!(header_columns, row_columns);
    }
}
