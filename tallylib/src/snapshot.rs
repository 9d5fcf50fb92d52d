//! Snapshot production: one full pass over the poll address at a height.

use log::{debug, info};
use tallyconfig::PollConfig;

use crate::row::{assemble_row, CSV_HEADER};
use crate::rpc::{NodeRpc, RpcError};
use crate::store::{SnapshotStore, StoreError};

/// CSV records end with CRLF, the conventional CSV line terminator.
const LINE_TERMINATOR: &str = "\r\n";

#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tabulate every transaction received at the poll address, in node order,
/// stamping each row with `height`. Returns the snapshot CSV text.
pub fn build_snapshot(
    rpc: &impl NodeRpc,
    poll_address: &str,
    height: u64,
) -> Result<String, RpcError> {
    let received = rpc.list_received(poll_address)?;
    info!(
        "Tallying {} received memos at height {}",
        received.len(),
        height
    );

    let mut csv = String::from(CSV_HEADER);
    csv.push_str(LINE_TERMINATOR);
    for note in &received {
        let mut row = assemble_row(rpc, note);
        row.height_recorded = height;
        debug!("Writing row: {:?}", row);
        csv.push_str(&row.csv_record());
        csv.push_str(LINE_TERMINATOR);
    }
    Ok(csv)
}

/// One tally run: import the viewing key, read the chain height, build the
/// snapshot and persist it. Returns the tallied height. The store refuses to
/// overwrite a snapshot that already exists for that height.
pub fn run_tally(
    rpc: &impl NodeRpc,
    store: &SnapshotStore,
    config: &PollConfig,
) -> Result<u64, TallyError> {
    info!(
        "Importing viewing key for tally poll address: {}",
        config.poll_address
    );
    rpc.import_viewing_key(&config.poll_viewing_key, config.poll_start_height)?;

    let height = rpc.current_height()?;
    let csv = build_snapshot(rpc, &config.poll_address, height)?;
    store.write(height, &csv)?;
    info!(
        "Wrote snapshot for height {} to {}",
        height,
        store.snapshot_path(height).display()
    );
    Ok(height)
}
