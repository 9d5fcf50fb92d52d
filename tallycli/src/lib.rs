#![forbid(unsafe_code)]
//! Command-line entry points for the tally coin poll.
//!
//! Two subcommands, matching the two long-lived processes of the poll:
//! `tally` generates the vote snapshot for the current block height, and
//! `sheet-updater` runs the idempotent publisher loop until the cutoff
//! height has been pushed to the shared spreadsheet.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, Command};
use log::info;

use tallyconfig::PollConfig;
use tallylib::poll::run_sheet_updater;
use tallylib::rpc::{NodeRpc, ZcashdClient};
use tallylib::sheets::SheetPublisher;
use tallylib::snapshot::run_tally;
use tallylib::store::SnapshotStore;

pub fn build_clap_app() -> clap::ArgMatches {
    Command::new("tally-coin-poll")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extracts coin-weighted poll votes from the chain and publishes them to a shared spreadsheet.")
        .subcommand_required(true)
        .arg(Arg::new("data-dir")
            .long("data-dir")
            .value_name("data-dir")
            .global(true)
            .help("Absolute path to use as the poll data directory. Defaults to ~/tally-coin-poll."))
        .arg(Arg::new("server")
            .long("server")
            .value_name("server")
            .global(true)
            .value_parser(parse_uri)
            .help("zcashd JSON-RPC endpoint to connect to."))
        .arg(Arg::new("rpc-user")
            .long("rpc-user")
            .value_name("rpc-user")
            .global(true)
            .help("Username for zcashd JSON-RPC authentication."))
        .arg(Arg::new("rpc-password")
            .long("rpc-password")
            .value_name("rpc-password")
            .global(true)
            .help("Password for zcashd JSON-RPC authentication."))
        .subcommand(Command::new("tally")
            .about("Generate the vote snapshot for the current block height, if not already generated."))
        .subcommand(Command::new("sheet-updater")
            .about("Publish unpublished snapshots to the shared sheet until the cutoff height is published.")
            .arg(Arg::new("cutoff-height")
                .long("cutoff-height")
                .value_name("cutoff-height")
                .value_parser(clap::value_parser!(u64))
                .help("Height whose publication ends the poll."))
            .arg(Arg::new("sleep-interval")
                .long("sleep-interval")
                .value_name("seconds")
                .value_parser(clap::value_parser!(u64))
                .help("Seconds to sleep between scan passes.")))
        .get_matches()
}

// Custom function to parse a string into an http::Uri
fn parse_uri(s: &str) -> Result<http::Uri, String> {
    s.parse::<http::Uri>().map_err(|e| e.to_string())
}

fn fill_config(matches: &clap::ArgMatches) -> PollConfig {
    let server = matches
        .get_one::<http::Uri>("server")
        .map(|server| server.to_string());
    let data_dir = matches.get_one::<String>("data-dir").map(PathBuf::from);

    let mut config = PollConfig::new(tallyconfig::construct_zcashd_uri(server), data_dir);
    if let Some(user) = matches.get_one::<String>("rpc-user") {
        config.rpc_user = user.clone();
    }
    if let Some(password) = matches.get_one::<String>("rpc-password") {
        config.rpc_password = password.clone();
    }
    config
}

fn run_tally_command(config: &PollConfig) -> Result<(), Box<dyn Error>> {
    let client = ZcashdClient::new(
        config.zcashd_uri.clone(),
        config.rpc_user.clone(),
        config.rpc_password.clone(),
    );
    let store = SnapshotStore::new(config.csv_dir())?;

    let height = client.current_height()?;
    if store.exists(height) {
        println!(
            "Tally path {} already exists; nothing to do.",
            store.snapshot_path(height).display()
        );
        return Ok(());
    }
    println!(
        "Tally path {} does not exist; generating...",
        store.snapshot_path(height).display()
    );

    let log_path = config.init_tally_logging(height)?;
    println!("Logging to {}", log_path.display());

    let tallied = run_tally(&client, &store, config)?;
    println!(
        "Wrote snapshot for height {} to {}",
        tallied,
        store.snapshot_path(tallied).display()
    );
    Ok(())
}

fn run_updater_command(
    config: &PollConfig,
    matches: &clap::ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let cutoff_height = matches
        .get_one::<u64>("cutoff-height")
        .copied()
        .unwrap_or(config.poll_cutoff_height);
    let sleep_interval = matches
        .get_one::<u64>("sleep-interval")
        .copied()
        .map(Duration::from_secs)
        .unwrap_or(config.sleep_interval);

    let log_path = config.init_updater_logging()?;
    println!("Logging to {}", log_path.display());

    let sheet_config = tallyconfig::load_sheet_config(&config.base_dir())?;
    info!(
        "Loaded config with api_key=***, sheet_id={:?}, sheet_title={:?}",
        sheet_config.sheet_id, sheet_config.sheet_title
    );

    let publisher = SheetPublisher::connect(&sheet_config)?;
    let store = SnapshotStore::new(config.csv_dir())?;

    run_sheet_updater(&store, &publisher, cutoff_height, sleep_interval);
    println!("Updated final cutoff height {}; poll complete.", cutoff_height);
    Ok(())
}

pub fn run_cli() {
    let matches = build_clap_app();
    let config = fill_config(&matches);

    let result = match matches.subcommand() {
        Some(("tally", _)) => run_tally_command(&config),
        Some(("sheet-updater", submatches)) => run_updater_command(&config, submatches),
        _ => unreachable!("subcommand_required is set"),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
