#![forbid(unsafe_code)]
//! Configuration for the tally coin poll tools.
//!
//! Everything the snapshot producer and the sheet updater need to run is
//! collected into an immutable [`PollConfig`] before any core operation
//! begins; nothing here is process-wide mutable state.

use std::{
    fs,
    io::{self, Error, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};

use log::LevelFilter;
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use serde::Deserialize;

pub const DEFAULT_ZCASHD_SERVER: &str = "http://127.0.0.1:8232";

/// The single receiving address instrumented for the poll.
pub const DEFAULT_POLL_ADDRESS: &str =
    "zs1j54w96syddfnrh2ehx40lyy7zej67z496nrqtg39r6jv00ks4pjyt57xz59kzy289c2rkdr6rhe";

/// Read-only credential for the poll address, imported into the node once at
/// startup so received memos become visible.
pub const DEFAULT_POLL_VIEWING_KEY: &str =
    "zxviews1q0lfzpc7qqqqpqyp35tvhhl3gkwtfp06g3kulvraxqyr4zr8xxaxu895x5g64ss4t5uspgxwes4gqdppdqjkdlzgjetgjssz7mnq7e2axmn5k6xtn6fk658sylx97ng3ndfatv8qy3xry0l3agk49wraq8mhmfq6xaxzut4zgtrexx8llzzhyduw4egkszzgqldjx55xnckcrnrymcm3l4enpefkypptr6v8cezmmqjp78xjjres36hn47v2uujvj63fadrv6jw3q7gtf2vtj";

/// Height at which the viewing key import begins rescanning.
pub const DEFAULT_POLL_START_HEIGHT: u64 = 1_398_360;

/// Last height the sheet updater publishes; reaching it ends the poll.
pub const DEFAULT_POLL_CUTOFF_HEIGHT: u64 = 1_410_115;

pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_secs(15);

pub const BASEDIR_NAME: &str = "tally-coin-poll";
pub const CSV_DIR_NAME: &str = "csvs";
pub const LOG_DIR_NAME: &str = "logs";
pub const UPDATER_CONFIG_NAME: &str = "sheet-updater-config.json";

/// Normalize an optional `--server` argument into a zcashd JSON-RPC URI,
/// appending the default port when none was given.
pub fn construct_zcashd_uri(server: Option<String>) -> http::Uri {
    match server {
        Some(s) => {
            let mut s = if s.starts_with("http") {
                s
            } else {
                "http://".to_string() + &s
            };
            let uri: http::Uri = s.parse().unwrap();
            if uri.port().is_none() {
                s += ":8232";
            }
            s
        }
        None => DEFAULT_ZCASHD_SERVER.to_string(),
    }
    .parse()
    .unwrap()
}

/// Configuration data that is necessary and sufficient to run the tally
/// producer or the sheet updater.
#[derive(Clone, Debug)]
pub struct PollConfig {
    pub zcashd_uri: http::Uri,
    pub rpc_user: String,
    pub rpc_password: String,
    pub poll_address: String,
    pub poll_viewing_key: String,
    pub poll_start_height: u64,
    pub poll_cutoff_height: u64,
    pub sleep_interval: Duration,
    /// The directory holding csvs/, logs/ and the updater config. By default
    /// this is ~/tally-coin-poll.
    pub data_dir: Option<PathBuf>,
}

impl PollConfig {
    pub fn new(zcashd_uri: http::Uri, data_dir: Option<PathBuf>) -> PollConfig {
        PollConfig {
            zcashd_uri,
            rpc_user: String::new(),
            rpc_password: String::new(),
            poll_address: DEFAULT_POLL_ADDRESS.to_string(),
            poll_viewing_key: DEFAULT_POLL_VIEWING_KEY.to_string(),
            poll_start_height: DEFAULT_POLL_START_HEIGHT,
            poll_cutoff_height: DEFAULT_POLL_CUTOFF_HEIGHT,
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            data_dir,
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut dir = dirs::home_dir().expect("Couldn't determine home directory!");
                dir.push(BASEDIR_NAME);
                dir
            }
        }
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.base_dir().join(CSV_DIR_NAME)
    }

    pub fn log_dir(&self) -> io::Result<PathBuf> {
        let dir = self.base_dir().join(LOG_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Route the log facade into a per-run file for a tally run. Returns the
    /// log path so the operator can be told where to look.
    pub fn init_tally_logging(&self, height: u64) -> io::Result<PathBuf> {
        let log_path = self.log_dir()?.join(format!(
            "log_height-{}_{}.txt",
            height,
            run_timestamp()
        ));
        init_logging(&log_path, "[{l:<5}] {m}{n}")?;
        Ok(log_path)
    }

    /// Route the log facade into a per-run file for a sheet-updater run.
    pub fn init_updater_logging(&self) -> io::Result<PathBuf> {
        let log_path = self
            .log_dir()?
            .join(format!("sheet-updater-log_{}.txt", run_timestamp()));
        init_logging(&log_path, "{d} [{l:<5}] {m}{n}")?;
        Ok(log_path)
    }
}

fn run_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

fn init_logging(log_path: &Path, pattern: &str) -> io::Result<()> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build(log_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(LevelFilter::Debug))
        .map_err(|e| Error::new(ErrorKind::Other, format!("{}", e)))?;

    log4rs::init_config(config).map_err(|e| Error::new(ErrorKind::Other, format!("{}", e)))?;
    Ok(())
}

/// Credentials and target identifiers for the spreadsheet service, loaded
/// from `sheet-updater-config.json` in the base directory.
#[derive(Clone, Debug, Deserialize)]
pub struct SheetConfig {
    pub api_key: String,
    pub sheet_id: String,
    pub sheet_title: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SheetConfigError {
    #[error("could not read sheet updater config: {0}")]
    Unreadable(#[from] io::Error),
    #[error("sheet updater config is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(
        "unexpected or missing entries in {}: expected exactly api_key, sheet_id, sheet_title",
        .0.display()
    )]
    UnexpectedEntries(PathBuf),
}

/// Load and validate the updater config. The key set must be exactly
/// `api_key`, `sheet_id`, `sheet_title`; anything extra or missing fails
/// rather than being silently tolerated.
pub fn load_sheet_config(base_dir: &Path) -> Result<SheetConfig, SheetConfigError> {
    let path = base_dir.join(UPDATER_CONFIG_NAME);
    let raw = fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;

    let valid_keys = match value.as_object() {
        Some(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys == ["api_key", "sheet_id", "sheet_title"]
        }
        None => false,
    };
    if !valid_keys {
        return Err(SheetConfigError::UnexpectedEntries(path));
    }

    Ok(serde_json::from_value(value)?)
}
