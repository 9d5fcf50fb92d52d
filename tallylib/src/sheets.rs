//! Publishing a snapshot into a fixed region of the shared spreadsheet.

use log::info;
use serde::Deserialize;
use serde_json::json;
use tallyconfig::SheetConfig;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no sub-sheet titled {0:?} in the configured spreadsheet")]
    SheetNotFound(String),
    #[error("sheets api failure: {0}")]
    RemoteFailure(#[from] reqwest::Error),
}

/// The one remote operation the poll loop needs; the seam lets poll-loop
/// tests run against an in-memory publisher.
pub trait Publish {
    fn publish(&self, content: &str) -> Result<(), PublishError>;
}

/// Pushes raw comma-delimited text into row 0, column 0 of the configured
/// sub-sheet, overwriting prior content. The remote update is treated as
/// atomic; there are no partial-write semantics to recover from.
pub struct SheetPublisher {
    agent: reqwest::blocking::Client,
    api_key: String,
    sheet_id: String,
    subsheet_id: i64,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SubSheet>,
}

#[derive(Deserialize)]
struct SubSheet {
    properties: SubSheetProperties,
}

#[derive(Deserialize)]
struct SubSheetProperties {
    #[serde(rename = "sheetId")]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

impl SheetPublisher {
    /// Resolve the configured sub-sheet title to its id and hold onto it for
    /// the life of the updater.
    pub fn connect(config: &SheetConfig) -> Result<SheetPublisher, PublishError> {
        let agent = reqwest::blocking::Client::new();
        let subsheet_id = resolve_subsheet_id(&agent, config)?;
        info!(
            "Resolved subsheet_id={} for {:?}",
            subsheet_id, config.sheet_title
        );
        Ok(SheetPublisher {
            agent,
            api_key: config.api_key.clone(),
            sheet_id: config.sheet_id.clone(),
            subsheet_id,
        })
    }
}

fn resolve_subsheet_id(
    agent: &reqwest::blocking::Client,
    config: &SheetConfig,
) -> Result<i64, PublishError> {
    let url = format!("{SHEETS_API_BASE}/{}", config.sheet_id);
    let metadata: SpreadsheetMetadata = agent
        .get(&url)
        .query(&[
            ("fields", "sheets.properties"),
            ("key", config.api_key.as_str()),
        ])
        .send()?
        .error_for_status()?
        .json()?;

    metadata
        .sheets
        .into_iter()
        .find(|sheet| sheet.properties.title == config.sheet_title)
        .map(|sheet| sheet.properties.sheet_id)
        .ok_or_else(|| PublishError::SheetNotFound(config.sheet_title.clone()))
}

impl Publish for SheetPublisher {
    fn publish(&self, content: &str) -> Result<(), PublishError> {
        let url = format!("{SHEETS_API_BASE}/{}:batchUpdate", self.sheet_id);
        let body = json!({
            "requests": [{
                "pasteData": {
                    "coordinate": {
                        "sheetId": self.subsheet_id,
                        "rowIndex": 0,
                        "columnIndex": 0,
                    },
                    "data": content,
                    "type": "PASTE_NORMAL",
                    "delimiter": ",",
                }
            }],
        });

        self.agent
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
