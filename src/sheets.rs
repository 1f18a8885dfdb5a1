use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::SheetConfig;
use crate::models::CohortTable;

const VALUES_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";
// matches the freshness window the sheet service itself allows
const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("access to the spreadsheet was denied; share the sheet publicly or check SHEETS_API_KEY")]
    PermissionDenied,
    #[error("the Google Sheets API is disabled for this project; enable it in the Cloud console and retry")]
    ApiDisabled,
    #[error("spreadsheet or tab not found; check SHEETS_SPREADSHEET_ID and the tab name")]
    SheetNotFound,
    #[error("sheet request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from the sheet service: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiError,
}

#[derive(Deserialize, Default)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub struct SheetsClient {
    http: reqwest::Client,
    config: SheetConfig,
    cache: Mutex<HashMap<String, CachedTable>>,
}

struct CachedTable {
    fetched_at: Instant,
    table: CohortTable,
}

impl SheetsClient {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn fetch_cohort(&self, tab: &str) -> Result<CohortTable, SheetError> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(tab) {
            if entry.fetched_at.elapsed() < CACHE_TTL {
                debug!("serving tab {tab} from cache");
                return Ok(entry.table.clone());
            }
        }

        let table = self.fetch_tab(tab).await?;
        cache.insert(
            tab.to_string(),
            CachedTable {
                fetched_at: Instant::now(),
                table: table.clone(),
            },
        );
        Ok(table)
    }

    async fn fetch_tab(&self, tab: &str) -> Result<CohortTable, SheetError> {
        let url = format!(
            "{VALUES_ENDPOINT}/{}/values/{tab}",
            self.config.spreadsheet_id
        );
        debug!("fetching sheet tab {tab}");
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let range: ValueRange = response.json().await?;
        Ok(table_from_values(range.values))
    }
}

fn classify_api_error(http_status: u16, body: &str) -> SheetError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let status = parsed.error.status;
    let message = parsed.error.message;

    if status == "PERMISSION_DENIED" || http_status == 403 {
        if message.contains("has not been used") || message.contains("disabled") {
            SheetError::ApiDisabled
        } else {
            SheetError::PermissionDenied
        }
    } else if http_status == 404 || status == "NOT_FOUND" {
        SheetError::SheetNotFound
    } else if http_status == 400 && message.contains("Unable to parse range") {
        // the API reports an unknown tab name as a range parse failure
        SheetError::SheetNotFound
    } else {
        SheetError::Malformed(format!("HTTP {http_status}: {message}"))
    }
}

fn table_from_values(values: Vec<Vec<serde_json::Value>>) -> CohortTable {
    let mut rows = values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>());
    let columns = rows.next().unwrap_or_default();
    CohortTable::new(columns, rows.collect())
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(raw: serde_json::Value) -> Vec<Vec<serde_json::Value>> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn header_row_becomes_the_column_set() {
        let table = table_from_values(values(json!([
            ["이름", "이메일", "총점"],
            ["김민준", "minjun@example.com", 87],
        ])));
        assert_eq!(table.columns(), ["이름", "이메일", "총점"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 2), "87");
    }

    #[test]
    fn short_rows_are_padded_to_the_header_width() {
        let table = table_from_values(values(json!([
            ["이름", "이메일", "총점"],
            ["김민준"],
        ])));
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(0, 2), "");
    }

    #[test]
    fn empty_response_yields_an_empty_table() {
        let table = table_from_values(Vec::new());
        assert_eq!(table.row_count(), 0);
        assert!(table.columns().is_empty());
    }

    #[test]
    fn permission_errors_are_distinguished_from_disabled_api() {
        let denied = classify_api_error(
            403,
            r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#,
        );
        assert!(matches!(denied, SheetError::PermissionDenied));

        let disabled = classify_api_error(
            403,
            r#"{"error": {"code": 403, "message": "Google Sheets API has not been used in project 1234 before or it is disabled.", "status": "PERMISSION_DENIED"}}"#,
        );
        assert!(matches!(disabled, SheetError::ApiDisabled));
    }

    #[test]
    fn missing_sheets_and_bad_tabs_map_to_not_found() {
        let missing = classify_api_error(
            404,
            r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#,
        );
        assert!(matches!(missing, SheetError::SheetNotFound));

        let bad_tab = classify_api_error(
            400,
            r#"{"error": {"code": 400, "message": "Unable to parse range: 없는시트", "status": "INVALID_ARGUMENT"}}"#,
        );
        assert!(matches!(bad_tab, SheetError::SheetNotFound));
    }

    #[test]
    fn unclassified_faults_keep_the_status_line() {
        let other = classify_api_error(500, "not even json");
        match other {
            SheetError::Malformed(detail) => assert!(detail.contains("500")),
            unexpected => panic!("expected Malformed, got {unexpected:?}"),
        }
    }
}
