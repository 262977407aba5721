//! CSV recipient import.
//!
//! The backend imports a file in one request and reports nothing until it is
//! done, so progress shown while the upload is in flight is estimated locally
//! and snapped to the real outcome when the response arrives.

use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::api::client::extract_item;
use crate::error::{AdminError, Result};

pub const DEFAULT_TICK: Duration = Duration::from_millis(200);
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(2);
/// Simulated rows advance in this many steps across the estimated total.
const SIMULATION_STEPS: usize = 40;
/// One simulated failure per this many processed rows.
const SIMULATED_FAILURE_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ImportState {
    #[default]
    Idle,
    Uploading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub state: ImportState,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub current_row: usize,
    pub errors: Vec<String>,
}

impl ImportProgress {
    pub fn start(total_rows: usize) -> Self {
        Self { state: ImportState::Uploading, total_rows, ..Default::default() }
    }

    /// One tick of the estimate. Stops one row short of the total so only the
    /// server response can complete it.
    pub fn advance(&mut self) {
        if self.state != ImportState::Uploading || self.total_rows == 0 {
            return;
        }
        let step = (self.total_rows / SIMULATION_STEPS).max(1);
        let ceiling = self.total_rows - 1;
        self.processed_rows = (self.processed_rows + step).min(ceiling);
        self.failed_rows = self.processed_rows / SIMULATED_FAILURE_EVERY;
        self.successful_rows = self.processed_rows - self.failed_rows;
        self.current_row = self.processed_rows;
    }

    pub fn finish(&mut self, outcome: &ServerOutcome) {
        self.state = ImportState::Succeeded;
        match outcome.imported {
            Some(imported) => {
                self.successful_rows = imported;
                self.failed_rows = outcome.failed.unwrap_or(0);
                self.total_rows = self.total_rows.max(self.successful_rows + self.failed_rows);
            }
            None => {
                self.successful_rows = self.total_rows;
                self.failed_rows = 0;
            }
        }
        self.processed_rows = self.total_rows;
        self.current_row = self.total_rows;
        self.errors = outcome.errors.clone();
    }

    pub fn fail(&mut self, message: String) {
        self.state = ImportState::Failed;
        self.errors.push(message);
    }

    pub fn percent(&self) -> u8 {
        if self.total_rows == 0 {
            return if self.state == ImportState::Succeeded { 100 } else { 0 };
        }
        ((self.processed_rows * 100) / self.total_rows).min(100) as u8
    }
}

/// What the import endpoint reports back, when it reports anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerOutcome {
    pub imported: Option<usize>,
    pub failed: Option<usize>,
    pub errors: Vec<String>,
}

impl ServerOutcome {
    pub fn from_value(json: &Value) -> Self {
        let body = extract_item(json, "result");
        let count = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| body.get(*k).and_then(|v| v.as_u64()))
                .map(|n| n as usize)
        };
        let errors = body
            .get("errors")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| {
                        e.as_str()
                            .map(str::to_string)
                            .or_else(|| e.get("message").and_then(|m| m.as_str()).map(str::to_string))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            imported: count(&["imported", "successCount", "successful", "created"]),
            failed: count(&["failed", "failureCount", "skipped"]),
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Checks extension and size. Returns the file size.
pub fn validate_file(path: &Path, max_bytes: u64) -> Result<u64> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(AdminError::validation("Please select a CSV file"));
    }
    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(AdminError::validation(format!(
            "File is too large ({} MB). Maximum size is {} MB",
            size / (1024 * 1024),
            max_bytes / (1024 * 1024)
        )));
    }
    if size == 0 {
        return Err(AdminError::validation("The selected file is empty"));
    }
    Ok(size)
}

/// Data rows in the file, header excluded. Rejects files without an `email` column.
pub fn estimate_rows(contents: &[u8]) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(contents);
    let has_email = reader.headers()?.iter().any(|h| h.trim().eq_ignore_ascii_case("email"));
    if !has_email {
        return Err(AdminError::validation("CSV header must include an 'email' column (name,email,status)"));
    }
    let mut rows = 0;
    for record in reader.records() {
        let record = record?;
        if record.iter().any(|f| !f.trim().is_empty()) {
            rows += 1;
        }
    }
    Ok(rows)
}

pub struct CsvImporter {
    client: ApiClient,
    max_bytes: u64,
    tick: Duration,
    reset_delay: Duration,
}

impl CsvImporter {
    pub fn new(client: ApiClient, max_bytes: u64) -> Self {
        Self { client, max_bytes, tick: DEFAULT_TICK, reset_delay: DEFAULT_RESET_DELAY }
    }

    pub fn with_timing(mut self, tick: Duration, reset_delay: Duration) -> Self {
        self.tick = tick;
        self.reset_delay = reset_delay;
        self
    }

    /// Uploads `path`, publishing progress on `progress` until the record is reset.
    pub async fn import(&self, path: &Path, progress: &watch::Sender<ImportProgress>) -> Result<ImportSummary> {
        validate_file(path, self.max_bytes)?;
        let contents = tokio::fs::read(path).await?;
        let total_rows = estimate_rows(&contents)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recipients.csv")
            .to_string();
        info!("Importing {file_name}: ~{total_rows} rows");

        progress.send_replace(ImportProgress::start(total_rows));

        let upload = self.client.upload_recipients_csv(&file_name, contents);
        tokio::pin!(upload);
        let mut ticker = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        ticker.tick().await;
        let result = loop {
            tokio::select! {
                res = &mut upload => break res,
                _ = ticker.tick() => progress.send_modify(ImportProgress::advance),
            }
        };

        let summary = match result {
            Ok(json) => {
                let outcome = ServerOutcome::from_value(&json);
                debug!("Import response: {outcome:?}");
                progress.send_modify(|p| p.finish(&outcome));
                let done = progress.borrow().clone();
                Ok(ImportSummary {
                    total_rows: done.total_rows,
                    imported: done.successful_rows,
                    failed: done.failed_rows,
                    errors: done.errors,
                })
            }
            Err(e) => {
                warn!("Import of {file_name} failed: {e}");
                progress.send_modify(|p| p.fail(e.user_message()));
                Err(e)
            }
        };

        tokio::time::sleep(self.reset_delay).await;
        progress.send_replace(ImportProgress::default());
        summary
    }
}
