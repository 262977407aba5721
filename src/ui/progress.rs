use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::import::{ImportProgress, ImportState};

/// Mirrors import progress onto a terminal bar until the sender goes away.
pub fn spawn_import_bar(mut rx: watch::Receiver<ImportProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} rows {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        while rx.changed().await.is_ok() {
            let p = rx.borrow_and_update().clone();
            match p.state {
                ImportState::Idle => continue,
                ImportState::Uploading => {
                    bar.set_length(p.total_rows as u64);
                    bar.set_position(p.processed_rows as u64);
                    bar.set_message(format!("~{} ok, ~{} failed", p.successful_rows, p.failed_rows));
                }
                ImportState::Succeeded => {
                    bar.set_length(p.total_rows as u64);
                    bar.set_position(p.processed_rows as u64);
                    bar.finish_with_message(format!("{} imported, {} failed", p.successful_rows, p.failed_rows));
                }
                ImportState::Failed => {
                    bar.abandon_with_message("upload failed");
                }
            }
        }
    })
}
