use crate::core::events::ScanEvent;
use crate::core::models::ScanId;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spinner following the lifecycle events of one scan.
pub struct ScanSpinner {
    bar: ProgressBar,
}

impl ScanSpinner {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} [{elapsed_precise}] {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Updates the spinner from `events` until the scan reaches a terminal
    /// state or the channel closes.
    pub fn follow(self, id: ScanId, mut events: mpsc::UnboundedReceiver<ScanEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if event.scan_id() != id {
                    continue;
                }
                match &event {
                    ScanEvent::Started { tool, .. } => {
                        self.bar.set_message(format!("scan {}: {} running", id, tool));
                    }
                    ScanEvent::Completed { records, .. } => {
                        self.bar
                            .finish_with_message(format!("scan {}: completed, {} records", id, records));
                    }
                    ScanEvent::Failed { message, .. } => {
                        self.bar.abandon_with_message(format!("scan {}: failed: {}", id, message));
                    }
                    ScanEvent::Cancelled { .. } => {
                        self.bar.abandon_with_message(format!("scan {}: cancelled", id));
                    }
                }
                if event.is_terminal() {
                    return;
                }
            }
            self.bar.finish_and_clear();
        })
    }
}
