//! Terminal progress bars fed from the event bus.

use core_runtime::events::{CoreEvent, EventSeverity, EventStream, RunEvent, UploadEvent};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

const OVERALL_TEMPLATE: &str = "{prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} files  {msg}";
const FILE_TEMPLATE: &str = "{prefix:>8} [{bar:40.green/white}] {percent:>3}%  {msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Draw the run until the bus closes.
pub async fn render(mut events: Receiver<CoreEvent>) {
    let bars = MultiProgress::new();
    let overall = bars.add(ProgressBar::new(0).with_style(style(OVERALL_TEMPLATE)));
    overall.set_prefix("total");
    let current = bars.add(ProgressBar::new(100).with_style(style(FILE_TEMPLATE)));
    current.set_prefix("file");

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        match event {
            CoreEvent::Run(RunEvent::Started { total_files, preview, .. }) => {
                overall.set_length(total_files);
                if preview {
                    overall.set_prefix("dry run");
                }
            }
            CoreEvent::Run(RunEvent::Progress { processed, .. }) => overall.set_position(processed),
            CoreEvent::Run(RunEvent::Paused { .. }) => overall.set_message("paused"),
            CoreEvent::Upload(UploadEvent::Started { playlist, title, .. }) => {
                current.reset();
                current.set_message(format!("{}/{}", playlist, title));
            }
            CoreEvent::Upload(UploadEvent::Progress { percent, .. }) => {
                current.set_position(u64::from(percent));
            }
            CoreEvent::Upload(UploadEvent::Completed { already_uploaded, .. }) => {
                current.set_position(100);
                if already_uploaded {
                    current.set_message("already uploaded");
                }
            }
            CoreEvent::Upload(UploadEvent::RetryScheduled {
                file_path,
                attempt,
                delay_ms,
                message,
                ..
            }) => {
                bars.println(format!(
                    "retry {} of {} in {}s: {}",
                    attempt,
                    file_path,
                    delay_ms / 1000,
                    message
                ))
                .ok();
            }
            CoreEvent::Upload(UploadEvent::Failed { file_path, message, .. }) => {
                bars.println(format!("failed {}: {}", file_path, message)).ok();
            }
            CoreEvent::Status { message } => overall.set_message(message),
            _ => {}
        }
    }

    current.finish_and_clear();
    overall.finish();
}

/// Plain lines for warnings and errors, used instead of the bars with `--quiet`.
pub async fn report_problems(events: EventStream) {
    let mut events = events.filter(|event| event.severity() >= EventSeverity::Warning);

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        let detail = match &event {
            CoreEvent::Upload(UploadEvent::Failed { file_path, message, .. }) => {
                format!("{}: {}", file_path, message)
            }
            CoreEvent::Upload(UploadEvent::RetryScheduled { file_path, attempt, message, .. }) => {
                format!("{} (attempt {}): {}", file_path, attempt, message)
            }
            CoreEvent::Run(RunEvent::Failed { message, .. }) => message.clone(),
            _ => String::new(),
        };
        eprintln!("{:?}: {} {}", event.severity(), event.description(), detail);
    }
}
