use async_std::task::{self, JoinHandle};
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use modelsync_core::protocol::TransferEvent;
use std::collections::HashMap;

/// One bar per in-flight file, fed by the fetcher's event channel. The
/// render task ends once every sender is dropped.
pub struct TransferProgress {
    multi: MultiProgress,
    task: JoinHandle<()>,
}

impl TransferProgress {
    pub fn start(events: UnboundedReceiver<TransferEvent>) -> Self {
        let multi = MultiProgress::new();
        let task = task::spawn(render(multi.clone(), events));
        Self { multi, task }
    }

    /// Prints above the bars without tearing them. A hidden target (not a
    /// terminal) swallows `MultiProgress::println`, so plain stdout is used.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.multi.is_hidden() || self.multi.println(line.as_ref()).is_err() {
            println!("{}", line.as_ref());
        }
    }

    pub async fn finish(self) {
        self.task.await;
    }
}

async fn render(multi: MultiProgress, mut events: UnboundedReceiver<TransferEvent>) {
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    while let Some(event) = events.next().await {
        match event {
            TransferEvent::Started(file, total) => {
                let bar = match total {
                    Some(len) => ProgressBar::new(len).with_style(bar_style()),
                    None => ProgressBar::new_spinner().with_style(spinner_style()),
                };
                let bar = multi.add(bar);
                bar.set_message(file.clone());
                bars.insert(file, bar);
            }
            TransferEvent::Progress(file, done, _) => {
                if let Some(bar) = bars.get(&file) {
                    bar.set_position(done);
                }
            }
            TransferEvent::Complete(file) | TransferEvent::Error(file, _) => {
                if let Some(bar) = bars.remove(&file) {
                    bar.finish_and_clear();
                }
            }
        }
    }

    for bar in bars.into_values() {
        bar.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg:32!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    )
    .map(|style| style.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg:32!} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
