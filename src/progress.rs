use indicatif::{ProgressBar, ProgressStyle};
use vigil_feed::BuildEvent;

/// Shard download progress. Hidden when logging is verbose, since the log
/// lines already say the same thing.
pub fn download_bar(verbose: bool) -> ProgressBar {
    if verbose {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar
}

pub fn observe(bar: &ProgressBar, event: &BuildEvent) {
    match event {
        BuildEvent::Started { shards } => {
            bar.reset();
            bar.set_length(u64::from(*shards));
            bar.set_message("Downloading digests");
        },
        BuildEvent::ShardStored { .. } => bar.inc(1),
        BuildEvent::Finalized { .. } => bar.set_message("Finalizing"),
        BuildEvent::ShardFetched { .. } | BuildEvent::Complete => {},
    }
}
