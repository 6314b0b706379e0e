// ── Progress reporting ────────────────────────────────────────────────────────

use indicatif::{ProgressDrawTarget, ProgressStyle};

/// Receives byte counts while a file is streamed.
///
/// `begin` is called once per file before any payload moves, `report` at
/// least at 0 bytes and at completion.
pub trait ProgressSink: Send {
    fn begin(&mut self, _subject: &str, _total_size: u64) {}

    fn report(&mut self, total_sent: u64, total_size: u64);

    fn finish(&mut self) {}
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _total_sent: u64, _total_size: u64) {}
}

const BAR_TEMPLATE: &str =
    "{msg} {percent:>3}% [{bar:30}] {bytes}/{total_bytes} {binary_bytes_per_sec} {elapsed}";

/// Terminal meter, one bar per file, left on screen when the file completes.
pub struct ProgressBar {
    target: fn() -> ProgressDrawTarget,
    style: ProgressStyle,
    current: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    pub fn stderr() -> Self {
        Self::with_target(ProgressDrawTarget::stderr)
    }

    /// Tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden)
    }

    fn with_target(target: fn() -> ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            target,
            style,
            current: None,
        }
    }
}

impl ProgressSink for ProgressBar {
    fn begin(&mut self, subject: &str, total_size: u64) {
        let bar = indicatif::ProgressBar::with_draw_target(Some(total_size), (self.target)());
        bar.set_style(self.style.clone());
        bar.set_message(subject.to_string());
        if let Some(previous) = self.current.replace(bar) {
            previous.abandon();
        }
    }

    fn report(&mut self, total_sent: u64, total_size: u64) {
        if let Some(bar) = &self.current {
            bar.set_length(total_size);
            bar.set_position(total_sent);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.current.take() {
            bar.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_tracks_current_file() {
        let mut sink = ProgressBar::hidden();
        sink.begin("a.txt", 1000);
        sink.report(0, 1000);
        sink.report(500, 1000);

        let bar = sink.current.as_ref().unwrap();
        assert_eq!(bar.position(), 500);
        assert_eq!(bar.length(), Some(1000));
        assert_eq!(bar.message(), "a.txt");
    }

    #[test]
    fn test_finish_completes_and_releases_bar() {
        let mut sink = ProgressBar::hidden();
        sink.begin("f", 10);
        sink.report(10, 10);
        let bar = sink.current.clone().unwrap();
        sink.finish();
        assert!(bar.is_finished());
        assert!(sink.current.is_none());
    }

    #[test]
    fn test_next_file_replaces_unfinished_bar() {
        let mut sink = ProgressBar::hidden();
        sink.begin("first", 4);
        let first = sink.current.clone().unwrap();
        sink.begin("second", 8);
        assert!(first.is_finished());
        assert_eq!(sink.current.as_ref().unwrap().message(), "second");
    }

    #[test]
    fn test_report_before_begin_is_ignored() {
        let mut sink = ProgressBar::hidden();
        sink.report(1, 2);
        sink.finish();
        assert!(sink.current.is_none());
    }

    #[test]
    fn test_template_is_valid() {
        assert!(ProgressStyle::with_template(BAR_TEMPLATE).is_ok());
    }
}
