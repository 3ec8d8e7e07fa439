//! Progress bar over (station, year) units

use indicatif::{ProgressBar, ProgressStyle};

/// Progress display; hidden when disabled or stderr is not a terminal
#[derive(Debug)]
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(total_units: usize, enabled: bool) -> Self {
        let bar = if enabled && atty::is(atty::Stream::Stderr) {
            ProgressBar::new(total_units as u64)
        } else {
            ProgressBar::hidden()
        };

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Self { bar }
    }

    /// Show the year being processed
    pub fn set_year(&self, year: i32) {
        self.bar.set_message(format!("year {}", year));
    }

    /// Mark one unit finished
    pub fn unit_done(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Clear the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_still_counts() {
        let progress = RunProgress::new(3, false);
        progress.set_year(2020);
        progress.unit_done();
        progress.unit_done();
        assert_eq!(progress.position(), 2);
        progress.finish();
    }
}
