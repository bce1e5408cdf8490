#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the vector risk toolchain.
//!
//! Provides an `indicatif` progress bar behind the forecast crate's
//! [`ProgressCallback`] trait, plus [`init_logger`] which routes `log`
//! output through `indicatif-log-bridge` so log lines never tear a bar
//! mid-redraw.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use vector_risk_forecast::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `start()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a bar for per-target evaluation. It spins until
    /// [`ProgressCallback::start()`] is called, then shows
    /// position, percentage and ETA.
    #[must_use]
    pub fn targets_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::spinner_then_bar(multi, message))
    }

    fn spinner_then_bar(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self { bar, bar_style }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn start(&self, targets: u64, message: &str) {
        self.bar.set_length(targets);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
        self.bar.set_message(message.to_string());
    }

    fn target_done(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_string());
    }
}

/// Level shown when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// `RUST_LOG` directives override [`DEFAULT_LOG_LEVEL`].
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(DEFAULT_LOG_LEVEL)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already initialized in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    #[test]
    fn targets_bar_tracks_progress() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let progress = IndicatifProgress::spinner_then_bar(&multi, "Evaluating");
        assert_eq!(progress.bar.length(), None);

        progress.start(3, "Evaluating targets");
        progress.target_done();
        progress.target_done();
        progress.target_done();
        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.position(), 3);

        progress.finish("done");
        assert!(progress.bar.is_finished());
    }
}
